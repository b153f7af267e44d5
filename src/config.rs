//! Elevation Resolution Configuration and Builder
//!
//! This module provides the configuration of a conversion run: which terrain
//! interpolator to use and the tuning constants of interpolation and
//! surface matching.

use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ElevationError, Result};

/// Terrain interpolation strategies
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolatorKind {
    /// Flat terrain at elevation 0 (default, also used when no data is available)
    #[default]
    Zero,
    /// Distance-weighted average of the sites within a cutoff radius
    InverseDistanceWeighting,
    /// Sibson interpolation from stolen Voronoi areas
    NaturalNeighbor,
    /// Barycentric interpolation within the enclosing Delaunay triangle
    Linear,
    /// Blend of local quadratic surfaces fitted around each site
    LeastSquares,
}

impl InterpolatorKind {
    /// Parse an interpolator name from a configuration file
    ///
    /// Accepts both the interpolator type names (`"NaturalNeighborInterpolator"`)
    /// and snake case names (`"natural_neighbor"`), ignoring case. Unknown names
    /// fall back to [`InterpolatorKind::Zero`] with a warning.
    pub fn from_name(name: &str) -> Self {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.strip_suffix("interpolator").unwrap_or(&normalized);

        match normalized {
            "zero" => InterpolatorKind::Zero,
            "inversedistanceweighting" | "idw" => InterpolatorKind::InverseDistanceWeighting,
            "naturalneighbor" => InterpolatorKind::NaturalNeighbor,
            "linear" => InterpolatorKind::Linear,
            "leastsquares" => InterpolatorKind::LeastSquares,
            _ => {
                warn!("unknown terrain interpolator {:?}, using flat terrain", name);
                InterpolatorKind::Zero
            }
        }
    }

    /// Get the configuration name of this interpolator
    pub fn name(self) -> &'static str {
        match self {
            InterpolatorKind::Zero => "ZeroInterpolator",
            InterpolatorKind::InverseDistanceWeighting => "InverseDistanceWeightingInterpolator",
            InterpolatorKind::NaturalNeighbor => "NaturalNeighborInterpolator",
            InterpolatorKind::Linear => "LinearInterpolator",
            InterpolatorKind::LeastSquares => "LeastSquaresInterpolator",
        }
    }
}

/// Configuration of a conversion run
///
/// # Example
///
/// ```rust
/// use scene_elevation::*;
///
/// let config = ElevationConfigBuilder::new()
///     .interpolator(InterpolatorKind::NaturalNeighbor)
///     .build()
///     .unwrap();
///
/// // Config is serializable (with "serde" feature)
/// # #[cfg(feature = "serde")]
/// # {
/// let json = serde_json::to_string(&config).unwrap();
/// let restored: ElevationConfig = serde_json::from_str(&json).unwrap();
/// assert_eq!(config, restored);
/// # }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationConfig {
    /// Terrain interpolation strategy
    ///
    /// Replaced by [`InterpolatorKind::Zero`] for a run without elevation data.
    pub interpolator: InterpolatorKind,

    /// Exponent of the inverse distance weights
    ///
    /// - 1: Gentle falloff, distant sites still matter
    /// - 2: Default
    /// - 4+: Nearly nearest-site behavior
    pub idw_exponent: f64,

    /// Radius beyond which sites do not contribute to inverse distance weighting
    pub idw_cutoff: f64,

    /// Distance by which triangulations extend beyond the known sites
    pub triangulation_padding: f64,

    /// Distance by which the scene bounds are grown when fetching known sites
    pub site_fetch_padding: f64,

    /// Distance by which the scene bounds are grown for the surface index
    pub surface_index_padding: f64,

    /// Number of surface index cells along X and Z
    pub surface_index_cells: (usize, usize),

    /// Seed of the shuffled site insertion order of triangulations
    pub insertion_seed: u64,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            interpolator: InterpolatorKind::Zero,
            idw_exponent: 2.0,
            idw_cutoff: 300.0,
            triangulation_padding: 100.0,
            site_fetch_padding: 10.0,
            surface_index_padding: 50.0,
            surface_index_cells: (100, 100),
            insertion_seed: 0,
        }
    }
}

/// Builder for creating ElevationConfig with validation
///
/// # Example
///
/// ```rust
/// use scene_elevation::*;
///
/// let config = ElevationConfigBuilder::new()
///     .interpolator(InterpolatorKind::InverseDistanceWeighting)
///     .idw_exponent(3.0)
///     .unwrap()
///     .idw_cutoff(150.0)
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(config.idw_exponent, 3.0);
/// ```
#[derive(Debug, Clone)]
pub struct ElevationConfigBuilder {
    config: ElevationConfig,
}

fn require(valid: bool, message: impl FnOnce() -> String) -> Result<()> {
    if valid {
        Ok(())
    } else {
        Err(ElevationError::InvalidConfig(message()))
    }
}

impl ElevationConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - interpolator: Zero
    /// - idw_exponent: 2
    /// - idw_cutoff: 300
    /// - triangulation_padding: 100
    /// - site_fetch_padding: 10
    /// - surface_index_padding: 50
    /// - surface_index_cells: 100 × 100
    /// - insertion_seed: 0
    pub fn new() -> Self {
        Self {
            config: ElevationConfig::default(),
        }
    }

    pub fn interpolator(mut self, kind: InterpolatorKind) -> Self {
        self.config.interpolator = kind;
        self
    }

    /// Select the interpolator by its configuration name
    ///
    /// See [`InterpolatorKind::from_name`].
    pub fn interpolator_name(self, name: &str) -> Self {
        self.interpolator(InterpolatorKind::from_name(name))
    }

    /// Set the exponent of inverse distance weighting
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the exponent is not positive
    pub fn idw_exponent(mut self, exponent: f64) -> Result<Self> {
        require(exponent > 0.0 && exponent.is_finite(), || {
            format!("IDW exponent must be positive (got {})", exponent)
        })?;
        self.config.idw_exponent = exponent;
        Ok(self)
    }

    /// Set the cutoff radius of inverse distance weighting
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the radius is not positive
    pub fn idw_cutoff(mut self, cutoff: f64) -> Result<Self> {
        require(cutoff > 0.0 && cutoff.is_finite(), || {
            format!("IDW cutoff must be positive (got {})", cutoff)
        })?;
        self.config.idw_cutoff = cutoff;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` if the padding is negative
    pub fn triangulation_padding(mut self, padding: f64) -> Result<Self> {
        require(padding >= 0.0 && padding.is_finite(), || {
            format!("triangulation padding must be >= 0 (got {})", padding)
        })?;
        self.config.triangulation_padding = padding;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` if the padding is negative
    pub fn site_fetch_padding(mut self, padding: f64) -> Result<Self> {
        require(padding >= 0.0 && padding.is_finite(), || {
            format!("site fetch padding must be >= 0 (got {})", padding)
        })?;
        self.config.site_fetch_padding = padding;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` if the padding is negative
    pub fn surface_index_padding(mut self, padding: f64) -> Result<Self> {
        require(padding >= 0.0 && padding.is_finite(), || {
            format!("surface index padding must be >= 0 (got {})", padding)
        })?;
        self.config.surface_index_padding = padding;
        Ok(self)
    }

    /// Set the number of surface index cells along X and Z
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if either count is 0
    pub fn surface_index_cells(mut self, cells_x: usize, cells_z: usize) -> Result<Self> {
        require(cells_x >= 1 && cells_z >= 1, || {
            format!("surface index needs at least one cell per axis (got {}x{})", cells_x, cells_z)
        })?;
        self.config.surface_index_cells = (cells_x, cells_z);
        Ok(self)
    }

    /// Set the seed of the site insertion order
    ///
    /// The same seed and sites always produce the same triangulation.
    pub fn insertion_seed(mut self, seed: u64) -> Self {
        self.config.insertion_seed = seed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ElevationConfig> {
        Ok(self.config)
    }
}

impl Default for ElevationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
