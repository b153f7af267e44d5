//! Terrain elevation interpolation
//!
//! Provides the interpolation strategies that estimate ground elevation
//! between sites of known elevation, and the sources those sites come from.

mod idw;
mod least_squares;
mod linear;
mod natural_neighbor;
mod sources;

pub use idw::InverseDistanceWeightingInterpolator;
pub use least_squares::LeastSquaresInterpolator;
pub use linear::LinearInterpolator;
pub use natural_neighbor::{natural_neighbors, NaturalNeighborInterpolator, NaturalNeighbors};
pub use sources::{InMemorySites, TerrainElevationData, XyzFileSites};

use glam::{DVec2, DVec3};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{ElevationConfig, InterpolatorKind};
use crate::error::{ElevationError, Result};
use crate::geometry::{with_y, xz, Bounded, Rect};
use crate::triangulation::DelaunayTriangulation;

/// A ground position with a trusted elevation
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownSite {
    /// Ground position (X, Z)
    pub position: DVec2,
    /// Elevation at that position
    pub elevation: f64,
}

impl KnownSite {
    pub fn new(x: f64, z: f64, elevation: f64) -> Self {
        Self {
            position: DVec2::new(x, z),
            elevation,
        }
    }

    /// Site from a scene position whose Y component is the elevation
    pub fn from_xyz(point: DVec3) -> Self {
        Self {
            position: xz(point),
            elevation: point.y,
        }
    }

    #[inline]
    pub fn to_xyz(&self) -> DVec3 {
        with_y(self.position, self.elevation)
    }
}

impl Bounded for KnownSite {
    fn bounding_box(&self) -> Rect {
        Rect::from_point(self.position)
    }
}

/// Trait for estimating terrain elevation from known sites
///
/// [`interpolate_ele`](Self::interpolate_ele) never fails: positions the
/// sites say nothing about resolve to 0.
pub trait TerrainInterpolator {
    /// Provide the sites of known elevation, replacing any previous ones
    fn set_known_sites(&mut self, sites: &[KnownSite]);

    /// Estimate the elevation at a ground position
    ///
    /// # Errors
    ///
    /// - `DataUnavailable` if no site is close enough to the position
    /// - `OutsideTriangulation` if the position lies beyond the triangulated sites
    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64>;

    /// Estimate the elevation at a ground position, 0 where that fails
    fn interpolate_ele(&self, pos: DVec2) -> f64 {
        self.try_interpolate_ele(pos).unwrap_or_else(|err| {
            warn!("terrain interpolation failed, using 0: {}", err);
            0.0
        })
    }

    /// Estimate the elevation and return the resulting scene position
    fn interpolate(&self, pos: DVec2) -> DVec3 {
        with_y(pos, self.interpolate_ele(pos))
    }
}

/// Flat terrain at elevation 0
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroInterpolator;

impl TerrainInterpolator for ZeroInterpolator {
    fn set_known_sites(&mut self, _sites: &[KnownSite]) {}

    fn try_interpolate_ele(&self, _pos: DVec2) -> Result<f64> {
        Ok(0.0)
    }
}

/// The available interpolation strategies, chosen once per conversion run
#[derive(Debug)]
pub enum Interpolator {
    Zero(ZeroInterpolator),
    InverseDistanceWeighting(InverseDistanceWeightingInterpolator),
    NaturalNeighbor(NaturalNeighborInterpolator),
    Linear(LinearInterpolator),
    LeastSquares(LeastSquaresInterpolator),
}

impl Interpolator {
    /// Create the interpolator selected by a configuration
    pub fn from_config(config: &ElevationConfig) -> Self {
        match config.interpolator {
            InterpolatorKind::Zero => Interpolator::Zero(ZeroInterpolator),
            InterpolatorKind::InverseDistanceWeighting => Interpolator::InverseDistanceWeighting(
                InverseDistanceWeightingInterpolator::new(config.idw_exponent, config.idw_cutoff),
            ),
            InterpolatorKind::NaturalNeighbor => {
                Interpolator::NaturalNeighbor(NaturalNeighborInterpolator::new(
                    config.triangulation_padding,
                    config.insertion_seed,
                ))
            }
            InterpolatorKind::Linear => Interpolator::Linear(LinearInterpolator::new(
                config.triangulation_padding,
                config.insertion_seed,
            )),
            InterpolatorKind::LeastSquares => {
                Interpolator::LeastSquares(LeastSquaresInterpolator::default())
            }
        }
    }

    pub fn kind(&self) -> InterpolatorKind {
        match self {
            Interpolator::Zero(_) => InterpolatorKind::Zero,
            Interpolator::InverseDistanceWeighting(_) => InterpolatorKind::InverseDistanceWeighting,
            Interpolator::NaturalNeighbor(_) => InterpolatorKind::NaturalNeighbor,
            Interpolator::Linear(_) => InterpolatorKind::Linear,
            Interpolator::LeastSquares(_) => InterpolatorKind::LeastSquares,
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        matches!(self, Interpolator::Zero(_))
    }
}

impl TerrainInterpolator for Interpolator {
    fn set_known_sites(&mut self, sites: &[KnownSite]) {
        match self {
            Interpolator::Zero(i) => i.set_known_sites(sites),
            Interpolator::InverseDistanceWeighting(i) => i.set_known_sites(sites),
            Interpolator::NaturalNeighbor(i) => i.set_known_sites(sites),
            Interpolator::Linear(i) => i.set_known_sites(sites),
            Interpolator::LeastSquares(i) => i.set_known_sites(sites),
        }
    }

    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64> {
        match self {
            Interpolator::Zero(i) => i.try_interpolate_ele(pos),
            Interpolator::InverseDistanceWeighting(i) => i.try_interpolate_ele(pos),
            Interpolator::NaturalNeighbor(i) => i.try_interpolate_ele(pos),
            Interpolator::Linear(i) => i.try_interpolate_ele(pos),
            Interpolator::LeastSquares(i) => i.try_interpolate_ele(pos),
        }
    }
}

/// Triangulate known sites inside their bounding box grown by `padding`
///
/// Sites are inserted in a shuffled order derived from `seed`. Sites sharing
/// a position with an earlier one are skipped.
pub(crate) fn build_triangulation(
    sites: &[KnownSite],
    padding: f64,
    seed: u64,
) -> Result<DelaunayTriangulation> {
    let bounds = Rect::bbox(sites.iter().map(|s| s.position))
        .ok_or_else(|| ElevationError::DataUnavailable("no sites to triangulate".to_string()))?
        .pad(padding);

    let mut triangulation = DelaunayTriangulation::new(bounds)?;

    let mut order: Vec<&KnownSite> = sites.iter().collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let mut duplicates = 0;
    for site in order {
        match triangulation.insert(site.to_xyz()) {
            Ok(()) => {}
            Err(ElevationError::DuplicatePoint { .. }) => duplicates += 1,
            Err(err) => return Err(err),
        }
    }

    triangulation.compact();

    debug!(
        "triangulated {} sites into {} triangles ({} duplicates skipped)",
        sites.len() - duplicates,
        triangulation.triangle_count(),
        duplicates
    );

    Ok(triangulation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElevationConfigBuilder;

    #[test]
    fn test_zero_interpolator_ignores_sites() {
        let mut interpolator = ZeroInterpolator;
        interpolator.set_known_sites(&[KnownSite::new(0.0, 0.0, 100.0)]);
        assert_eq!(interpolator.interpolate_ele(DVec2::ZERO), 0.0);
        assert_eq!(interpolator.interpolate(DVec2::new(3.0, 4.0)), DVec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_interpolator_from_config() {
        for kind in [
            InterpolatorKind::Zero,
            InterpolatorKind::InverseDistanceWeighting,
            InterpolatorKind::NaturalNeighbor,
            InterpolatorKind::Linear,
            InterpolatorKind::LeastSquares,
        ] {
            let config = ElevationConfigBuilder::new().interpolator(kind).build().unwrap();
            let interpolator = Interpolator::from_config(&config);
            assert_eq!(interpolator.kind(), kind);
            assert_eq!(interpolator.is_zero(), kind == InterpolatorKind::Zero);
        }
    }

    #[test]
    fn test_site_conversions() {
        let site = KnownSite::from_xyz(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(site, KnownSite::new(1.0, 3.0, 2.0));
        assert_eq!(site.to_xyz(), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(site.bounding_box(), Rect::new(1.0, 3.0, 1.0, 3.0));
    }

    #[test]
    fn test_build_triangulation_skips_duplicates() {
        let sites = vec![
            KnownSite::new(0.0, 0.0, 1.0),
            KnownSite::new(10.0, 0.0, 2.0),
            KnownSite::new(10.0, 0.0, 5.0),
            KnownSite::new(5.0, 8.0, 3.0),
        ];
        let triangulation = build_triangulation(&sites, 100.0, 1).unwrap();
        triangulation.check_invariants().unwrap();
        assert!(triangulation.last_insertion().is_empty());
        // 3 distinct sites inside the padded rectangle
        assert_eq!(triangulation.triangle_count(), 2 + 2 * 3);

        assert!(build_triangulation(&[], 100.0, 1).is_err());
    }
}
