//! Inverse distance weighting over a uniform grid of known sites

use glam::DVec2;

use super::{KnownSite, TerrainInterpolator};
use crate::error::{ElevationError, Result};
use crate::geometry::Rect;
use crate::spatial::IndexGrid;

/// Distance below which a query is considered to hit a site exactly
const COINCIDENT_DISTANCE: f64 = 1e-9;

/// Weighted average of the sites within a cutoff radius
///
/// Each site within `cutoff` of the query contributes with weight
/// `distance^(-exponent)`. Sites are indexed in a grid whose cells are at
/// least `cutoff` wide, so the 3×3 cell neighborhood of the query holds every
/// site that can contribute.
///
/// # Example
///
/// ```
/// use scene_elevation::{
///     DVec2, InverseDistanceWeightingInterpolator, KnownSite, TerrainInterpolator,
/// };
///
/// let mut idw = InverseDistanceWeightingInterpolator::default();
/// idw.set_known_sites(&[KnownSite::new(0.0, 0.0, 10.0), KnownSite::new(10.0, 0.0, 20.0)]);
///
/// assert!((idw.interpolate_ele(DVec2::new(5.0, 0.0)) - 15.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct InverseDistanceWeightingInterpolator {
    exponent: f64,
    cutoff: f64,
    grid: Option<IndexGrid<KnownSite>>,
}

impl InverseDistanceWeightingInterpolator {
    pub const DEFAULT_EXPONENT: f64 = 2.0;
    pub const DEFAULT_CUTOFF: f64 = 300.0;

    pub fn new(exponent: f64, cutoff: f64) -> Self {
        Self {
            exponent,
            cutoff,
            grid: None,
        }
    }

    #[inline]
    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    #[inline]
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Weight of a site at the given distance
    #[inline]
    pub fn weight(&self, distance: f64) -> f64 {
        distance.powf(-self.exponent)
    }

    /// Sites near a position and their unnormalized weights
    fn neighborhood(&self, pos: DVec2) -> Neighborhood {
        let Some(grid) = &self.grid else {
            return Neighborhood::Weighted(Vec::new());
        };

        let mut contributions = Vec::new();
        for site in grid.neighborhood(pos, 1) {
            let distance = site.position.distance(pos);
            if distance <= COINCIDENT_DISTANCE {
                return Neighborhood::Coincident(site.elevation);
            }
            if distance <= self.cutoff {
                contributions.push((self.weight(distance), site.elevation));
            }
        }
        Neighborhood::Weighted(contributions)
    }
}

/// Sites contributing to the elevation at a query position
enum Neighborhood {
    /// The query hits a site, whose elevation is used as is
    Coincident(f64),
    /// Weight and elevation of each site within the cutoff
    Weighted(Vec<(f64, f64)>),
}

impl Default for InverseDistanceWeightingInterpolator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EXPONENT, Self::DEFAULT_CUTOFF)
    }
}

impl TerrainInterpolator for InverseDistanceWeightingInterpolator {
    fn set_known_sites(&mut self, sites: &[KnownSite]) {
        let Some(bounds) = Rect::bbox(sites.iter().map(|s| s.position)) else {
            self.grid = None;
            return;
        };

        let cells = |size: f64| ((size / self.cutoff).floor() as usize).max(1);
        let mut grid = IndexGrid::new(bounds, cells(bounds.size_x()), cells(bounds.size_z()));
        for site in sites {
            grid.insert(*site);
        }
        self.grid = Some(grid);
    }

    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64> {
        let contributions = match self.neighborhood(pos) {
            Neighborhood::Coincident(ele) => return Ok(ele),
            Neighborhood::Weighted(contributions) => contributions,
        };

        let weight_sum: f64 = contributions.iter().map(|(w, _)| w).sum();
        if weight_sum <= 0.0 {
            return Err(ElevationError::DataUnavailable(format!(
                "no known site within {} of ({}, {})",
                self.cutoff, pos.x, pos.y
            )));
        }
        Ok(contributions.iter().map(|(w, ele)| w * ele).sum::<f64>() / weight_sum)
    }
}
