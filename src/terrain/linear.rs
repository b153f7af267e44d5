//! Piecewise linear interpolation over the Delaunay triangles of the sites

use glam::DVec2;
use log::error;

use super::{build_triangulation, KnownSite, TerrainInterpolator};
use crate::error::{ElevationError, Result};
use crate::geometry::xz;
use crate::triangulation::{DelaunayTriangulation, Location};

/// Barycentric interpolation within the triangle enclosing the query
///
/// Corners of the padded triangulation bounds carry no elevation, so their
/// weights are dropped and the remaining ones renormalized.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    padding: f64,
    seed: u64,
    triangulation: Option<DelaunayTriangulation>,
}

impl LinearInterpolator {
    pub fn new(padding: f64, seed: u64) -> Self {
        Self {
            padding,
            seed,
            triangulation: None,
        }
    }
}

impl Default for LinearInterpolator {
    fn default() -> Self {
        Self::new(super::NaturalNeighborInterpolator::DEFAULT_PADDING, 0)
    }
}

impl TerrainInterpolator for LinearInterpolator {
    fn set_known_sites(&mut self, sites: &[KnownSite]) {
        self.triangulation = if sites.is_empty() {
            None
        } else {
            build_triangulation(sites, self.padding, self.seed)
                .map_err(|err| error!("could not triangulate known sites: {}", err))
                .ok()
        };
    }

    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64> {
        let triangulation = self
            .triangulation
            .as_ref()
            .ok_or_else(|| ElevationError::DataUnavailable("no known sites".to_string()))?;

        let id = match triangulation.locate(pos) {
            Location::Vertex(site) => {
                return Ok(if triangulation.is_auxiliary(xz(site)) { 0.0 } else { site.y });
            }
            Location::Inside(id) | Location::OnEdge(id, _) => id,
            Location::Outside => {
                return Err(ElevationError::OutsideTriangulation { x: pos.x, z: pos.y });
            }
        };

        let triangle = triangulation.triangle(id);
        let weights = triangle.barycentric(pos);

        let (mut weighted, mut total) = (0.0, 0.0);
        for (i, w) in weights.into_iter().enumerate() {
            let point = triangle.point(i);
            if !triangulation.is_auxiliary(xz(point)) {
                weighted += w.max(0.0) * point.y;
                total += w.max(0.0);
            }
        }

        Ok(if total > 0.0 { weighted / total } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inside_triangle() {
        let mut linear = LinearInterpolator::default();
        linear.set_known_sites(&[
            KnownSite::new(0.0, 0.0, 0.0),
            KnownSite::new(10.0, 0.0, 10.0),
            KnownSite::new(0.0, 10.0, 20.0),
        ]);

        assert!((linear.interpolate_ele(DVec2::new(2.0, 3.0)) - (2.0 + 6.0)).abs() < 1e-9);
        assert_eq!(linear.interpolate_ele(DVec2::new(10.0, 0.0)), 10.0);
        assert!((linear.interpolate_ele(DVec2::new(5.0, 0.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_auxiliary_corners_are_ignored() {
        let mut linear = LinearInterpolator::default();
        linear.set_known_sites(&[KnownSite::new(0.0, 0.0, 8.0)]);

        // Every triangle has exactly one real vertex, the site itself
        assert!((linear.interpolate_ele(DVec2::new(30.0, -20.0)) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_or_empty_gives_zero() {
        let mut linear = LinearInterpolator::default();
        assert_eq!(linear.interpolate_ele(DVec2::ZERO), 0.0);

        linear.set_known_sites(&[KnownSite::new(0.0, 0.0, 8.0)]);
        assert_eq!(linear.interpolate_ele(DVec2::new(1000.0, 0.0)), 0.0);
        assert!(matches!(
            linear.try_interpolate_ele(DVec2::new(1000.0, 0.0)),
            Err(ElevationError::OutsideTriangulation { .. })
        ));
    }
}
