//! Blended local quadratic surfaces fitted by least squares

use glam::DVec2;
use log::debug;
use nalgebra::{DMatrix, DVector};

use super::{KnownSite, TerrainInterpolator};
use crate::error::{ElevationError, Result};
use crate::geometry::{Bounded, Rect};
use crate::spatial::IndexGrid;

/// Number of coefficients of a quadratic in two variables
const COEFFICIENTS: usize = 6;

/// Largest accepted magnitude of a fitted slope or curvature coefficient
const MAX_COEFFICIENT: f64 = 1e4;

/// Quadratic `c0 + c1 dx + c2 dz + c3 dx² + c4 dx dz + c5 dz²` around a site
#[derive(Debug, Clone, Copy, PartialEq)]
struct LocalSurface {
    origin: DVec2,
    coefficients: [f64; COEFFICIENTS],
}

impl LocalSurface {
    fn constant(origin: DVec2, elevation: f64) -> Self {
        let mut coefficients = [0.0; COEFFICIENTS];
        coefficients[0] = elevation;
        Self { origin, coefficients }
    }

    fn terms(offset: DVec2) -> [f64; COEFFICIENTS] {
        let (dx, dz) = (offset.x, offset.y);
        [1.0, dx, dz, dx * dx, dx * dz, dz * dz]
    }

    /// Least squares fit through the given sites, in coordinates local to `origin`
    ///
    /// Returns `None` for underdetermined or ill-conditioned fits.
    fn fit(origin: DVec2, sites: &[&KnownSite]) -> Option<Self> {
        if sites.len() < COEFFICIENTS {
            return None;
        }

        let rows: Vec<[f64; COEFFICIENTS]> =
            sites.iter().map(|s| Self::terms(s.position - origin)).collect();
        let a = DMatrix::from_fn(sites.len(), COEFFICIENTS, |i, j| rows[i][j]);
        let b = DVector::from_iterator(sites.len(), sites.iter().map(|s| s.elevation));

        let qr = a.qr();
        let solution = qr.r().solve_upper_triangular(&(qr.q().transpose() * b))?;

        let mut coefficients = [0.0; COEFFICIENTS];
        for (c, value) in coefficients.iter_mut().zip(solution.iter()) {
            *c = *value;
        }

        let usable = coefficients.iter().all(|c| c.is_finite())
            && coefficients[1..].iter().all(|c| c.abs() <= MAX_COEFFICIENT);
        usable.then_some(Self { origin, coefficients })
    }

    fn evaluate(&self, pos: DVec2) -> f64 {
        Self::terms(pos - self.origin)
            .iter()
            .zip(&self.coefficients)
            .map(|(t, c)| t * c)
            .sum()
    }
}

impl Bounded for LocalSurface {
    fn bounding_box(&self) -> Rect {
        Rect::from_point(self.origin)
    }
}

/// The `k` items nearest to `pos`, closest first
///
/// Grows the searched cell neighborhood until it holds `k` items and is wide
/// enough that no item outside it can be closer than the `k`-th one.
fn nearest<T>(
    grid: &IndexGrid<T>,
    pos: DVec2,
    k: usize,
    position: impl Fn(&T) -> DVec2,
) -> Vec<&T> {
    if k == 0 {
        return Vec::new();
    }
    let (count_x, count_z) = grid.cell_counts();
    let cell = grid.cell_size().min_element();
    let last_radius = count_x.max(count_z);

    let mut radius = 0;
    loop {
        let mut found: Vec<(f64, &T)> = grid
            .neighborhood(pos, radius)
            .map(|item| (position(item).distance(pos), item))
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0));

        let settled = found.len() >= k && found[k - 1].0 <= radius as f64 * cell;
        if settled || radius >= last_radius {
            return found.into_iter().take(k).map(|(_, item)| item).collect();
        }
        radius += 1;
    }
}

/// Weighted blend of quadratic surfaces fitted around each known site
///
/// Every site gets a quadratic fitted by least squares (QR decomposition)
/// through its `fit_sites` nearest sites. A query blends the surfaces of its
/// `blend_sites` nearest sites with weights falling linearly from 1 at the
/// site to 0 at `blend_distance`. Sites with too few neighbors or an
/// ill-conditioned fit use their own elevation as a flat surface.
///
/// # Example
///
/// ```
/// use scene_elevation::{DVec2, KnownSite, LeastSquaresInterpolator, TerrainInterpolator};
///
/// let sites: Vec<KnownSite> = (0..25)
///     .map(|i| {
///         let (x, z) = ((i % 5) as f64 * 20.0, (i / 5) as f64 * 20.0);
///         KnownSite::new(x, z, 0.5 * x + 2.0)
///     })
///     .collect();
///
/// let mut least_squares = LeastSquaresInterpolator::default();
/// least_squares.set_known_sites(&sites);
///
/// assert!((least_squares.interpolate_ele(DVec2::new(35.0, 47.0)) - 19.5).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct LeastSquaresInterpolator {
    cell_size: f64,
    fit_sites: usize,
    blend_sites: usize,
    blend_distance: f64,
    surfaces: Option<IndexGrid<LocalSurface>>,
    flat_surfaces: usize,
}

impl LeastSquaresInterpolator {
    pub const DEFAULT_CELL_SIZE: f64 = 50.0;
    pub const DEFAULT_FIT_SITES: usize = 9;
    pub const DEFAULT_BLEND_SITES: usize = 29;
    pub const DEFAULT_BLEND_DISTANCE: f64 = 120.0;

    pub fn new(fit_sites: usize, blend_sites: usize, blend_distance: f64) -> Self {
        Self {
            cell_size: Self::DEFAULT_CELL_SIZE,
            fit_sites,
            blend_sites,
            blend_distance,
            surfaces: None,
            flat_surfaces: 0,
        }
    }

    #[inline]
    pub fn fit_sites(&self) -> usize {
        self.fit_sites
    }

    #[inline]
    pub fn blend_sites(&self) -> usize {
        self.blend_sites
    }

    #[inline]
    pub fn blend_distance(&self) -> f64 {
        self.blend_distance
    }

    /// Number of sites whose fit was rejected in favor of a flat surface
    #[inline]
    pub fn flat_surface_count(&self) -> usize {
        self.flat_surfaces
    }

    fn weight(&self, distance: f64) -> f64 {
        (1.0 - distance / self.blend_distance).max(0.0)
    }
}

impl Default for LeastSquaresInterpolator {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_FIT_SITES,
            Self::DEFAULT_BLEND_SITES,
            Self::DEFAULT_BLEND_DISTANCE,
        )
    }
}

impl TerrainInterpolator for LeastSquaresInterpolator {
    fn set_known_sites(&mut self, sites: &[KnownSite]) {
        self.flat_surfaces = 0;
        let Some(bounds) = Rect::bbox(sites.iter().map(|s| s.position)) else {
            self.surfaces = None;
            return;
        };
        let bounds = bounds.pad(self.cell_size / 2.0);

        let mut site_grid = IndexGrid::with_cell_size(bounds, self.cell_size, self.cell_size);
        for site in sites {
            site_grid.insert(*site);
        }

        let mut surfaces = IndexGrid::with_cell_size(bounds, self.cell_size, self.cell_size);
        for site in sites {
            let neighbors = nearest(&site_grid, site.position, self.fit_sites, |s| s.position);
            let surface = LocalSurface::fit(site.position, &neighbors).unwrap_or_else(|| {
                self.flat_surfaces += 1;
                LocalSurface::constant(site.position, site.elevation)
            });
            surfaces.insert(surface);
        }
        debug!(
            "fitted {} local surfaces, {} of them flat",
            sites.len(),
            self.flat_surfaces
        );
        self.surfaces = Some(surfaces);
    }

    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64> {
        let Some(grid) = &self.surfaces else {
            return Err(ElevationError::DataUnavailable("no known sites".to_string()));
        };

        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for surface in nearest(grid, pos, self.blend_sites, |s| s.origin) {
            let weight = self.weight(surface.origin.distance(pos));
            weight_sum += weight;
            value_sum += weight * surface.evaluate(pos);
        }

        if weight_sum <= 0.0 {
            return Err(ElevationError::DataUnavailable(format!(
                "no known site within {} of ({}, {})",
                self.blend_distance, pos.x, pos.y
            )));
        }
        Ok(value_sum / weight_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(x: f64, z: f64) -> f64 {
        0.01 * x * x - 0.02 * x * z + 0.5 * z + 3.0
    }

    fn grid_sites(f: impl Fn(f64, f64) -> f64) -> Vec<KnownSite> {
        let mut sites = Vec::new();
        for i in 0..=20 {
            for j in 0..=20 {
                let (x, z) = (i as f64 * 10.0, j as f64 * 10.0);
                sites.push(KnownSite::new(x, z, f(x, z)));
            }
        }
        sites
    }

    fn interpolator(sites: &[KnownSite]) -> LeastSquaresInterpolator {
        let mut least_squares = LeastSquaresInterpolator::default();
        least_squares.set_known_sites(sites);
        least_squares
    }

    #[test]
    fn test_reproduces_quadratic_surface() {
        let least_squares = interpolator(&grid_sites(quadratic));
        assert_eq!(least_squares.flat_surface_count(), 0);

        for pos in [
            DVec2::new(100.0, 100.0),
            DVec2::new(37.5, 142.0),
            DVec2::new(155.0, 61.3),
            DVec2::new(3.0, 197.0),
        ] {
            let ele = least_squares.interpolate_ele(pos);
            assert!((ele - quadratic(pos.x, pos.y)).abs() < 1e-6, "{:?}: {}", pos, ele);
        }
    }

    #[test]
    fn test_site_positions_keep_their_elevation() {
        let least_squares = interpolator(&grid_sites(quadratic));
        let ele = least_squares.interpolate_ele(DVec2::new(50.0, 80.0));
        assert!((ele - quadratic(50.0, 80.0)).abs() < 1e-6);
    }

    #[test]
    fn test_no_sites_gives_zero() {
        let least_squares = interpolator(&[]);
        assert_eq!(least_squares.interpolate_ele(DVec2::new(1.0, 2.0)), 0.0);
        assert!(matches!(
            least_squares.try_interpolate_ele(DVec2::new(1.0, 2.0)),
            Err(ElevationError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_few_sites_use_flat_surfaces() {
        let least_squares = interpolator(&[KnownSite::new(0.0, 0.0, 7.0)]);
        assert_eq!(least_squares.flat_surface_count(), 1);
        assert!((least_squares.interpolate_ele(DVec2::new(30.0, -40.0)) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_sites_use_flat_surfaces() {
        // A line of sites leaves the quadratic underdetermined
        let sites: Vec<KnownSite> =
            (0..12).map(|i| KnownSite::new(i as f64 * 10.0, 0.0, 5.0)).collect();
        let least_squares = interpolator(&sites);
        assert_eq!(least_squares.flat_surface_count(), sites.len());
        assert!((least_squares.interpolate_ele(DVec2::new(45.0, 20.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_beyond_blend_distance_gives_zero() {
        let least_squares = interpolator(&[KnownSite::new(0.0, 0.0, 7.0)]);
        let far = DVec2::new(500.0, 0.0);
        assert_eq!(least_squares.interpolate_ele(far), 0.0);
        assert!(matches!(
            least_squares.try_interpolate_ele(far),
            Err(ElevationError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_nearest_is_exact_across_cells() {
        let sites = grid_sites(|_, _| 0.0);
        let bounds = Rect::new(0.0, 0.0, 200.0, 200.0);
        let mut grid = IndexGrid::with_cell_size(bounds, 50.0, 50.0);
        for site in &sites {
            grid.insert(*site);
        }

        // Query close to a cell border, outside the grid too
        for pos in [DVec2::new(49.0, 51.0), DVec2::new(-30.0, 100.0), DVec2::new(260.0, 260.0)] {
            let found = nearest(&grid, pos, 9, |s| s.position);
            let mut expected: Vec<f64> = sites.iter().map(|s| s.position.distance(pos)).collect();
            expected.sort_by(f64::total_cmp);

            assert_eq!(found.len(), 9);
            for (site, distance) in found.iter().zip(&expected) {
                assert!((site.position.distance(pos) - distance).abs() < 1e-9);
            }
        }
    }
}
