//! Sibson natural neighbor interpolation
//!
//! The weight of a neighbor site is the share of the query point's Voronoi
//! cell that the query would take away from that site's cell if it were
//! inserted. The query is inserted into the Delaunay triangulation of the
//! sites, the stolen areas are measured from circumcenters, and the
//! insertion is undone again.

use std::collections::HashSet;
use std::f64::consts::TAU;
use std::sync::{Mutex, PoisonError};

use glam::{DVec2, DVec3};
use log::error;

use super::{build_triangulation, KnownSite, TerrainInterpolator};
use crate::error::{ElevationError, Result};
use crate::geometry::{with_y, xz};
use crate::triangulation::{DelaunayTriangulation, TriangleId};

/// Minimum distance of a query from the triangulation border
const BORDER_MARGIN: f64 = 1e-9;

/// Queries closer than this to a site take the site's value
const SNAP_DISTANCE: f64 = 1e-7;

/// Neighbor sites of a query position and their normalized weights
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalNeighbors {
    /// Neighbor sites, Y carrying their value
    pub sites: Vec<DVec3>,
    /// Weight of each site, summing to 1 unless empty
    pub weights: Vec<f64>,
}

impl NaturalNeighbors {
    /// Weighted sum of the neighbor values
    pub fn value(&self) -> f64 {
        self.sites.iter().zip(&self.weights).map(|(s, w)| s.y * w).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Compute the natural neighbors of a position
///
/// Auxiliary bounding vertices of the triangulation are left out and the
/// remaining weights renormalized. A position on or right next to an
/// existing vertex yields that vertex alone. The triangulation is unchanged
/// afterwards.
///
/// # Errors
///
/// Returns `OutsideTriangulation` if the position is not strictly inside
/// the triangulation's bounds.
pub fn natural_neighbors(
    triangulation: &mut DelaunayTriangulation,
    pos: DVec2,
) -> Result<NaturalNeighbors> {
    let outside = || ElevationError::OutsideTriangulation { x: pos.x, z: pos.y };

    if !triangulation.bounds().pad(-BORDER_MARGIN).contains(pos) {
        return Err(outside());
    }

    let corners = triangulation.bounds().corners();
    let single = |site: DVec3| {
        if corners.contains(&xz(site)) {
            NaturalNeighbors { sites: Vec::new(), weights: Vec::new() }
        } else {
            NaturalNeighbors { sites: vec![site], weights: vec![1.0] }
        }
    };

    let Some(nearest) = triangulation.nearest_vertex(pos) else {
        return Err(outside());
    };
    if xz(nearest).distance(pos) <= SNAP_DISTANCE {
        return Ok(single(nearest));
    }

    let stolen = match triangulation.insert_and_undo(with_y(pos, 0.0), |t| stolen_areas(t, pos)) {
        Ok(stolen) => stolen,
        Err(ElevationError::DuplicatePoint { .. }) => return Ok(single(nearest)),
        Err(err) => return Err(err),
    };

    let real: Vec<(DVec3, f64)> = stolen
        .into_iter()
        .filter(|(site, _)| !triangulation.is_auxiliary(xz(*site)))
        .collect();
    let total: f64 = real.iter().map(|(_, area)| area).sum();
    if total <= 0.0 {
        return Ok(NaturalNeighbors { sites: Vec::new(), weights: Vec::new() });
    }

    Ok(NaturalNeighbors {
        sites: real.iter().map(|(site, _)| *site).collect(),
        weights: real.iter().map(|(_, area)| area / total).collect(),
    })
}

/// Area each neighbor loses to the freshly inserted point at `pos`
fn stolen_areas(triangulation: &DelaunayTriangulation, pos: DVec2) -> Vec<(DVec3, f64)> {
    let flips = triangulation.last_insertion();

    // Triangles that existed before the insertion and were destroyed by it
    let created: HashSet<TriangleId> = flips.iter().flat_map(|f| f.created()).copied().collect();
    let conflicts: Vec<TriangleId> = flips
        .iter()
        .flat_map(|f| f.removed())
        .copied()
        .filter(|id| !created.contains(id))
        .collect();

    let mut incident: Vec<(f64, TriangleId)> = triangulation
        .incident_triangles(pos)
        .into_iter()
        .map(|id| {
            let t = triangulation.triangle(id);
            let centroid = t.points().iter().map(|&p| xz(p)).sum::<DVec2>() / 3.0;
            let offset = centroid - pos;
            (offset.y.atan2(offset.x).rem_euclid(TAU), id)
        })
        .collect();
    incident.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut areas = Vec::with_capacity(incident.len());
    for &(_, id) in &incident {
        let t = triangulation.triangle(id);
        let Some(k) = t.index_of_point(pos) else {
            continue;
        };
        let neighbor = t.point(k + 1);
        let neighbor_pos = xz(neighbor);

        let polygon: Vec<DVec2> = incident
            .iter()
            .map(|&(_, other)| other)
            .chain(conflicts.iter().copied())
            .map(|other| triangulation.triangle(other))
            .filter(|other| other.has_point(neighbor_pos))
            .map(|other| other.circumcenter())
            .collect();

        areas.push((neighbor, convex_area(polygon)));
    }
    areas
}

/// Area of a convex polygon given by its vertices in any order
fn convex_area(mut vertices: Vec<DVec2>) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }

    let center = vertices.iter().sum::<DVec2>() / vertices.len() as f64;
    vertices.sort_by(|a, b| {
        let a = (*a - center).y.atan2((*a - center).x);
        let b = (*b - center).y.atan2((*b - center).x);
        a.total_cmp(&b)
    });

    let doubled: f64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(a, b)| a.perp_dot(*b))
        .sum();
    doubled.abs() / 2.0
}

/// Natural neighbor interpolation over a triangulation of the known sites
///
/// The triangulation is built once per call to `set_known_sites` and padded
/// beyond the sites so that every query near the data lies inside it.
/// Queries briefly modify the triangulation, so it is guarded by a mutex and
/// queries from several threads are serialized.
///
/// # Example
///
/// ```
/// use scene_elevation::{DVec2, KnownSite, NaturalNeighborInterpolator, TerrainInterpolator};
///
/// let mut nn = NaturalNeighborInterpolator::default();
/// nn.set_known_sites(&[
///     KnownSite::new(-10.0, -10.0, 1.0),
///     KnownSite::new(10.0, -10.0, 1.0),
///     KnownSite::new(10.0, 10.0, 1.0),
///     KnownSite::new(-10.0, 10.0, 1.0),
/// ]);
///
/// assert!((nn.interpolate_ele(DVec2::new(0.0, 0.0)) - 1.0).abs() < 1e-9);
/// ```
#[derive(Debug)]
pub struct NaturalNeighborInterpolator {
    padding: f64,
    seed: u64,
    triangulation: Option<Mutex<DelaunayTriangulation>>,
}

impl NaturalNeighborInterpolator {
    pub const DEFAULT_PADDING: f64 = 100.0;

    pub fn new(padding: f64, seed: u64) -> Self {
        Self {
            padding,
            seed,
            triangulation: None,
        }
    }

    /// Natural neighbors of a position in the current triangulation
    ///
    /// # Errors
    ///
    /// - `DataUnavailable` if no sites have been set
    /// - `OutsideTriangulation` if the position is outside the padded sites
    pub fn probe(&self, pos: DVec2) -> Result<NaturalNeighbors> {
        let triangulation = self
            .triangulation
            .as_ref()
            .ok_or_else(|| ElevationError::DataUnavailable("no known sites".to_string()))?;

        let mut guard = triangulation.lock().unwrap_or_else(PoisonError::into_inner);
        natural_neighbors(&mut guard, pos)
    }

    /// Copy of the current triangulation
    pub fn triangulation(&self) -> Option<DelaunayTriangulation> {
        self.triangulation
            .as_ref()
            .map(|t| t.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

impl Default for NaturalNeighborInterpolator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PADDING, 0)
    }
}

impl TerrainInterpolator for NaturalNeighborInterpolator {
    fn set_known_sites(&mut self, sites: &[KnownSite]) {
        self.triangulation = if sites.is_empty() {
            None
        } else {
            match build_triangulation(sites, self.padding, self.seed) {
                Ok(triangulation) => Some(Mutex::new(triangulation)),
                Err(err) => {
                    error!("could not triangulate known sites: {}", err);
                    None
                }
            }
        };
    }

    fn try_interpolate_ele(&self, pos: DVec2) -> Result<f64> {
        self.probe(pos).map(|neighbors| neighbors.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn plane(x: f64, z: f64) -> f64 {
        3.0 + 0.5 * x - 0.25 * z
    }

    fn grid_interpolator() -> NaturalNeighborInterpolator {
        let mut sites = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                let (x, z) = (i as f64 * 10.0, j as f64 * 10.0);
                sites.push(KnownSite::new(x, z, plane(x, z)));
            }
        }
        let mut nn = NaturalNeighborInterpolator::default();
        nn.set_known_sites(&sites);
        nn
    }

    #[test]
    fn test_convex_area() {
        let square = vec![
            DVec2::new(1.0, 1.0),
            DVec2::new(0.0, 0.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(0.0, 1.0),
        ];
        assert!((convex_area(square) - 1.0).abs() < 1e-12);
        assert_eq!(convex_area(vec![DVec2::ZERO, DVec2::ONE]), 0.0);
    }

    #[test]
    fn test_symmetric_square_weights() {
        let mut nn = NaturalNeighborInterpolator::default();
        nn.set_known_sites(&[
            KnownSite::new(-10.0, -10.0, 1.0),
            KnownSite::new(10.0, -10.0, 2.0),
            KnownSite::new(10.0, 10.0, 3.0),
            KnownSite::new(-10.0, 10.0, 4.0),
        ]);

        let neighbors = nn.probe(DVec2::new(0.0, 0.0)).unwrap();
        assert_eq!(neighbors.sites.len(), 4);
        for w in &neighbors.weights {
            assert!((w - 0.25).abs() < 1e-9);
        }
        assert!((neighbors.value() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_weights_are_normalized() {
        let nn = grid_interpolator();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..50 {
            let pos = DVec2::new(rng.gen_range(5.0..95.0), rng.gen_range(5.0..95.0));
            let neighbors = nn.probe(pos).unwrap();
            assert!(!neighbors.is_empty());
            assert!(neighbors.weights.iter().all(|&w| w >= 0.0));
            assert!((neighbors.weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_reproduces_linear_terrain() {
        let nn = grid_interpolator();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let mut queries =
            vec![DVec2::new(40.0, 45.0), DVec2::new(55.0, 55.0), DVec2::new(33.3, 47.1)];
        queries.extend(
            (0..30).map(|_| DVec2::new(rng.gen_range(30.0..70.0), rng.gen_range(30.0..70.0))),
        );

        for pos in queries {
            let ele = nn.interpolate_ele(pos);
            assert!(
                (ele - plane(pos.x, pos.y)).abs() < 1e-6,
                "at {:?}: {} != {}",
                pos,
                ele,
                plane(pos.x, pos.y)
            );
        }
    }

    #[test]
    fn test_query_on_site_returns_its_value() {
        let nn = grid_interpolator();
        assert_eq!(nn.interpolate_ele(DVec2::new(30.0, 70.0)), plane(30.0, 70.0));
    }

    #[test]
    fn test_query_right_next_to_a_site() {
        let nn = grid_interpolator();
        let before = nn.triangulation().unwrap();

        for step in 0..72 {
            let angle = step as f64 * TAU / 72.0;
            let pos = DVec2::new(50.0 + 1.3e-9 * angle.cos(), 50.0 + 1.3e-9 * angle.sin());
            let ele = nn.interpolate_ele(pos);
            assert!((ele - plane(50.0, 50.0)).abs() < 1e-6, "at {:?}: {}", pos, ele);
        }

        assert_eq!(nn.triangulation().unwrap(), before);
    }

    #[test]
    fn test_sites_closer_than_rounding_distance() {
        let mut nn = NaturalNeighborInterpolator::default();
        nn.set_known_sites(&[
            KnownSite::new(0.0, 0.0, 4.0),
            KnownSite::new(1.3e-9, 0.0, 4.0),
            KnownSite::new(10.0, 0.0, 4.0),
            KnownSite::new(0.0, 10.0, 4.0),
        ]);

        nn.triangulation().unwrap().check_invariants().unwrap();
        assert!((nn.interpolate_ele(DVec2::new(3.0, 3.0)) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_probing_leaves_triangulation_unchanged() {
        let nn = grid_interpolator();
        let before = nn.triangulation().unwrap();

        for pos in [DVec2::new(12.5, 47.0), DVec2::new(50.0, 50.0), DVec2::new(-20.0, 130.0)] {
            nn.interpolate_ele(pos);
        }

        let after = nn.triangulation().unwrap();
        assert_eq!(before, after);
        after.check_invariants().unwrap();
    }

    #[test]
    fn test_outside_padding_gives_zero() {
        let nn = grid_interpolator();
        assert!(matches!(
            nn.probe(DVec2::new(500.0, 50.0)),
            Err(ElevationError::OutsideTriangulation { .. })
        ));
        assert_eq!(nn.interpolate_ele(DVec2::new(500.0, 50.0)), 0.0);
    }

    #[test]
    fn test_without_sites() {
        let mut nn = NaturalNeighborInterpolator::default();
        nn.set_known_sites(&[]);
        assert!(nn.probe(DVec2::ZERO).is_err());
        assert_eq!(nn.interpolate_ele(DVec2::ZERO), 0.0);
    }
}
