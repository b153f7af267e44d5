//! Incremental 2D Delaunay triangulation with undoable insertion
//!
//! Points are `DVec3` values: X and Z give the position, Y is a carried
//! scalar (usually a known elevation) that the triangulation never looks at.
//!
//! Triangles live in an arena and refer to each other through
//! [`TriangleId`]s. Removed triangles are tombstoned rather than freed, which
//! lets an insertion be reverted exactly: every structural change is recorded
//! as a [`Flip`] and replayed backwards by [`DelaunayTriangulation::undo`].
//! This is what allows natural neighbor probing to insert a query point,
//! inspect the result, and restore the previous state.

mod flip;
mod triangle;

pub use flip::{Flip, Relink};
pub use triangle::{orientation, DelaunayTriangle, TriangleId};

use std::collections::VecDeque;
use std::f64::consts::PI;

use glam::{DVec2, DVec3};

use crate::error::{ElevationError, Result};
use crate::geometry::{with_y, xz, Rect};

/// Distance below which a point counts as lying on an edge or vertex
const TOLERANCE: f64 = 1e-9;

/// Slack for the opposite-angle test, prevents flipping cocircular quads
const ANGLE_EPSILON: f64 = 1e-9;

/// Where a ground position lies relative to the triangulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Location {
    /// Strictly inside a triangle
    Inside(TriangleId),
    /// On the edge opposite the given point index of a triangle
    OnEdge(TriangleId, usize),
    /// On an existing vertex
    Vertex(DVec3),
    /// Outside of the triangulated area
    Outside,
}

/// Placement of a position relative to a single triangle
enum Placement {
    Inside,
    OnEdge(usize),
    Vertex(usize),
    /// Outside, beyond the edge opposite the given index
    Outside(usize),
}

fn classify(triangle: &DelaunayTriangle, pos: DVec2) -> Placement {
    for i in 0..3 {
        if xz(triangle.point(i)).distance(pos) <= TOLERANCE {
            return Placement::Vertex(i);
        }
    }

    let mut near = [false; 3];
    let mut outside: Option<(usize, f64)> = None;

    for i in 0..3 {
        let a = xz(triangle.point(i + 1));
        let b = xz(triangle.point(i + 2));
        let signed_distance = orientation(a, b, pos) / a.distance(b);

        if signed_distance < -TOLERANCE {
            if outside.map_or(true, |(_, d)| signed_distance < d) {
                outside = Some((i, signed_distance));
            }
        } else if signed_distance <= TOLERANCE {
            near[i] = true;
        }
    }

    if let Some((i, _)) = outside {
        return Placement::Outside(i);
    }

    match near {
        [false, false, false] => Placement::Inside,
        [true, false, false] => Placement::OnEdge(0),
        [false, true, false] => Placement::OnEdge(1),
        [false, false, true] => Placement::OnEdge(2),
        // close to two edge lines: the vertex they share
        [false, true, true] => Placement::Vertex(0),
        [true, false, true] => Placement::Vertex(1),
        [true, true, false] => Placement::Vertex(2),
        [true, true, true] => Placement::Vertex(nearest_point(triangle, pos)),
    }
}

fn nearest_point(triangle: &DelaunayTriangle, pos: DVec2) -> usize {
    (0..3)
        .min_by(|&i, &j| {
            let di = xz(triangle.point(i)).distance_squared(pos);
            let dj = xz(triangle.point(j)).distance_squared(pos);
            di.total_cmp(&dj)
        })
        .unwrap_or(0)
}

/// Whether all triangles are counter-clockwise and non-degenerate
fn all_ccw(triangles: &[[DVec3; 3]]) -> bool {
    triangles
        .iter()
        .all(|[a, b, c]| orientation(xz(*a), xz(*b), xz(*c)) > 0.0)
}

/// Delaunay triangulation of points inside a fixed rectangle
///
/// The triangulation starts as the two triangles of its bounding rectangle.
/// The rectangle's corners are auxiliary vertices with a value of 0.
///
/// # Example
///
/// ```
/// use scene_elevation::{DelaunayTriangulation, Rect};
/// use glam::DVec3;
///
/// let mut triangulation = DelaunayTriangulation::new(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
/// triangulation.insert(DVec3::new(3.0, 42.0, 4.0)).unwrap();
/// assert_eq!(triangulation.triangle_count(), 4);
///
/// let before = triangulation.clone();
/// triangulation.insert_and_undo(DVec3::new(6.0, 0.0, 7.0), |t| t.triangle_count()).unwrap();
/// assert_eq!(triangulation, before);
/// ```
#[derive(Debug, Clone)]
pub struct DelaunayTriangulation {
    bounds: Rect,
    triangles: Vec<DelaunayTriangle>,
    alive: Vec<bool>,
    /// Flips of the most recent insertion
    undo_log: Vec<Flip>,
}

impl PartialEq for DelaunayTriangulation {
    /// Structural equality of the triangle arena, ignoring the undo log
    fn eq(&self, other: &Self) -> bool {
        self.bounds == other.bounds
            && self.triangles == other.triangles
            && self.alive == other.alive
    }
}

impl DelaunayTriangulation {
    /// Create a triangulation covering `bounds`
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` if the rectangle has no area.
    pub fn new(bounds: Rect) -> Result<Self> {
        if !(bounds.size_x() > 0.0 && bounds.size_z() > 0.0) {
            return Err(ElevationError::InvalidGeometry(format!(
                "triangulation bounds must have a positive area: {:?}",
                bounds
            )));
        }

        let [c0, c1, c2, c3] = bounds.corners().map(|c| with_y(c, 0.0));

        let mut first = DelaunayTriangle::new(c0, c1, c3);
        let mut second = DelaunayTriangle::new(c1, c2, c3);
        first.neighbors[0] = Some(TriangleId(1));
        second.neighbors[1] = Some(TriangleId(0));

        Ok(Self {
            bounds,
            triangles: vec![first, second],
            alive: vec![true, true],
            undo_log: Vec::new(),
        })
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Whether a position is one of the auxiliary bounding corners
    pub fn is_auxiliary(&self, pos: DVec2) -> bool {
        self.bounds.corners().contains(&pos)
    }

    /// Get a triangle by id, including removed ones
    #[inline]
    pub fn triangle(&self, id: TriangleId) -> &DelaunayTriangle {
        &self.triangles[id.0]
    }

    #[inline]
    pub fn is_alive(&self, id: TriangleId) -> bool {
        self.alive.get(id.0).copied().unwrap_or(false)
    }

    /// All current triangles in arena order
    pub fn triangles(&self) -> impl Iterator<Item = (TriangleId, &DelaunayTriangle)> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(move |(i, _)| self.alive[*i])
            .map(|(i, t)| (TriangleId(i), t))
    }

    pub fn triangle_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Flips recorded by the most recent insertion
    pub fn last_insertion(&self) -> &[Flip] {
        &self.undo_log
    }

    /// All triangles having a vertex at the given position
    pub fn incident_triangles(&self, pos: DVec2) -> Vec<TriangleId> {
        self.triangles()
            .filter(|(_, t)| t.has_point(pos))
            .map(|(id, _)| id)
            .collect()
    }

    /// Find where a position lies
    ///
    /// Walks from the newest triangle towards the position and falls back to
    /// a linear scan if the walk does not arrive.
    pub fn locate(&self, pos: DVec2) -> Location {
        if !pos.is_finite() {
            return Location::Outside;
        }

        let last_alive = (0..self.triangles.len()).rev().find(|&i| self.alive[i]);
        let Some(mut current) = last_alive.map(TriangleId) else {
            return Location::Outside;
        };

        for _ in 0..self.triangles.len() {
            let triangle = &self.triangles[current.0];
            match classify(triangle, pos) {
                Placement::Inside => return Location::Inside(current),
                Placement::OnEdge(i) => return Location::OnEdge(current, i),
                Placement::Vertex(i) => return Location::Vertex(triangle.point(i)),
                Placement::Outside(i) => match triangle.neighbor(i) {
                    Some(next) => current = next,
                    None => break,
                },
            }
        }

        self.locate_by_scan(pos)
    }

    fn locate_by_scan(&self, pos: DVec2) -> Location {
        for (id, triangle) in self.triangles() {
            match classify(triangle, pos) {
                Placement::Inside => return Location::Inside(id),
                Placement::OnEdge(i) => return Location::OnEdge(id, i),
                Placement::Vertex(i) => return Location::Vertex(triangle.point(i)),
                Placement::Outside(_) => {}
            }
        }
        Location::Outside
    }

    /// Insert a point and restore the Delaunay property
    ///
    /// The performed flips replace the undo log, so [`undo`](Self::undo)
    /// reverts exactly this insertion.
    ///
    /// # Errors
    ///
    /// - `OutsideTriangulation` if the point is not inside the bounds
    /// - `DuplicatePoint` if a vertex already exists at the point's position,
    ///   or so close to it that no valid triangles can be formed
    pub fn insert(&mut self, point: DVec3) -> Result<()> {
        let pos = xz(point);
        let duplicate = || ElevationError::DuplicatePoint { x: point.x, z: point.z };

        if !self.bounds.contains(pos) {
            return Err(ElevationError::OutsideTriangulation { x: point.x, z: point.z });
        }

        // positions within rounding distance of a vertex would create slivers
        let first_flip = match self.locate(pos) {
            Location::Inside(id) if self.can_split(id, point) => self.split(id, point),
            Location::OnEdge(id, edge) if self.can_split_edge(id, edge, point) => {
                self.split_edge(id, edge, point)
            }
            Location::Inside(_) | Location::OnEdge(..) | Location::Vertex(_) => {
                return Err(duplicate());
            }
            Location::Outside => {
                return Err(ElevationError::OutsideTriangulation { x: point.x, z: point.z });
            }
        };

        let mut unchecked: VecDeque<TriangleId> = first_flip.created().iter().copied().collect();
        let mut flips = vec![first_flip];

        while let Some(id) = unchecked.pop_front() {
            if !self.alive[id.0] {
                continue;
            }
            if let Some(flip) = self.legalize(id, pos) {
                unchecked.extend(flip.created().iter().copied());
                flips.push(flip);
            }
        }

        self.undo_log = flips;
        Ok(())
    }

    /// Revert the most recent insertion
    ///
    /// Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let flips = std::mem::take(&mut self.undo_log);
        if flips.is_empty() {
            return false;
        }
        for flip in flips.iter().rev() {
            self.revert(flip);
        }
        true
    }

    /// Temporarily insert a point, inspect the result, then revert it
    ///
    /// The triangulation and its undo log are identical before and after
    /// the call, whether or not the insertion succeeds.
    pub fn insert_and_undo<R>(
        &mut self,
        point: DVec3,
        inspect: impl FnOnce(&Self) -> R,
    ) -> Result<R> {
        let saved_log = std::mem::take(&mut self.undo_log);

        let result = self.insert(point).map(|()| {
            let value = inspect(self);
            self.undo();
            value
        });

        self.undo_log = saved_log;
        result
    }

    /// Drop removed triangles from the arena
    ///
    /// Triangle ids change and the undo log is cleared, so the most recent
    /// insertion can no longer be undone.
    pub fn compact(&mut self) {
        let mut remap = vec![None; self.triangles.len()];
        let mut next = 0;
        for (i, &alive) in self.alive.iter().enumerate() {
            if alive {
                remap[i] = Some(TriangleId(next));
                next += 1;
            }
        }

        let triangles = std::mem::take(&mut self.triangles);
        self.triangles = triangles
            .into_iter()
            .zip(&self.alive)
            .filter(|(_, &alive)| alive)
            .map(|(mut triangle, _)| {
                triangle.neighbors = triangle.neighbors.map(|n| n.and_then(|id| remap[id.0]));
                triangle
            })
            .collect();
        self.alive = vec![true; self.triangles.len()];
        self.undo_log.clear();
    }

    /// Check structural invariants: orientation and symmetric neighbor links
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for (id, triangle) in self.triangles() {
            if triangle.double_area() <= 0.0 {
                return Err(format!("triangle {:?} is not counter-clockwise", id));
            }

            for i in 0..3 {
                let Some(neighbor_id) = triangle.neighbor(i) else {
                    continue;
                };
                if !self.is_alive(neighbor_id) {
                    return Err(format!("triangle {:?} links to removed {:?}", id, neighbor_id));
                }
                let neighbor = self.triangle(neighbor_id);
                let Some(j) = neighbor.index_of_neighbor(id) else {
                    return Err(format!("link {:?} -> {:?} is not symmetric", id, neighbor_id));
                };
                let shares_edge = xz(triangle.point(i + 1)) == xz(neighbor.point(j + 2))
                    && xz(triangle.point(i + 2)) == xz(neighbor.point(j + 1));
                if !shares_edge {
                    return Err(format!(
                        "{:?} and {:?} do not share the linked edge",
                        id, neighbor_id
                    ));
                }
            }
        }
        Ok(())
    }

    /// The vertex closest to a position, if it lies in the triangulation
    pub fn nearest_vertex(&self, pos: DVec2) -> Option<DVec3> {
        let id = match self.locate(pos) {
            Location::Vertex(vertex) => return Some(vertex),
            Location::Inside(id) | Location::OnEdge(id, _) => id,
            Location::Outside => return None,
        };
        let triangle = &self.triangles[id.0];
        Some(triangle.point(nearest_point(triangle, pos)))
    }

    fn can_split(&self, id: TriangleId, point: DVec3) -> bool {
        let [a, b, c] = *self.triangles[id.0].points();
        all_ccw(&[[a, b, point], [b, c, point], [c, a, point]])
    }

    fn can_split_edge(&self, id: TriangleId, k: usize, point: DVec3) -> bool {
        let triangle = &self.triangles[id.0];
        let (c, a, b) = (triangle.point(k), triangle.point(k + 1), triangle.point(k + 2));
        if !all_ccw(&[[c, a, point], [c, point, b]]) {
            return false;
        }

        match triangle.neighbor(k) {
            Some(other_id) => {
                let other = &self.triangles[other_id.0];
                let Some(m) = other.index_of_neighbor(id) else {
                    unreachable!("asymmetric neighbor link between {:?} and {:?}", id, other_id);
                };
                let d = other.point(m);
                all_ccw(&[[d, b, point], [d, point, a]])
            }
            None => true,
        }
    }

    fn push(&mut self, triangle: DelaunayTriangle) -> TriangleId {
        self.triangles.push(triangle);
        self.alive.push(true);
        TriangleId(self.triangles.len() - 1)
    }

    fn link(&mut self, id: TriangleId, neighbors: [Option<TriangleId>; 3]) {
        self.triangles[id.0].neighbors = neighbors;
    }

    fn remove(&mut self, id: TriangleId) {
        self.alive[id.0] = false;
    }

    /// Point an outside neighbor from a removed triangle to its replacement
    fn relink(
        &mut self,
        outside: Option<TriangleId>,
        old: TriangleId,
        new: TriangleId,
        relinks: &mut Vec<Relink>,
    ) {
        let Some(outside) = outside else {
            return;
        };
        let Some(slot) = self.triangles[outside.0].index_of_neighbor(old) else {
            unreachable!("asymmetric neighbor link between {:?} and {:?}", outside, old);
        };
        relinks.push(Relink {
            triangle: outside,
            slot,
            previous: Some(old),
        });
        self.triangles[outside.0].neighbors[slot] = Some(new);
    }

    /// 1-to-3 split of the triangle enclosing the point
    fn split(&mut self, id: TriangleId, point: DVec3) -> Flip {
        let old = self.triangles[id.0].clone();
        let [a, b, c] = *old.points();
        let [n0, n1, n2] = *old.neighbors();

        let t0 = self.push(DelaunayTriangle::new(a, b, point));
        let t1 = self.push(DelaunayTriangle::new(b, c, point));
        let t2 = self.push(DelaunayTriangle::new(c, a, point));

        self.link(t0, [Some(t1), Some(t2), n2]);
        self.link(t1, [Some(t2), Some(t0), n0]);
        self.link(t2, [Some(t0), Some(t1), n1]);
        self.remove(id);

        let mut relinks = Vec::with_capacity(3);
        self.relink(n2, id, t0, &mut relinks);
        self.relink(n0, id, t1, &mut relinks);
        self.relink(n1, id, t2, &mut relinks);

        Flip::Split {
            removed: id,
            created: [t0, t1, t2],
            relinks,
        }
    }

    /// Split the triangles on both sides of the edge opposite point `k`
    fn split_edge(&mut self, id: TriangleId, k: usize, point: DVec3) -> Flip {
        let old = self.triangles[id.0].clone();
        let c = old.point(k);
        let a = old.point(k + 1);
        let b = old.point(k + 2);
        let outside_ca = old.neighbor(k + 2);
        let outside_bc = old.neighbor(k + 1);

        let a1 = self.push(DelaunayTriangle::new(c, a, point));
        let a2 = self.push(DelaunayTriangle::new(c, point, b));

        let mut relinks = Vec::with_capacity(4);

        let across = old.neighbor(k).map(|other_id| {
            match self.triangles[other_id.0].index_of_neighbor(id) {
                Some(m) => (other_id, m),
                None => {
                    unreachable!("asymmetric neighbor link between {:?} and {:?}", id, other_id)
                }
            }
        });

        match across {
            Some((other_id, m)) => {
                let other = self.triangles[other_id.0].clone();
                let d = other.point(m);
                debug_assert_eq!(xz(other.point(m + 1)), xz(b));
                let outside_db = other.neighbor(m + 2);
                let outside_ad = other.neighbor(m + 1);

                let b1 = self.push(DelaunayTriangle::new(d, b, point));
                let b2 = self.push(DelaunayTriangle::new(d, point, a));

                self.link(a1, [Some(b2), Some(a2), outside_ca]);
                self.link(a2, [Some(b1), outside_bc, Some(a1)]);
                self.link(b1, [Some(a2), Some(b2), outside_db]);
                self.link(b2, [Some(a1), outside_ad, Some(b1)]);
                self.remove(id);
                self.remove(other_id);

                self.relink(outside_ca, id, a1, &mut relinks);
                self.relink(outside_bc, id, a2, &mut relinks);
                self.relink(outside_db, other_id, b1, &mut relinks);
                self.relink(outside_ad, other_id, b2, &mut relinks);

                Flip::SplitEdge {
                    removed: vec![id, other_id],
                    created: vec![a1, a2, b1, b2],
                    relinks,
                }
            }
            None => {
                self.link(a1, [None, Some(a2), outside_ca]);
                self.link(a2, [None, outside_bc, Some(a1)]);
                self.remove(id);

                self.relink(outside_ca, id, a1, &mut relinks);
                self.relink(outside_bc, id, a2, &mut relinks);

                Flip::SplitEdge {
                    removed: vec![id],
                    created: vec![a1, a2],
                    relinks,
                }
            }
        }
    }

    /// Flip the edge opposite the new point if it violates the Delaunay criterion
    fn legalize(&mut self, id: TriangleId, pos: DVec2) -> Option<Flip> {
        let triangle = &self.triangles[id.0];
        let i = triangle.index_of_point(pos)?;
        let other_id = triangle.neighbor(i)?;
        let other = &self.triangles[other_id.0];
        let Some(j) = other.index_of_neighbor(id) else {
            unreachable!("asymmetric neighbor link between {:?} and {:?}", id, other_id);
        };

        if triangle.angle_at(i) + other.angle_at(j) <= PI + ANGLE_EPSILON {
            return None;
        }

        let (p, a, b) = (triangle.point(i), triangle.point(i + 1), triangle.point(i + 2));
        let q = other.point(j);
        if !all_ccw(&[[p, a, q], [p, q, b]]) {
            return None;
        }

        Some(self.flip22(id, i, other_id, j))
    }

    /// Replace the diagonal shared by two triangles
    ///
    /// `i` is the index of the new point in the first triangle, `j` the index
    /// of the apex opposite the shared edge in the second.
    fn flip22(&mut self, id: TriangleId, i: usize, other_id: TriangleId, j: usize) -> Flip {
        let t = self.triangles[id.0].clone();
        let n = self.triangles[other_id.0].clone();

        let p = t.point(i);
        let a = t.point(i + 1);
        let b = t.point(i + 2);
        let q = n.point(j);

        let outside_pa = t.neighbor(i + 2);
        let outside_bp = t.neighbor(i + 1);
        let outside_aq = n.neighbor(j + 1);
        let outside_qb = n.neighbor(j + 2);

        let t1 = self.push(DelaunayTriangle::new(p, a, q));
        let t2 = self.push(DelaunayTriangle::new(p, q, b));

        self.link(t1, [outside_aq, Some(t2), outside_pa]);
        self.link(t2, [outside_qb, outside_bp, Some(t1)]);
        self.remove(id);
        self.remove(other_id);

        let mut relinks = Vec::with_capacity(4);
        self.relink(outside_pa, id, t1, &mut relinks);
        self.relink(outside_bp, id, t2, &mut relinks);
        self.relink(outside_aq, other_id, t1, &mut relinks);
        self.relink(outside_qb, other_id, t2, &mut relinks);

        Flip::Flip22 {
            removed: [id, other_id],
            created: [t1, t2],
            relinks,
        }
    }

    fn revert(&mut self, flip: &Flip) {
        for relink in flip.relinks().iter().rev() {
            self.triangles[relink.triangle.0].neighbors[relink.slot] = relink.previous;
        }
        for &id in flip.removed() {
            self.alive[id.0] = true;
        }

        let created = flip.created();
        let first = created.iter().map(|id| id.0).min().unwrap_or(self.triangles.len());
        assert_eq!(
            first + created.len(),
            self.triangles.len(),
            "flips must be reverted in reverse order"
        );
        self.triangles.truncate(first);
        self.alive.truncate(first);
    }
}
