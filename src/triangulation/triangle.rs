//! Triangle records of the Delaunay triangulation

use glam::{DVec2, DVec3};

use crate::geometry::xz;

/// Stable index of a triangle in the triangulation's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriangleId(pub(crate) usize);

impl TriangleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Twice the signed area of the triangle (a, b, c) in the ground plane
///
/// Positive for counter-clockwise order.
#[inline]
pub fn orientation(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

/// A counter-clockwise triangle with links to its neighbors
///
/// Points carry a scalar value in their Y component, positions are X and Z.
/// Neighbor `i` shares the edge opposite point `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DelaunayTriangle {
    points: [DVec3; 3],
    pub(crate) neighbors: [Option<TriangleId>; 3],
}

impl DelaunayTriangle {
    /// Create an unlinked triangle
    ///
    /// # Panics
    ///
    /// Panics if the points are clockwise or collinear in the ground plane.
    /// Such a triangle can only result from a broken triangulation.
    pub fn new(p0: DVec3, p1: DVec3, p2: DVec3) -> Self {
        let area = orientation(xz(p0), xz(p1), xz(p2));
        assert!(
            area > 0.0,
            "triangle must be counter-clockwise and non-degenerate: {:?}, {:?}, {:?}",
            p0,
            p1,
            p2
        );

        Self {
            points: [p0, p1, p2],
            neighbors: [None; 3],
        }
    }

    #[inline]
    pub fn point(&self, i: usize) -> DVec3 {
        self.points[i % 3]
    }

    #[inline]
    pub fn points(&self) -> &[DVec3; 3] {
        &self.points
    }

    #[inline]
    pub fn neighbor(&self, i: usize) -> Option<TriangleId> {
        self.neighbors[i % 3]
    }

    #[inline]
    pub fn neighbors(&self) -> &[Option<TriangleId>; 3] {
        &self.neighbors
    }

    /// Index of the point at a ground position
    pub fn index_of_point(&self, pos: DVec2) -> Option<usize> {
        self.points.iter().position(|&p| xz(p) == pos)
    }

    pub fn index_of_neighbor(&self, neighbor: TriangleId) -> Option<usize> {
        self.neighbors.iter().position(|&n| n == Some(neighbor))
    }

    pub fn has_point(&self, pos: DVec2) -> bool {
        self.index_of_point(pos).is_some()
    }

    /// Interior angle at point `i`, in radians
    pub fn angle_at(&self, i: usize) -> f64 {
        let origin = xz(self.point(i));
        let to_next = xz(self.point(i + 1)) - origin;
        let to_prev = xz(self.point(i + 2)) - origin;
        to_next.perp_dot(to_prev).abs().atan2(to_next.dot(to_prev))
    }

    /// Center of the circumscribed circle, a vertex of the dual Voronoi diagram
    pub fn circumcenter(&self) -> DVec2 {
        let a = xz(self.points[0]);
        let b = xz(self.points[1]) - a;
        let c = xz(self.points[2]) - a;

        let d = 2.0 * b.perp_dot(c);
        let b_sq = b.length_squared();
        let c_sq = c.length_squared();

        a + DVec2::new(
            (c.y * b_sq - b.y * c_sq) / d,
            (b.x * c_sq - c.x * b_sq) / d,
        )
    }

    /// Barycentric weights of a ground position with respect to the three points
    pub fn barycentric(&self, pos: DVec2) -> [f64; 3] {
        let [a, b, c] = self.points.map(xz);
        let total = orientation(a, b, c);
        [
            orientation(pos, b, c) / total,
            orientation(a, pos, c) / total,
            orientation(a, b, pos) / total,
        ]
    }

    /// Twice the signed area of the triangle in the ground plane
    pub fn double_area(&self) -> f64 {
        orientation(xz(self.points[0]), xz(self.points[1]), xz(self.points[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn right_triangle() -> DelaunayTriangle {
        DelaunayTriangle::new(
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(2.0, 2.0, 0.0),
            DVec3::new(0.0, 3.0, 2.0),
        )
    }

    #[test]
    #[should_panic(expected = "counter-clockwise")]
    fn test_clockwise_triangle_panics() {
        DelaunayTriangle::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    #[should_panic(expected = "non-degenerate")]
    fn test_degenerate_triangle_panics() {
        DelaunayTriangle::new(DVec3::ZERO, DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_angles() {
        let t = right_triangle();
        assert!((t.angle_at(0) - FRAC_PI_2).abs() < 1e-12);
        assert!((t.angle_at(1) - FRAC_PI_4).abs() < 1e-12);
        assert!((t.angle_at(2) - FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_circumcenter_of_right_triangle_is_hypotenuse_midpoint() {
        let c = right_triangle().circumcenter();
        assert!((c - DVec2::new(1.0, 1.0)).length() < 1e-12);
    }

    #[test]
    fn test_barycentric() {
        let t = right_triangle();
        let w = t.barycentric(DVec2::new(0.0, 0.0));
        assert!((w[0] - 1.0).abs() < 1e-12);

        let w = t.barycentric(DVec2::new(0.5, 0.5));
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(w.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_index_of_point() {
        let t = right_triangle();
        assert_eq!(t.index_of_point(DVec2::new(2.0, 0.0)), Some(1));
        assert_eq!(t.index_of_point(DVec2::new(5.0, 5.0)), None);
    }
}
