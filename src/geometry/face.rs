//! Flat simple polygons in 3D space

use glam::{DVec2, DVec3};

use super::{closest_point_on_segment, distance_to_segment_2d, polygon_contains, xz, Bounded, Rect};
use crate::error::{ElevationError, Result};

/// A flat simple polygon with an outward normal
///
/// The normal follows the right-hand rule over the vertex order, so a
/// horizontal face whose vertices run clockwise when seen from above
/// (counter-clockwise in the XZ plane with Z pointing towards the viewer)
/// faces upwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    vertices: Vec<DVec3>,
    normal: DVec3,
}

impl Face {
    /// Create a face from its vertex ring
    ///
    /// A closing vertex equal to the first one is dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` if there are fewer than three vertices, a
    /// coordinate is not finite, or the polygon has no area.
    pub fn new(mut vertices: Vec<DVec3>) -> Result<Self> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }

        if vertices.len() < 3 {
            return Err(ElevationError::InvalidGeometry(format!(
                "a face needs at least 3 vertices (got {})",
                vertices.len()
            )));
        }

        if vertices.iter().any(|v| !v.is_finite()) {
            return Err(ElevationError::InvalidGeometry(
                "face vertex coordinates must be finite".to_string(),
            ));
        }

        // Newell's method, robust for non-convex polygons
        let mut normal = DVec3::ZERO;
        for (i, cur) in vertices.iter().enumerate() {
            let next = vertices[(i + 1) % vertices.len()];
            normal.x += (cur.y - next.y) * (cur.z + next.z);
            normal.y += (cur.z - next.z) * (cur.x + next.x);
            normal.z += (cur.x - next.x) * (cur.y + next.y);
        }

        if normal.length() < 1e-12 {
            return Err(ElevationError::InvalidGeometry(
                "face is degenerate (zero area)".to_string(),
            ));
        }

        Ok(Self {
            vertices,
            normal: normal.normalize(),
        })
    }

    /// Upward-facing horizontal rectangle at height `y`
    pub fn horizontal(rect: Rect, y: f64) -> Result<Self> {
        Self::new(vec![
            DVec3::new(rect.min_x, y, rect.max_z),
            DVec3::new(rect.max_x, y, rect.max_z),
            DVec3::new(rect.max_x, y, rect.min_z),
            DVec3::new(rect.min_x, y, rect.min_z),
        ])
    }

    #[inline]
    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    /// Unit normal of the face
    #[inline]
    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    /// Point on the face (including its interior) closest to `p`
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        let origin = self.vertices[0];
        let in_plane = p - self.normal * self.normal.dot(p - origin);

        if self.contains_in_plane(in_plane) {
            return in_plane;
        }

        let mut closest = origin;
        let mut closest_dist = f64::INFINITY;
        for (i, &a) in self.vertices.iter().enumerate() {
            let b = self.vertices[(i + 1) % self.vertices.len()];
            let candidate = closest_point_on_segment(a, b, p);
            let dist = candidate.distance_squared(p);
            if dist < closest_dist {
                closest_dist = dist;
                closest = candidate;
            }
        }
        closest
    }

    pub fn distance_to(&self, p: DVec3) -> f64 {
        self.closest_point(p).distance(p)
    }

    /// Horizontal distance between a ground position and the face's footprint
    pub fn distance_to_xz(&self, pos: DVec2) -> f64 {
        let ring: Vec<DVec2> = self.vertices.iter().map(|&v| xz(v)).collect();
        if polygon_contains(&ring, pos) {
            return 0.0;
        }
        (0..ring.len())
            .map(|i| distance_to_segment_2d(ring[i], ring[(i + 1) % ring.len()], pos))
            .fold(f64::INFINITY, f64::min)
    }

    /// Height of the face's plane above a ground position
    ///
    /// Returns `None` for vertical faces.
    pub fn y_at(&self, pos: DVec2) -> Option<f64> {
        if self.normal.y.abs() < 1e-12 {
            return None;
        }
        let origin = self.vertices[0];
        let dx = pos.x - origin.x;
        let dz = pos.y - origin.z;
        Some(origin.y - (self.normal.x * dx + self.normal.z * dz) / self.normal.y)
    }

    /// Lowest Y coordinate among the vertices
    pub fn min_y(&self) -> f64 {
        self.vertices.iter().map(|v| v.y).fold(f64::INFINITY, f64::min)
    }

    /// Point-in-polygon test for a point already lying in the face's plane
    fn contains_in_plane(&self, p: DVec3) -> bool {
        let n = self.normal.abs();
        let project: fn(DVec3) -> DVec2 = if n.x >= n.y && n.x >= n.z {
            |v| DVec2::new(v.y, v.z)
        } else if n.y >= n.z {
            |v| DVec2::new(v.x, v.z)
        } else {
            |v| DVec2::new(v.x, v.y)
        };
        let ring: Vec<DVec2> = self.vertices.iter().map(|&v| project(v)).collect();
        polygon_contains(&ring, project(p))
    }
}

impl Bounded for Face {
    fn bounding_box(&self) -> Rect {
        // vertices is never empty after construction
        Rect::bbox(self.vertices.iter().map(|&v| xz(v)))
            .unwrap_or_else(|| Rect::from_point(DVec2::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Face {
        Face::horizontal(Rect::new(0.0, 0.0, 10.0, 10.0), 2.0).unwrap()
    }

    fn wall() -> Face {
        // vertical face in the plane z = 0
        Face::new(vec![
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(10.0, 5.0, 0.0),
            DVec3::new(0.0, 5.0, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_horizontal_face_points_up() {
        let n = floor().normal();
        assert!((n - DVec3::Y).length() < 1e-12, "normal was {:?}", n);
    }

    #[test]
    fn test_rejects_degenerate_faces() {
        assert!(Face::new(vec![DVec3::ZERO, DVec3::X]).is_err());
        assert!(Face::new(vec![DVec3::ZERO, DVec3::X, DVec3::X * 2.0]).is_err());
        assert!(Face::new(vec![DVec3::ZERO, DVec3::X, DVec3::new(f64::NAN, 0.0, 1.0)]).is_err());
    }

    #[test]
    fn test_closing_vertex_is_dropped() {
        let face = Face::new(vec![DVec3::ZERO, DVec3::X, DVec3::Z, DVec3::ZERO]).unwrap();
        assert_eq!(face.vertices().len(), 3);
    }

    #[test]
    fn test_closest_point_inside_and_outside() {
        let face = floor();
        assert_eq!(face.closest_point(DVec3::new(5.0, 7.0, 5.0)), DVec3::new(5.0, 2.0, 5.0));

        let outside = face.closest_point(DVec3::new(15.0, 2.0, 5.0));
        assert!((outside - DVec3::new(10.0, 2.0, 5.0)).length() < 1e-9);
        assert!((face.distance_to(DVec3::new(15.0, 2.0, 5.0)) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_xz() {
        let face = floor();
        assert_eq!(face.distance_to_xz(DVec2::new(3.0, 3.0)), 0.0);
        assert!((face.distance_to_xz(DVec2::new(13.0, 3.0)) - 3.0).abs() < 1e-9);

        // vertical face has a line as footprint
        assert!((wall().distance_to_xz(DVec2::new(5.0, 2.0)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_y_at() {
        assert_eq!(floor().y_at(DVec2::new(100.0, -4.0)), Some(2.0));
        assert_eq!(wall().y_at(DVec2::new(1.0, 1.0)), None);

        let slope = Face::new(vec![
            DVec3::new(0.0, 0.0, 10.0),
            DVec3::new(10.0, 10.0, 10.0),
            DVec3::new(10.0, 10.0, 0.0),
            DVec3::new(0.0, 0.0, 0.0),
        ])
        .unwrap();
        let y = slope.y_at(DVec2::new(4.0, 5.0)).unwrap();
        assert!((y - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box() {
        assert_eq!(wall().bounding_box(), Rect::new(0.0, 0.0, 10.0, 0.0));
    }
}
