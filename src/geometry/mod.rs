//! Planar and spatial geometry primitives
//!
//! Positions in the scene are `DVec3` with Y pointing up. Ground positions
//! are `DVec2` holding the scene's X and Z coordinates (`DVec2::y` is the
//! scene's Z axis), use [`xz`] and [`with_y`] to convert between the two.

mod face;

pub use face::Face;

use std::sync::Arc;

use glam::{DVec2, DVec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Drop the vertical component of a scene position
#[inline]
pub fn xz(v: DVec3) -> DVec2 {
    DVec2::new(v.x, v.z)
}

/// Lift a ground position to the given height
#[inline]
pub fn with_y(pos: DVec2, y: f64) -> DVec3 {
    DVec3::new(pos.x, y, pos.y)
}

/// Closest point to `p` on the segment from `a` to `b`
pub fn closest_point_on_segment(a: DVec3, b: DVec3, p: DVec3) -> DVec3 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Distance from `p` to the segment from `a` to `b` in the ground plane
pub fn distance_to_segment_2d(a: DVec2, b: DVec2, p: DVec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Crossing-number test for a point and a closed polygon given as a vertex ring
pub fn polygon_contains(ring: &[DVec2], p: DVec2) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Axis-aligned rectangle in the ground (XZ) plane
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_z: f64,
}

impl Rect {
    /// Create a rectangle from two corner coordinates in any order
    pub fn new(x1: f64, z1: f64, x2: f64, z2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_z: z1.min(z2),
            max_x: x1.max(x2),
            max_z: z1.max(z2),
        }
    }

    /// Zero-sized rectangle at a single position
    pub fn from_point(pos: DVec2) -> Self {
        Self::new(pos.x, pos.y, pos.x, pos.y)
    }

    /// Smallest rectangle containing all positions, `None` for an empty input
    pub fn bbox<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = DVec2>,
    {
        positions.into_iter().fold(None, |acc: Option<Rect>, p| match acc {
            None => Some(Rect::from_point(p)),
            Some(r) => Some(r.union(&Rect::from_point(p))),
        })
    }

    /// Grow the rectangle by `amount` on every side
    pub fn pad(&self, amount: f64) -> Self {
        Self {
            min_x: self.min_x - amount,
            min_z: self.min_z - amount,
            max_x: self.max_x + amount,
            max_z: self.max_z + amount,
        }
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_z: self.min_z.min(other.min_z),
            max_x: self.max_x.max(other.max_x),
            max_z: self.max_z.max(other.max_z),
        }
    }

    #[inline]
    pub fn size_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn size_z(&self) -> f64 {
        self.max_z - self.min_z
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    /// Whether a position lies inside or on the border of the rectangle
    pub fn contains(&self, pos: DVec2) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_z && pos.y <= self.max_z
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_z <= other.max_z
            && other.min_z <= self.max_z
    }

    /// Corners in counter-clockwise order, starting at the minimum corner
    pub fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.min_x, self.min_z),
            DVec2::new(self.max_x, self.min_z),
            DVec2::new(self.max_x, self.max_z),
            DVec2::new(self.min_x, self.max_z),
        ]
    }
}

/// Anything with an extent in the ground plane
pub trait Bounded {
    fn bounding_box(&self) -> Rect;
}

impl<T: Bounded + ?Sized> Bounded for Arc<T> {
    fn bounding_box(&self) -> Rect {
        (**self).bounding_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(5.0, 3.0, -1.0, 7.0);
        assert_eq!(r.min_x, -1.0);
        assert_eq!(r.max_x, 5.0);
        assert_eq!(r.min_z, 3.0);
        assert_eq!(r.max_z, 7.0);
    }

    #[test]
    fn test_bbox_and_pad() {
        let r = Rect::bbox(vec![DVec2::new(1.0, 2.0), DVec2::new(-3.0, 4.0)]).unwrap();
        assert_eq!(r, Rect::new(-3.0, 2.0, 1.0, 4.0));

        let padded = r.pad(10.0);
        assert_eq!(padded, Rect::new(-13.0, -8.0, 11.0, 14.0));
        assert!(Rect::bbox(Vec::<DVec2>::new()).is_none());
    }

    #[test]
    fn test_contains_and_intersects() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(DVec2::new(10.0, 0.0)));
        assert!(!r.contains(DVec2::new(10.1, 5.0)));

        assert!(r.intersects(&Rect::new(9.0, 9.0, 20.0, 20.0)));
        assert!(!r.intersects(&Rect::new(11.0, 0.0, 20.0, 5.0)));
    }

    #[test]
    fn test_polygon_contains() {
        let square = [
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 2.0),
            DVec2::new(0.0, 2.0),
        ];
        assert!(polygon_contains(&square, DVec2::new(1.0, 1.0)));
        assert!(!polygon_contains(&square, DVec2::new(3.0, 1.0)));
    }

    #[test]
    fn test_closest_point_on_segment() {
        let a = DVec3::new(0.0, 0.0, 0.0);
        let b = DVec3::new(10.0, 0.0, 0.0);
        assert_eq!(
            closest_point_on_segment(a, b, DVec3::new(4.0, 3.0, 0.0)),
            DVec3::new(4.0, 0.0, 0.0)
        );
        assert_eq!(closest_point_on_segment(a, b, DVec3::new(-4.0, 3.0, 0.0)), a);
    }
}
