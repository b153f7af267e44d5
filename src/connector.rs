//! Elevation connectors: ground positions of an object that need an elevation

use glam::{DVec2, DVec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::with_y;

/// Vertical relationship of a connector to the terrain
///
/// Consumed by constraint solving after the initial resolution. The
/// resolution stage itself places every connector on the interpolated
/// terrain regardless of its ground state.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroundState {
    /// On the terrain surface (default)
    #[default]
    OnGround,
    /// Above the terrain, e.g. on a bridge
    Above,
    /// Below the terrain, e.g. in a tunnel
    Below,
}

/// A ground position of an object that receives an elevation
///
/// # Example
///
/// ```
/// use scene_elevation::{DVec2, DVec3, ElevationConnector};
///
/// let mut connector = ElevationConnector::new(DVec2::new(3.0, 4.0));
/// assert_eq!(connector.resolved(), None);
///
/// connector.resolve(12.5);
/// assert_eq!(connector.resolved(), Some(DVec3::new(3.0, 12.5, 4.0)));
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationConnector {
    pos: DVec2,
    ground_state: GroundState,
    resolved: Option<DVec3>,
}

impl ElevationConnector {
    /// Create an unresolved connector on the ground
    pub fn new(pos: DVec2) -> Self {
        Self::with_ground_state(pos, GroundState::OnGround)
    }

    pub fn with_ground_state(pos: DVec2, ground_state: GroundState) -> Self {
        Self {
            pos,
            ground_state,
            resolved: None,
        }
    }

    /// Ground position (X, Z)
    #[inline]
    pub fn pos(&self) -> DVec2 {
        self.pos
    }

    #[inline]
    pub fn ground_state(&self) -> GroundState {
        self.ground_state
    }

    /// Resolved 3D position, `None` until resolution
    #[inline]
    pub fn resolved(&self) -> Option<DVec3> {
        self.resolved
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Assign the elevation found for the connector's ground position
    pub fn resolve(&mut self, elevation: f64) {
        self.resolved = Some(with_y(self.pos, elevation));
    }

    /// Replace the elevation of an already resolved connector
    ///
    /// Used by refinement steps after the initial resolution. Has the same
    /// effect as [`resolve`](Self::resolve) on an unresolved connector.
    pub fn refine_ele(&mut self, elevation: f64) {
        self.resolve(elevation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution() {
        let mut connector =
            ElevationConnector::with_ground_state(DVec2::new(1.0, -2.0), GroundState::Above);
        assert!(!connector.is_resolved());
        assert_eq!(connector.ground_state(), GroundState::Above);

        connector.resolve(7.0);
        assert_eq!(connector.resolved(), Some(DVec3::new(1.0, 7.0, -2.0)));

        connector.refine_ele(9.0);
        assert_eq!(connector.resolved(), Some(DVec3::new(1.0, 9.0, -2.0)));
        assert_eq!(connector.pos(), DVec2::new(1.0, -2.0));
    }
}
