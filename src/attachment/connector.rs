//! Connectors looking for a surface to attach to

use std::fmt;
use std::sync::Arc;

use glam::DVec3;

use super::{AttachmentSurface, DISTANCE_TOLERANCE};
use crate::error::{ElevationError, Result};
use crate::geometry::xz;

/// Predicate deciding whether a face normal is acceptable for a connector
pub type NormalPredicate = Arc<dyn Fn(DVec3) -> bool + Send + Sync>;

/// The surface a connector has been attached to
#[derive(Debug, Clone)]
pub struct Attachment {
    pub surface: Arc<AttachmentSurface>,
    /// Landing position on the surface
    pub position: DVec3,
    /// Normal of the face the connector landed on
    pub normal: DVec3,
}

/// A point of an object that must rest on a surface of another object
///
/// Examples are a traffic sign mounted on a pole, a path on a roof, or
/// furniture standing on an indoor floor. A connector starts unattached and
/// is attached at most once.
///
/// # Example
///
/// ```
/// use scene_elevation::{AttachmentConnector, DVec3};
///
/// let connector = AttachmentConnector::new(["pole", "wall"], DVec3::new(1.0, 0.0, 2.0), 2.5, true)
///     .with_normal_predicate(|n| n.y.abs() < 0.1);
///
/// assert_eq!(connector.max_distance_xz(), 10.0);
/// assert!(connector.is_acceptable_normal(DVec3::X));
/// assert!(!connector.is_attached());
/// ```
#[derive(Clone)]
pub struct AttachmentConnector {
    compatible_surface_types: Vec<String>,
    original_pos: DVec3,
    preferred_height: f64,
    change_xz: bool,
    max_distance_xz: f64,
    normal_predicate: Option<NormalPredicate>,
    attachment: Option<Attachment>,
}

impl AttachmentConnector {
    /// Maximum horizontal movement of connectors that may change their position
    pub const DEFAULT_MAX_DISTANCE_XZ: f64 = 10.0;

    /// Maximum horizontal movement of connectors that should only move vertically
    ///
    /// Not zero, so that slightly misplaced connectors still attach.
    pub const DEFAULT_IMMOBILE_MAX_DISTANCE_XZ: f64 = 0.01;

    /// Create an unattached connector
    ///
    /// # Arguments
    ///
    /// * `compatible_surface_types` - Surface types in order of preference
    /// * `original_pos` - Position before snapping to a surface
    /// * `preferred_height` - Desired height above the surface's base elevation
    /// * `change_xz` - Whether the connector may move horizontally
    pub fn new<I, S>(
        compatible_surface_types: I,
        original_pos: DVec3,
        preferred_height: f64,
        change_xz: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            compatible_surface_types: compatible_surface_types
                .into_iter()
                .map(Into::into)
                .collect(),
            original_pos,
            preferred_height,
            change_xz,
            max_distance_xz: if change_xz {
                Self::DEFAULT_MAX_DISTANCE_XZ
            } else {
                Self::DEFAULT_IMMOBILE_MAX_DISTANCE_XZ
            },
            normal_predicate: None,
            attachment: None,
        }
    }

    /// Override the maximum horizontal movement
    pub fn with_max_distance_xz(mut self, max_distance_xz: f64) -> Self {
        self.max_distance_xz = max_distance_xz;
        self
    }

    /// Only accept faces whose normal satisfies the predicate
    pub fn with_normal_predicate(
        mut self,
        predicate: impl Fn(DVec3) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.normal_predicate = Some(Arc::new(predicate));
        self
    }

    pub fn compatible_surface_types(&self) -> &[String] {
        &self.compatible_surface_types
    }

    #[inline]
    pub fn original_pos(&self) -> DVec3 {
        self.original_pos
    }

    #[inline]
    pub fn preferred_height(&self) -> f64 {
        self.preferred_height
    }

    #[inline]
    pub fn change_xz(&self) -> bool {
        self.change_xz
    }

    /// Maximum horizontal distance between the original and the attached position
    #[inline]
    pub fn max_distance_xz(&self) -> f64 {
        self.max_distance_xz
    }

    pub fn is_acceptable_normal(&self, normal: DVec3) -> bool {
        self.normal_predicate.as_ref().map_or(true, |p| p(normal))
    }

    /// Attach the connector to a surface
    ///
    /// # Errors
    ///
    /// - `AlreadyAttached` if the connector has been attached before
    /// - `TooFarFromOrigin` if `position` is horizontally further than
    ///   [`max_distance_xz`](Self::max_distance_xz) from the original position
    pub fn attach(
        &mut self,
        surface: Arc<AttachmentSurface>,
        position: DVec3,
        normal: DVec3,
    ) -> Result<()> {
        if self.attachment.is_some() {
            return Err(ElevationError::AlreadyAttached);
        }

        let distance = xz(position).distance(xz(self.original_pos));
        if distance > self.max_distance_xz + DISTANCE_TOLERANCE {
            return Err(ElevationError::TooFarFromOrigin {
                distance,
                max: self.max_distance_xz,
            });
        }

        self.attachment = Some(Attachment {
            surface,
            position,
            normal,
        });
        Ok(())
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Landing position, `None` while unattached
    pub fn attached_pos(&self) -> Option<DVec3> {
        self.attachment.as_ref().map(|a| a.position)
    }

    /// Normal of the surface at the landing position, `None` while unattached
    pub fn attached_surface_normal(&self) -> Option<DVec3> {
        self.attachment.as_ref().map(|a| a.normal)
    }
}

impl fmt::Debug for AttachmentConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentConnector")
            .field("compatible_surface_types", &self.compatible_surface_types)
            .field("original_pos", &self.original_pos)
            .field("preferred_height", &self.preferred_height)
            .field("change_xz", &self.change_xz)
            .field("max_distance_xz", &self.max_distance_xz)
            .field("attachment", &self.attachment)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Face, Rect};

    fn surface() -> Arc<AttachmentSurface> {
        let face = Face::horizontal(Rect::new(-5.0, -5.0, 5.0, 5.0), 0.0).unwrap();
        Arc::new(AttachmentSurface::new(["floor"], vec![face]).unwrap())
    }

    #[test]
    fn test_defaults() {
        let mobile = AttachmentConnector::new(["floor"], DVec3::ZERO, 0.0, true);
        assert_eq!(mobile.max_distance_xz(), 10.0);
        assert!(mobile.is_acceptable_normal(DVec3::NEG_Y));

        let immobile = AttachmentConnector::new(["floor"], DVec3::ZERO, 0.0, false);
        assert_eq!(immobile.max_distance_xz(), 0.01);
    }

    #[test]
    fn test_attach_once() {
        let mut connector =
            AttachmentConnector::new(["floor"], DVec3::new(1.0, 3.0, 1.0), 0.0, false);
        connector.attach(surface(), DVec3::new(1.0, 0.0, 1.0), DVec3::Y).unwrap();

        assert!(connector.is_attached());
        assert_eq!(connector.attached_pos(), Some(DVec3::new(1.0, 0.0, 1.0)));
        assert_eq!(connector.attached_surface_normal(), Some(DVec3::Y));
        assert!(connector.attachment().unwrap().surface.has_type("floor"));

        assert!(matches!(
            connector.attach(surface(), DVec3::new(1.0, 0.0, 1.0), DVec3::Y),
            Err(ElevationError::AlreadyAttached)
        ));
    }

    #[test]
    fn test_attach_too_far() {
        let mut connector =
            AttachmentConnector::new(["floor"], DVec3::ZERO, 0.0, true).with_max_distance_xz(1.0);
        let result = connector.attach(surface(), DVec3::new(3.0, 0.0, 0.0), DVec3::Y);
        assert!(matches!(result, Err(ElevationError::TooFarFromOrigin { .. })));
        assert!(!connector.is_attached());
    }
}
