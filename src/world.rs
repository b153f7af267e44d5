//! Scene objects taking part in elevation resolution and attachment
//!
//! Objects expose their connectors and surfaces through the [`WorldObject`]
//! trait. [`SceneObject`] is a plain implementation for callers that do not
//! have their own object model.

use std::sync::Arc;

use crate::attachment::{AttachmentConnector, AttachmentSurface};
use crate::connector::ElevationConnector;
use crate::error::Result;

/// An object of the scene with connectors and surfaces
///
/// Objects with a parent are parts of a larger object. Only top-level
/// objects contribute surfaces and have their attachment connectors matched.
pub trait WorldObject: Send {
    /// Identifier used in log entries
    fn id(&self) -> usize;

    /// Identifier of the parent object, `None` for top-level objects
    fn parent(&self) -> Option<usize> {
        None
    }

    fn is_top_level(&self) -> bool {
        self.parent().is_none()
    }

    fn elevation_connectors(&self) -> &[ElevationConnector];

    fn elevation_connectors_mut(&mut self) -> &mut [ElevationConnector];

    fn attachment_connectors(&self) -> &[AttachmentConnector];

    fn attachment_connectors_mut(&mut self) -> &mut [AttachmentConnector];

    /// Surfaces other objects can attach to
    ///
    /// # Errors
    ///
    /// Fails if the object's geometry does not allow building its surfaces.
    /// The object then offers no surfaces for this run.
    fn attachment_surfaces(&self) -> Result<Vec<Arc<AttachmentSurface>>>;
}

impl<T: WorldObject + ?Sized> WorldObject for Box<T> {
    fn id(&self) -> usize {
        (**self).id()
    }

    fn parent(&self) -> Option<usize> {
        (**self).parent()
    }

    fn elevation_connectors(&self) -> &[ElevationConnector] {
        (**self).elevation_connectors()
    }

    fn elevation_connectors_mut(&mut self) -> &mut [ElevationConnector] {
        (**self).elevation_connectors_mut()
    }

    fn attachment_connectors(&self) -> &[AttachmentConnector] {
        (**self).attachment_connectors()
    }

    fn attachment_connectors_mut(&mut self) -> &mut [AttachmentConnector] {
        (**self).attachment_connectors_mut()
    }

    fn attachment_surfaces(&self) -> Result<Vec<Arc<AttachmentSurface>>> {
        (**self).attachment_surfaces()
    }
}

/// A scene object holding its connectors and surfaces directly
///
/// # Example
///
/// ```
/// use scene_elevation::{DVec2, ElevationConnector, SceneObject, WorldObject};
///
/// let object = SceneObject::new(7)
///     .with_elevation_connector(ElevationConnector::new(DVec2::new(1.0, 2.0)));
///
/// assert!(object.is_top_level());
/// assert_eq!(object.elevation_connectors().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SceneObject {
    id: usize,
    parent: Option<usize>,
    elevation_connectors: Vec<ElevationConnector>,
    attachment_connectors: Vec<AttachmentConnector>,
    attachment_surfaces: Vec<Arc<AttachmentSurface>>,
}

impl SceneObject {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_elevation_connector(mut self, connector: ElevationConnector) -> Self {
        self.elevation_connectors.push(connector);
        self
    }

    pub fn with_attachment_connector(mut self, connector: AttachmentConnector) -> Self {
        self.attachment_connectors.push(connector);
        self
    }

    pub fn with_attachment_surface(mut self, surface: AttachmentSurface) -> Self {
        self.attachment_surfaces.push(Arc::new(surface));
        self
    }
}

impl WorldObject for SceneObject {
    fn id(&self) -> usize {
        self.id
    }

    fn parent(&self) -> Option<usize> {
        self.parent
    }

    fn elevation_connectors(&self) -> &[ElevationConnector] {
        &self.elevation_connectors
    }

    fn elevation_connectors_mut(&mut self) -> &mut [ElevationConnector] {
        &mut self.elevation_connectors
    }

    fn attachment_connectors(&self) -> &[AttachmentConnector] {
        &self.attachment_connectors
    }

    fn attachment_connectors_mut(&mut self) -> &mut [AttachmentConnector] {
        &mut self.attachment_connectors
    }

    fn attachment_surfaces(&self) -> Result<Vec<Arc<AttachmentSurface>>> {
        Ok(self.attachment_surfaces.clone())
    }
}
