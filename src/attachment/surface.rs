//! Surfaces that attachment connectors can snap to

use std::fmt;
use std::sync::Arc;

use glam::{DVec2, DVec3};

use crate::error::{ElevationError, Result};
use crate::geometry::{Bounded, Face, Rect};

type BaseElevationFn = Arc<dyn Fn(DVec2) -> f64 + Send + Sync>;

enum BaseElevation {
    /// Lowest vertex of all faces
    Lowest(f64),
    Function(BaseElevationFn),
}

/// Typed, face-based geometry of an object that can host attachment connectors
///
/// The base elevation is the "bottom" of the surface, such as the ground
/// below a pole or the floor below an indoor wall. Connectors are placed at
/// their preferred height above it.
///
/// # Example
///
/// ```
/// use scene_elevation::{AttachmentSurface, DVec2, Face, Rect};
///
/// let floor = Face::horizontal(Rect::new(0.0, 0.0, 10.0, 10.0), 3.0).unwrap();
/// let surface = AttachmentSurface::new(["floor"], vec![floor]).unwrap();
///
/// assert!(surface.has_type("floor"));
/// assert_eq!(surface.base_ele_at(DVec2::new(5.0, 5.0)), 3.0);
/// ```
pub struct AttachmentSurface {
    types: Vec<String>,
    faces: Vec<Face>,
    base_ele: BaseElevation,
    bbox: Rect,
}

impl AttachmentSurface {
    /// Create a surface whose base elevation is its lowest vertex
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` if there are no types or no faces.
    pub fn new<I, S>(types: I, faces: Vec<Face>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        if types.is_empty() || faces.is_empty() {
            return Err(ElevationError::InvalidGeometry(format!(
                "an attachment surface needs types and faces (got {} types, {} faces)",
                types.len(),
                faces.len()
            )));
        }

        let lowest = faces.iter().map(Face::min_y).fold(f64::INFINITY, f64::min);
        let bbox = faces
            .iter()
            .map(Face::bounding_box)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_else(|| Rect::from_point(DVec2::ZERO));

        Ok(Self {
            types,
            faces,
            base_ele: BaseElevation::Lowest(lowest),
            bbox,
        })
    }

    /// Replace the base elevation with a function of the ground position
    pub fn with_base_elevation(
        mut self,
        base_ele: impl Fn(DVec2) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.base_ele = BaseElevation::Function(Arc::new(base_ele));
        self
    }

    /// Surface categories such as "pole", "wall" or "floor"
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn has_type(&self, surface_type: &str) -> bool {
        self.types.iter().any(|t| t == surface_type)
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn base_ele_at(&self, pos: DVec2) -> f64 {
        match &self.base_ele {
            BaseElevation::Lowest(ele) => *ele,
            BaseElevation::Function(f) => f(pos),
        }
    }

    /// Smallest 3D distance between a point and any face
    pub fn distance_to(&self, p: DVec3) -> f64 {
        self.faces
            .iter()
            .map(|f| f.distance_to(p))
            .fold(f64::INFINITY, f64::min)
    }
}

impl Bounded for AttachmentSurface {
    fn bounding_box(&self) -> Rect {
        self.bbox
    }
}

impl fmt::Debug for AttachmentSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentSurface")
            .field("types", &self.types)
            .field("faces", &self.faces.len())
            .field("bbox", &self.bbox)
            .finish()
    }
}
