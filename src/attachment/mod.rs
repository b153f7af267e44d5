//! Attachment matching
//!
//! Snaps attachment connectors onto compatible surfaces of other objects.
//! Surfaces are indexed in a uniform grid. For each connector, its surface
//! types are tried in order of preference; the first type with any candidate
//! surface decides, and the connector is placed on the best face of the
//! closest such surface if the placement passes validation.

mod connector;
mod surface;

pub use connector::{Attachment, AttachmentConnector, NormalPredicate};
pub use surface::AttachmentSurface;

use std::sync::Arc;

use glam::DVec3;

use crate::error::Result;
use crate::geometry::{with_y, xz, Face, Rect};
use crate::spatial::IndexGrid;

/// Tolerance of the preferred height match in the first pass
const HEIGHT_TOLERANCE: f64 = 0.001;

/// Slack on top of a connector's maximum horizontal distance
pub(crate) const DISTANCE_TOLERANCE: f64 = 0.001;

/// Minimum normal Y for a face to be landed on straight from above or below
const MIN_NORMAL_Y: f64 = 0.001;

/// Grid index of the surfaces connectors may attach to
pub type SurfaceIndex = IndexGrid<Arc<AttachmentSurface>>;

/// Index surfaces in a grid with a fixed number of cells
pub fn build_surface_index<'a, I>(bounds: Rect, cells: (usize, usize), surfaces: I) -> SurfaceIndex
where
    I: IntoIterator<Item = &'a Arc<AttachmentSurface>>,
{
    let mut index = IndexGrid::new(bounds, cells.0, cells.1);
    for surface in surfaces {
        index.insert(Arc::clone(surface));
    }
    index
}

/// Find the surface a connector should attempt to attach to
///
/// Surface types are tried in the connector's order of preference. For the
/// first type with any nearby surface that has an acceptable face, the
/// surface closest to the connector's original position is returned. Later
/// types are not considered even if attaching to that surface fails.
pub fn find_candidate_surface(
    index: &SurfaceIndex,
    connector: &AttachmentConnector,
) -> Option<Arc<AttachmentSurface>> {
    let original = connector.original_pos();
    let query = Rect::from_point(xz(original)).pad(connector.max_distance_xz());

    for surface_type in connector.compatible_surface_types() {
        let closest = index
            .probe(query)
            .filter(|s| s.has_type(surface_type))
            .filter(|s| s.faces().iter().any(|f| connector.is_acceptable_normal(f.normal())))
            .map(|s| (s.distance_to(original), s))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((_, surface)) = closest {
            return Some(Arc::clone(surface));
        }
    }
    None
}

/// Find a surface for a connector and try to attach it
///
/// Returns whether the connector ended up attached. Connectors without a
/// suitable surface stay unattached, which is not an error.
///
/// # Errors
///
/// Returns `AlreadyAttached` if the connector was attached before.
pub fn attach_connector(index: &SurfaceIndex, connector: &mut AttachmentConnector) -> Result<bool> {
    match find_candidate_surface(index, connector) {
        Some(surface) => attach_if_valid(connector, &surface),
        None => Ok(false),
    }
}

/// Attach a connector to the best face of a surface, if there is one
///
/// The connector is aimed at its preferred height above the surface's base
/// elevation. A first pass only considers faces reaching that height, a
/// second pass any face. Within a pass, the face closest to the aimed
/// position wins: in 3D for connectors that may move horizontally, in the
/// ground plane otherwise. The landing position is rejected if it is
/// horizontally further than the connector's maximum distance.
///
/// Returns whether the connector was attached.
///
/// # Errors
///
/// Returns `AlreadyAttached` if the connector was attached before.
pub fn attach_if_valid(
    connector: &mut AttachmentConnector,
    surface: &Arc<AttachmentSurface>,
) -> Result<bool> {
    let original = connector.original_pos();
    let ele = surface.base_ele_at(xz(original)) + connector.preferred_height();
    let pos_at_ele = with_y(xz(original), ele);

    for require_preferred_height in [true, false] {
        let Some(face) = closest_face(connector, surface, pos_at_ele, require_preferred_height)
        else {
            continue;
        };

        let landing = landing_point(connector, face, pos_at_ele);
        if xz(landing).distance(xz(original)) > connector.max_distance_xz() + DISTANCE_TOLERANCE {
            continue;
        }

        connector.attach(Arc::clone(surface), landing, face.normal())?;
        return Ok(true);
    }

    Ok(false)
}

fn closest_face<'s>(
    connector: &AttachmentConnector,
    surface: &'s AttachmentSurface,
    pos_at_ele: DVec3,
    require_preferred_height: bool,
) -> Option<&'s Face> {
    let matches_preferred_height = |face: &Face| {
        let closest = face.closest_point(pos_at_ele);
        let height = closest.y - surface.base_ele_at(xz(closest));
        (height - connector.preferred_height()).abs() < HEIGHT_TOLERANCE
    };

    surface
        .faces()
        .iter()
        .filter(|f| !require_preferred_height || matches_preferred_height(f))
        .filter(|f| connector.is_acceptable_normal(f.normal()))
        .map(|f| {
            let distance = if connector.change_xz() {
                f.distance_to(pos_at_ele)
            } else {
                f.distance_to_xz(xz(pos_at_ele))
            };
            (distance, f)
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, f)| f)
}

fn landing_point(connector: &AttachmentConnector, face: &Face, pos_at_ele: DVec3) -> DVec3 {
    if !connector.change_xz() && face.normal().y >= MIN_NORMAL_Y {
        // stay at the same ground position, directly above or below
        if let Some(y) = face.y_at(xz(pos_at_ele)) {
            return face.closest_point(with_y(xz(pos_at_ele), y));
        }
    }
    face.closest_point(pos_at_ele)
}
