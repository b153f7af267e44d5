//! Reversible structural edits of the triangulation

use super::triangle::TriangleId;

/// A neighbor link that was overwritten by a flip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relink {
    /// Triangle outside of the flipped region whose link changed
    pub triangle: TriangleId,
    /// Neighbor slot that changed
    pub slot: usize,
    /// Link before the flip
    pub previous: Option<TriangleId>,
}

/// One structural edit performed while inserting a point
///
/// Each record holds exactly what is needed to reverse it: the triangles it
/// removed (tombstoned, their own links untouched), the triangles it created
/// (always the newest arena slots) and the outside links it overwrote.
#[derive(Debug, Clone, PartialEq)]
pub enum Flip {
    /// 1-to-3 split of the triangle enclosing a new point
    Split {
        removed: TriangleId,
        created: [TriangleId; 3],
        relinks: Vec<Relink>,
    },
    /// Split of the one or two triangles sharing the edge a new point lies on
    SplitEdge {
        removed: Vec<TriangleId>,
        created: Vec<TriangleId>,
        relinks: Vec<Relink>,
    },
    /// 2-to-2 flip replacing an illegal diagonal
    Flip22 {
        removed: [TriangleId; 2],
        created: [TriangleId; 2],
        relinks: Vec<Relink>,
    },
}

impl Flip {
    pub fn removed(&self) -> &[TriangleId] {
        match self {
            Flip::Split { removed, .. } => std::slice::from_ref(removed),
            Flip::SplitEdge { removed, .. } => removed,
            Flip::Flip22 { removed, .. } => removed,
        }
    }

    pub fn created(&self) -> &[TriangleId] {
        match self {
            Flip::Split { created, .. } => created,
            Flip::SplitEdge { created, .. } => created,
            Flip::Flip22 { created, .. } => created,
        }
    }

    pub fn relinks(&self) -> &[Relink] {
        match self {
            Flip::Split { relinks, .. }
            | Flip::SplitEdge { relinks, .. }
            | Flip::Flip22 { relinks, .. } => relinks,
        }
    }
}
