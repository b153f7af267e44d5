//! Error types for elevation resolution and attachment

use std::fmt;

/// Errors that can occur while resolving elevations or attaching connectors
#[derive(Debug)]
pub enum ElevationError {
    /// Configuration validation failed
    InvalidConfig(String),
    /// Geometry is malformed (non-finite coordinates, degenerate faces, ...)
    InvalidGeometry(String),
    /// Elevation data could not be provided
    DataUnavailable(String),
    /// Reading elevation data failed
    Io(std::io::Error),
    /// Point lies outside of the triangulated area
    OutsideTriangulation { x: f64, z: f64 },
    /// Point is already a vertex of the triangulation
    DuplicatePoint { x: f64, z: f64 },
    /// Connector has already been attached to a surface
    AlreadyAttached,
    /// Attachment would move a connector too far horizontally
    TooFarFromOrigin { distance: f64, max: f64 },
}

impl fmt::Display for ElevationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            ElevationError::InvalidGeometry(msg) => write!(f, "invalid geometry: {}", msg),
            ElevationError::DataUnavailable(msg) => {
                write!(f, "elevation data unavailable: {}", msg)
            }
            ElevationError::Io(err) => write!(f, "could not read elevation data: {}", err),
            ElevationError::OutsideTriangulation { x, z } => {
                write!(f, "point ({}, {}) is outside of the triangulation", x, z)
            }
            ElevationError::DuplicatePoint { x, z } => {
                write!(f, "point ({}, {}) is already part of the triangulation", x, z)
            }
            ElevationError::AlreadyAttached => write!(f, "connector has already been attached"),
            ElevationError::TooFarFromOrigin { distance, max } => write!(
                f,
                "connector must not be moved horizontally by more than {} (got {})",
                max, distance
            ),
        }
    }
}

impl std::error::Error for ElevationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ElevationError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ElevationError {
    fn from(err: std::io::Error) -> Self {
        ElevationError::Io(err)
    }
}

/// Result type alias for elevation operations
pub type Result<T> = std::result::Result<T, ElevationError>;
