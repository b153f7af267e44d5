//! Terrain elevation interpolation and surface attachment for 3D map scenes
//!
//! Objects of a scene are placed on a terrain that is only known at sampled
//! sites. This library interpolates the terrain elevation for each object's
//! ground points and snaps dependent objects (signs, rooftop features,
//! furniture) onto the surfaces of other objects.
//!
//! # Quick Start
//!
//! ```rust
//! use scene_elevation::*;
//!
//! // Known terrain samples
//! let sites = InMemorySites::new(vec![
//!     KnownSite::new(0.0, 0.0, 10.0),
//!     KnownSite::new(100.0, 0.0, 20.0),
//!     KnownSite::new(0.0, 100.0, 10.0),
//!     KnownSite::new(100.0, 100.0, 20.0),
//! ]);
//!
//! let config = ElevationConfigBuilder::new()
//!     .interpolator(InterpolatorKind::NaturalNeighbor)
//!     .build().unwrap();
//!
//! let ground_point = ElevationConnector::new(DVec2::new(50.0, 50.0));
//! let mut objects = vec![SceneObject::new(1).with_elevation_connector(ground_point)];
//!
//! let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
//! let report = run_conversion(&config, &mut objects, bounds, Some(&sites));
//!
//! let ground = objects[0].elevation_connectors()[0].resolved().unwrap();
//! assert!((ground.y - 15.0).abs() < 1e-6);
//! assert_eq!(report.failed_objects, Vec::<usize>::new());
//! ```
//!
//! # Features
//!
//! - `parallel`: Processes objects concurrently using rayon
//! - `serde`: Enables serialization support for configuration and known sites

// Modules
pub mod error;
pub mod config;
pub mod geometry;
pub mod spatial;
pub mod triangulation;
pub mod terrain;
pub mod connector;
pub mod attachment;
pub mod world;
pub mod conversion;

// Re-export core types for convenience
pub use error::{ElevationError, Result};
pub use config::{ElevationConfig, ElevationConfigBuilder, InterpolatorKind};
pub use geometry::{Bounded, Face, Rect};
pub use spatial::IndexGrid;
pub use triangulation::{DelaunayTriangle, DelaunayTriangulation, Location, TriangleId};
pub use terrain::{
    natural_neighbors, InMemorySites, Interpolator, InverseDistanceWeightingInterpolator,
    KnownSite, LeastSquaresInterpolator, LinearInterpolator, NaturalNeighborInterpolator,
    NaturalNeighbors, TerrainElevationData, TerrainInterpolator, XyzFileSites, ZeroInterpolator,
};
pub use connector::{ElevationConnector, GroundState};
pub use attachment::{
    attach_connector, attach_if_valid, build_surface_index, find_candidate_surface, Attachment,
    AttachmentConnector, AttachmentSurface, SurfaceIndex,
};
pub use world::{SceneObject, WorldObject};
pub use conversion::{
    attach_connectors, calculate_elevations, prepare_interpolator, run_conversion, ConversionLog,
    ConversionReport, LogEntry, LogLevel,
};

// Re-export glam vectors for convenience
pub use glam::{DVec2, DVec3};
