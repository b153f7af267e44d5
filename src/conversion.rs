//! Conversion run orchestration
//!
//! A conversion run first resolves the elevation connectors of every object
//! from the interpolated terrain, then attaches the attachment connectors of
//! top-level objects to surfaces. Failures are isolated per object: they are
//! logged and the run continues with the remaining objects.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::attachment::{attach_connector, build_surface_index, AttachmentSurface, SurfaceIndex};
use crate::config::{ElevationConfig, InterpolatorKind};
use crate::error::{ElevationError, Result};
use crate::geometry::Rect;
use crate::terrain::{Interpolator, TerrainElevationData, TerrainInterpolator, ZeroInterpolator};
use crate::world::WorldObject;

/// Severity of a conversion log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Warning,
    Error,
}

/// A problem encountered during a conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Object the entry refers to, if any
    pub object: Option<usize>,
    /// Number of identical entries that directly followed this one
    pub repeats: usize,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{}", level)?;
        if let Some(object) = self.object {
            write!(f, "[{}]", object)?;
        }
        write!(f, ": {}", self.message)?;
        if self.repeats > 0 {
            write!(f, " ({} similar entries suppressed)", self.repeats)?;
        }
        Ok(())
    }
}

/// Problems collected during one conversion run
///
/// Entries are also forwarded to the `log` facade. An entry identical in
/// level, message and object to the previous one only increments that
/// entry's repeat count.
#[derive(Debug, Default)]
pub struct ConversionLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl ConversionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&self, message: impl Into<String>, object: Option<usize>) {
        self.log(LogLevel::Warning, message.into(), object);
    }

    pub fn error(&self, message: impl Into<String>, object: Option<usize>) {
        self.log(LogLevel::Error, message.into(), object);
    }

    pub fn log(&self, level: LogLevel, message: String, object: Option<usize>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = entries.last_mut() {
            if last.level == level && last.message == message && last.object == object {
                last.repeats += 1;
                return;
            }
        }

        match (level, object) {
            (LogLevel::Warning, Some(id)) => warn!("[object {}] {}", id, message),
            (LogLevel::Warning, None) => warn!("{}", message),
            (LogLevel::Error, Some(id)) => error!("[object {}] {}", id, message),
            (LogLevel::Error, None) => error!("{}", message),
        }

        entries.push(LogEntry {
            level,
            message,
            object,
            repeats: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the entries logged so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outcome of a conversion run
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    /// Interpolator actually used, after fallbacks
    pub interpolator: InterpolatorKind,
    /// Number of elevation connectors that received an elevation
    pub resolved_connectors: usize,
    /// Resolved connectors the interpolator had no estimate for, placed at 0
    pub fallback_connectors: usize,
    pub attached_connectors: usize,
    pub unattached_connectors: usize,
    /// Objects whose processing failed in at least one stage
    pub failed_objects: Vec<usize>,
    pub log: Vec<LogEntry>,
}

/// Counts of the elevation stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElevationSummary {
    pub resolved_connectors: usize,
    pub fallback_connectors: usize,
    pub failed_objects: Vec<usize>,
}

/// Counts of the attachment stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttachmentSummary {
    pub attached_connectors: usize,
    pub unattached_connectors: usize,
    pub failed_objects: Vec<usize>,
}

/// Create the interpolator for a run and provide it with known sites
///
/// Without elevation data, or if no sites can be obtained, flat terrain is
/// used. Sites are fetched for the data bounds grown by the configured
/// padding. Fetch failures are logged, not returned.
pub fn prepare_interpolator(
    config: &ElevationConfig,
    data_bounds: Rect,
    ele_data: Option<&dyn TerrainElevationData>,
    log: &ConversionLog,
) -> Interpolator {
    let Some(ele_data) = ele_data else {
        return Interpolator::Zero(ZeroInterpolator);
    };

    let mut interpolator = Interpolator::from_config(config);
    if interpolator.is_zero() {
        return interpolator;
    }

    let sites = match ele_data.sites(data_bounds.pad(config.site_fetch_padding)) {
        Ok(sites) => sites,
        Err(err) => {
            log.error(format!("Could not read elevation data: {}", err), None);
            Vec::new()
        }
    };

    if sites.is_empty() {
        log.error("No sites with known elevation available", None);
        return Interpolator::Zero(ZeroInterpolator);
    }

    debug!("using {} known sites with {}", sites.len(), interpolator.kind().name());
    interpolator.set_known_sites(&sites);
    interpolator
}

/// Elevation connectors resolved for one object
#[derive(Debug, Default)]
struct ObjectElevations {
    resolved: usize,
    fallbacks: usize,
    first_fallback: Option<ElevationError>,
}

fn resolve_object<O: WorldObject + ?Sized>(
    object: &mut O,
    interpolator: &Interpolator,
) -> Result<ObjectElevations> {
    let mut elevations = ObjectElevations::default();
    for connector in object.elevation_connectors_mut() {
        let pos = connector.pos();
        if !pos.is_finite() {
            return Err(ElevationError::InvalidGeometry(format!(
                "elevation connector position {:?} is not finite",
                pos
            )));
        }
        let ele = interpolator.try_interpolate_ele(pos).unwrap_or_else(|err| {
            elevations.fallbacks += 1;
            elevations.first_fallback.get_or_insert(err);
            0.0
        });
        connector.resolve(ele);
        elevations.resolved += 1;
    }
    Ok(elevations)
}

/// Assign the interpolated terrain elevation to every elevation connector
///
/// Objects are processed independently (in parallel with the `parallel`
/// feature). An object that fails is logged and left partially resolved.
/// Connectors without an interpolated elevation are placed at 0 and
/// reported in a single warning.
pub fn calculate_elevations<O: WorldObject>(
    objects: &mut [O],
    interpolator: &Interpolator,
    log: &ConversionLog,
) -> ElevationSummary {
    #[cfg(feature = "parallel")]
    let results: Vec<(usize, Result<ObjectElevations>)> = objects
        .par_iter_mut()
        .map(|o| (o.id(), resolve_object(o, interpolator)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(usize, Result<ObjectElevations>)> = objects
        .iter_mut()
        .map(|o| (o.id(), resolve_object(o, interpolator)))
        .collect();

    let mut summary = ElevationSummary::default();
    let mut first_fallback = None;
    for (id, result) in results {
        match result {
            Ok(elevations) => {
                summary.resolved_connectors += elevations.resolved;
                summary.fallback_connectors += elevations.fallbacks;
                if first_fallback.is_none() {
                    first_fallback = elevations.first_fallback;
                }
            }
            Err(err) => {
                log.error(format!("Could not resolve elevations: {}", err), Some(id));
                summary.failed_objects.push(id);
            }
        }
    }

    if let Some(err) = first_fallback {
        log.warn(
            format!(
                "{} elevation connectors could not be interpolated, using elevation 0 ({})",
                summary.fallback_connectors, err
            ),
            None,
        );
    }
    summary
}

/// Collect the surfaces of top-level objects into a grid index
///
/// Objects whose surfaces cannot be built are logged and returned as failed.
pub fn index_surfaces<O: WorldObject>(
    objects: &[O],
    config: &ElevationConfig,
    data_bounds: Rect,
    log: &ConversionLog,
) -> (SurfaceIndex, Vec<usize>) {
    let mut surfaces: Vec<Arc<AttachmentSurface>> = Vec::new();
    let mut failed = Vec::new();

    for object in objects.iter().filter(|o| o.is_top_level()) {
        match object.attachment_surfaces() {
            Ok(s) => surfaces.extend(s),
            Err(err) => {
                log.error(
                    format!("Could not build attachment surfaces: {}", err),
                    Some(object.id()),
                );
                failed.push(object.id());
            }
        }
    }

    let index = build_surface_index(
        data_bounds.pad(config.surface_index_padding),
        config.surface_index_cells,
        &surfaces,
    );
    debug!("indexed {} attachment surfaces", surfaces.len());

    (index, failed)
}

fn attach_object<O: WorldObject + ?Sized>(
    object: &mut O,
    index: &SurfaceIndex,
) -> Result<(usize, usize)> {
    let (mut attached, mut unattached) = (0, 0);
    for connector in object.attachment_connectors_mut() {
        if attach_connector(index, connector)? {
            attached += 1;
        } else {
            unattached += 1;
        }
    }
    Ok((attached, unattached))
}

/// Attach the connectors of all top-level objects to indexed surfaces
pub fn attach_connectors<O: WorldObject>(
    objects: &mut [O],
    config: &ElevationConfig,
    data_bounds: Rect,
    log: &ConversionLog,
) -> AttachmentSummary {
    let (index, failed_objects) = index_surfaces(objects, config, data_bounds, log);

    #[cfg(feature = "parallel")]
    let results: Vec<(usize, Result<(usize, usize)>)> = objects
        .par_iter_mut()
        .filter(|o| o.is_top_level())
        .map(|o| (o.id(), attach_object(o, &index)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<(usize, Result<(usize, usize)>)> = objects
        .iter_mut()
        .filter(|o| o.is_top_level())
        .map(|o| (o.id(), attach_object(o, &index)))
        .collect();

    let mut summary = AttachmentSummary {
        failed_objects,
        ..AttachmentSummary::default()
    };
    for (id, result) in results {
        match result {
            Ok((attached, unattached)) => {
                summary.attached_connectors += attached;
                summary.unattached_connectors += unattached;
            }
            Err(err) => {
                log.error(format!("Could not attach connectors: {}", err), Some(id));
                summary.failed_objects.push(id);
            }
        }
    }
    summary
}

/// Run elevation resolution and attachment for a scene
///
/// # Arguments
///
/// * `config` - Interpolation and matching settings
/// * `objects` - All objects of the scene
/// * `data_bounds` - Ground extent of the scene data
/// * `ele_data` - Terrain elevation dataset, `None` for flat terrain
///
/// # Example
///
/// ```
/// use scene_elevation::*;
///
/// let mut objects = vec![
///     SceneObject::new(1).with_elevation_connector(ElevationConnector::new(DVec2::new(5.0, 5.0))),
/// ];
/// let sites = InMemorySites::new(vec![KnownSite::new(5.0, 5.0, 42.0)]);
/// let config = ElevationConfigBuilder::new()
///     .interpolator(InterpolatorKind::InverseDistanceWeighting)
///     .build()
///     .unwrap();
///
/// let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
/// let report = run_conversion(&config, &mut objects, bounds, Some(&sites));
///
/// assert_eq!(report.resolved_connectors, 1);
/// assert_eq!(objects[0].elevation_connectors()[0].resolved(), Some(DVec3::new(5.0, 42.0, 5.0)));
/// ```
pub fn run_conversion<O: WorldObject>(
    config: &ElevationConfig,
    objects: &mut [O],
    data_bounds: Rect,
    ele_data: Option<&dyn TerrainElevationData>,
) -> ConversionReport {
    let log = ConversionLog::new();

    let interpolator = prepare_interpolator(config, data_bounds, ele_data, &log);
    let elevations = calculate_elevations(objects, &interpolator, &log);
    let attachments = attach_connectors(objects, config, data_bounds, &log);

    let mut failed_objects = elevations.failed_objects;
    for id in attachments.failed_objects {
        if !failed_objects.contains(&id) {
            failed_objects.push(id);
        }
    }

    debug!(
        "resolved {} elevation connectors, attached {} of {} attachment connectors",
        elevations.resolved_connectors,
        attachments.attached_connectors,
        attachments.attached_connectors + attachments.unattached_connectors
    );

    ConversionReport {
        interpolator: interpolator.kind(),
        resolved_connectors: elevations.resolved_connectors,
        fallback_connectors: elevations.fallback_connectors,
        attached_connectors: attachments.attached_connectors,
        unattached_connectors: attachments.unattached_connectors,
        failed_objects,
        log: log.into_entries(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentConnector;
    use crate::config::ElevationConfigBuilder;
    use crate::connector::ElevationConnector;
    use crate::geometry::Face;
    use crate::terrain::{InMemorySites, KnownSite};
    use crate::world::SceneObject;
    use glam::{DVec2, DVec3};

    struct FailingData;

    impl TerrainElevationData for FailingData {
        fn sites(&self, _bounds: Rect) -> Result<Vec<KnownSite>> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no tiles").into())
        }
    }

    /// Object whose surfaces cannot be built
    struct BrokenObject(SceneObject);

    impl WorldObject for BrokenObject {
        fn id(&self) -> usize {
            self.0.id()
        }

        fn elevation_connectors(&self) -> &[ElevationConnector] {
            self.0.elevation_connectors()
        }

        fn elevation_connectors_mut(&mut self) -> &mut [ElevationConnector] {
            self.0.elevation_connectors_mut()
        }

        fn attachment_connectors(&self) -> &[AttachmentConnector] {
            self.0.attachment_connectors()
        }

        fn attachment_connectors_mut(&mut self) -> &mut [AttachmentConnector] {
            self.0.attachment_connectors_mut()
        }

        fn attachment_surfaces(&self) -> Result<Vec<Arc<AttachmentSurface>>> {
            Err(ElevationError::InvalidGeometry("roof outline self-intersects".to_string()))
        }
    }

    fn bounds() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    fn ground_object(id: usize, positions: &[(f64, f64)]) -> SceneObject {
        positions.iter().fold(SceneObject::new(id), |o, &(x, z)| {
            o.with_elevation_connector(ElevationConnector::new(DVec2::new(x, z)))
        })
    }

    fn idw_config() -> ElevationConfig {
        ElevationConfigBuilder::new()
            .interpolator(InterpolatorKind::InverseDistanceWeighting)
            .build()
            .unwrap()
    }

    #[test]
    fn test_without_elevation_data_everything_is_flat() {
        let mut objects = vec![
            ground_object(1, &[(10.0, 10.0), (20.0, 30.0)]),
            ground_object(2, &[(50.0, 50.0)]),
        ];
        let config = ElevationConfigBuilder::new()
            .interpolator(InterpolatorKind::NaturalNeighbor)
            .build()
            .unwrap();

        let report = run_conversion(&config, &mut objects, bounds(), None);

        assert_eq!(report.interpolator, InterpolatorKind::Zero);
        assert_eq!(report.resolved_connectors, 3);
        for object in &objects {
            for connector in object.elevation_connectors() {
                assert_eq!(connector.resolved().unwrap().y, 0.0);
            }
        }
    }

    #[test]
    fn test_empty_sites_fall_back_to_zero() {
        let mut objects = vec![ground_object(1, &[(10.0, 10.0)])];
        let data = InMemorySites::new(vec![KnownSite::new(500.0, 500.0, 30.0)]);

        let report = run_conversion(&idw_config(), &mut objects, bounds(), Some(&data));

        assert_eq!(report.interpolator, InterpolatorKind::Zero);
        assert_eq!(
            objects[0].elevation_connectors()[0].resolved(),
            Some(DVec3::new(10.0, 0.0, 10.0))
        );
        assert_eq!(report.log.len(), 1);
        assert_eq!(report.log[0].level, LogLevel::Error);
    }

    #[test]
    fn test_fetch_failure_is_logged_and_recovered() {
        let mut objects = vec![ground_object(1, &[(10.0, 10.0)])];

        let report = run_conversion(&idw_config(), &mut objects, bounds(), Some(&FailingData));

        assert_eq!(report.interpolator, InterpolatorKind::Zero);
        assert_eq!(report.resolved_connectors, 1);
        assert!(report.log[0].message.contains("no tiles"));
        assert!(report.failed_objects.is_empty());
    }

    #[test]
    fn test_sites_are_fetched_with_padding() {
        let mut objects = vec![ground_object(1, &[(0.0, 0.0)])];
        // just outside the scene bounds but within the fetch padding
        let data = InMemorySites::new(vec![KnownSite::new(-5.0, 0.0, 12.0)]);

        let report = run_conversion(&idw_config(), &mut objects, bounds(), Some(&data));

        assert_eq!(report.interpolator, InterpolatorKind::InverseDistanceWeighting);
        let ele = objects[0].elevation_connectors()[0].resolved().unwrap().y;
        assert!((ele - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_uninterpolated_connectors_are_summarized() {
        let mut objects = vec![
            ground_object(1, &[(10.0, 10.0), (900.0, 900.0)]),
            ground_object(2, &[(950.0, 950.0)]),
        ];
        let data = InMemorySites::new(vec![KnownSite::new(0.0, 0.0, 8.0)]);
        let scene = Rect::new(0.0, 0.0, 1000.0, 1000.0);

        let report = run_conversion(&idw_config(), &mut objects, scene, Some(&data));

        assert_eq!(report.resolved_connectors, 3);
        assert_eq!(report.fallback_connectors, 2);
        assert!(report.failed_objects.is_empty());
        assert_eq!(report.log.len(), 1);
        assert_eq!(report.log[0].level, LogLevel::Warning);
        assert!(report.log[0].message.starts_with("2 elevation connectors"));

        let ele = |object: usize, connector: usize| {
            objects[object].elevation_connectors()[connector].resolved().unwrap().y
        };
        assert!((ele(0, 0) - 8.0).abs() < 1e-9);
        assert_eq!(ele(0, 1), 0.0);
        assert_eq!(ele(1, 0), 0.0);
    }

    #[test]
    fn test_failing_object_does_not_stop_the_run() {
        let mut objects = vec![
            ground_object(1, &[(10.0, 10.0)]),
            ground_object(2, &[(f64::NAN, 10.0)]),
            ground_object(3, &[(30.0, 30.0)]),
        ];
        let data = InMemorySites::new(vec![KnownSite::new(20.0, 20.0, 5.0)]);

        let report = run_conversion(&idw_config(), &mut objects, bounds(), Some(&data));

        assert_eq!(report.resolved_connectors, 2);
        assert_eq!(report.failed_objects, vec![2]);
        assert!(objects[0].elevation_connectors()[0].is_resolved());
        assert!(!objects[1].elevation_connectors()[0].is_resolved());
        assert!(objects[2].elevation_connectors()[0].is_resolved());
    }

    #[test]
    fn test_attachment_stage() {
        let floor = Face::horizontal(Rect::new(40.0, 40.0, 60.0, 60.0), 4.0).unwrap();
        let building = SceneObject::new(1)
            .with_attachment_surface(AttachmentSurface::new(["floor"], vec![floor]).unwrap());

        let on_floor =
            || AttachmentConnector::new(["floor"], DVec3::new(50.0, 0.0, 50.0), 0.0, false);
        let bench = SceneObject::new(2)
            .with_attachment_connector(on_floor())
            .with_attachment_connector(AttachmentConnector::new(
                ["floor"],
                DVec3::new(5.0, 0.0, 5.0),
                0.0,
                false,
            ));

        // parts are neither matched nor offer surfaces
        let part = SceneObject::new(3)
            .with_parent(1)
            .with_attachment_connector(on_floor());

        let mut objects = vec![building, bench, part];
        let report = run_conversion(&ElevationConfig::default(), &mut objects, bounds(), None);

        assert_eq!(report.attached_connectors, 1);
        assert_eq!(report.unattached_connectors, 1);
        assert_eq!(
            objects[1].attachment_connectors()[0].attached_pos(),
            Some(DVec3::new(50.0, 4.0, 50.0))
        );
        assert!(!objects[1].attachment_connectors()[1].is_attached());
        assert!(!objects[2].attachment_connectors()[0].is_attached());
    }

    #[test]
    fn test_broken_surfaces_are_isolated() {
        let floor = Face::horizontal(Rect::new(0.0, 0.0, 10.0, 10.0), 0.0).unwrap();
        let floor = AttachmentSurface::new(["floor"], vec![floor]).unwrap();
        let mut objects: Vec<Box<dyn WorldObject>> = vec![
            Box::new(BrokenObject(SceneObject::new(1))),
            Box::new(SceneObject::new(2).with_attachment_surface(floor)),
            Box::new(SceneObject::new(3).with_attachment_connector(AttachmentConnector::new(
                ["floor"],
                DVec3::new(5.0, 1.0, 5.0),
                0.0,
                false,
            ))),
        ];

        let report = run_conversion(&ElevationConfig::default(), &mut objects, bounds(), None);

        assert_eq!(report.failed_objects, vec![1]);
        assert_eq!(report.attached_connectors, 1);
        assert_eq!(report.log[0].object, Some(1));
    }

    #[test]
    fn test_log_collapses_repeated_entries() {
        let log = ConversionLog::new();
        log.warn("outside of terrain", Some(4));
        log.warn("outside of terrain", Some(4));
        log.warn("outside of terrain", Some(4));
        log.warn("outside of terrain", Some(5));
        log.error("outside of terrain", Some(5));

        let entries = log.into_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].repeats, 2);
        assert_eq!(
            entries[0].to_string(),
            "WARNING[4]: outside of terrain (2 similar entries suppressed)"
        );
        assert_eq!(entries[2].level, LogLevel::Error);
    }
}
