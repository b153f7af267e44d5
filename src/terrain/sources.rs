//! Providers of known elevation sites

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::KnownSite;
use crate::error::{ElevationError, Result};
use crate::geometry::Rect;

/// External terrain dataset queried once per conversion run
pub trait TerrainElevationData {
    /// All known sites within a ground rectangle
    ///
    /// # Errors
    ///
    /// Fails if the underlying data cannot be read.
    fn sites(&self, bounds: Rect) -> Result<Vec<KnownSite>>;
}

/// A fixed list of sites held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySites {
    sites: Vec<KnownSite>,
}

impl InMemorySites {
    pub fn new(sites: Vec<KnownSite>) -> Self {
        Self { sites }
    }
}

impl TerrainElevationData for InMemorySites {
    fn sites(&self, bounds: Rect) -> Result<Vec<KnownSite>> {
        Ok(self
            .sites
            .iter()
            .filter(|s| bounds.contains(s.position))
            .copied()
            .collect())
    }
}

/// Sites read from a plain text file of `x z elevation` lines
///
/// Values are separated by whitespace. Blank lines and lines starting with
/// `#` are skipped. The file is read on every query.
#[derive(Debug, Clone)]
pub struct XyzFileSites {
    path: PathBuf,
}

impl XyzFileSites {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_line(line: &str, number: usize) -> Result<KnownSite> {
    let malformed = || {
        ElevationError::DataUnavailable(format!("malformed elevation line {}: {:?}", number, line))
    };

    let values: Vec<f64> = line
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|_| malformed()))
        .collect::<Result<_>>()?;

    match values[..] {
        [x, z, elevation] if x.is_finite() && z.is_finite() && elevation.is_finite() => {
            Ok(KnownSite::new(x, z, elevation))
        }
        _ => Err(malformed()),
    }
}

impl TerrainElevationData for XyzFileSites {
    fn sites(&self, bounds: Rect) -> Result<Vec<KnownSite>> {
        let reader = BufReader::new(File::open(&self.path)?);

        let mut sites = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let site = parse_line(trimmed, i + 1)?;
            if bounds.contains(site.position) {
                sites.push(site);
            }
        }
        Ok(sites)
    }
}
