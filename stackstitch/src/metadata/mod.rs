//! Metadata correlation.
//!
//! [`MetadataCorrelator`] walks the scan's input root and rebuilds the tile
//! grid. Directory entries split into two kinds: tile directories (each
//! holding one z-stack of exposures, named by the v1 tile convention) and
//! `.log` files (one XML acquisition record per mosaic prefix). Every tile
//! directory whose identity matches a log entry is annotated with that
//! entry's `(row, col)`; tiles with no matching log entry stay unplaced and
//! are filtered out at grouping time.
//!
//! Failure isolation: a directory name that breaks the convention, or a log
//! that fails to parse, skips that entry only. The only fatal error is an
//! unreadable input root.

mod log;

pub use log::{parse_log, parse_log_file, LogEntry, LogError};

use crate::tile::{parse_tile_name, GridPos, TileName, TileRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Error scanning the input root.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// Input root missing or unreadable. Fatal for the batch.
    #[error("failed to read input root {path}: {source}")]
    InputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Correlates directory listings with acquisition logs into tile records.
pub struct MetadataCorrelator {
    root: PathBuf,
}

impl MetadataCorrelator {
    /// Creates a correlator over the given input root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Scans the input root and returns the correlated tile records.
    ///
    /// The result is deterministic for an unchanged directory: entries are
    /// visited in sorted order and exposure lists are sorted, so rerunning
    /// yields an identical `(prefix, row, col)` assignment set.
    pub fn correlate(&self) -> Result<Vec<TileRecord>, MetadataError> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.root)
            .map_err(|source| MetadataError::InputRoot {
                path: self.root.clone(),
                source,
            })?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        entries.sort();

        let mut records: Vec<TileRecord> = Vec::new();
        let mut log_paths: Vec<PathBuf> = Vec::new();

        for path in entries {
            if path.is_dir() {
                match self.read_tile_dir(&path) {
                    Some(record) => records.push(record),
                    None => continue,
                }
            } else if path.extension().is_some_and(|ext| ext == "log") {
                log_paths.push(path);
            }
        }

        // Parse every log; one bad log must not prevent parsing others.
        let mut placements: HashMap<TileName, GridPos> = HashMap::new();
        for path in &log_paths {
            match parse_log_file(path) {
                Ok(entries) => {
                    for entry in entries {
                        placements.insert(entry.name, entry.position);
                    }
                }
                Err(e) => {
                    warn!(log = %path.display(), error = %e, "skipping unparseable acquisition log");
                }
            }
        }

        for record in &mut records {
            match placements.get(&record.name) {
                Some(pos) => {
                    debug!(
                        prefix = %record.name.prefix,
                        index = record.name.index,
                        row = pos.row,
                        col = pos.col,
                        "tile placed from acquisition log"
                    );
                    record.position = Some(*pos);
                }
                None => {
                    warn!(
                        prefix = %record.name.prefix,
                        index = record.name.index,
                        "no acquisition log entry for tile"
                    );
                }
            }
        }

        info!(
            tiles = records.len(),
            logs = log_paths.len(),
            placed = records.iter().filter(|r| r.position.is_some()).count(),
            "metadata correlation finished"
        );

        Ok(records)
    }

    /// Reads one tile directory into an unplaced record.
    ///
    /// Returns `None` (with a warning) when the name breaks the convention
    /// or the directory holds no exposures.
    fn read_tile_dir(&self, path: &Path) -> Option<TileRecord> {
        let dir_name = path.file_name()?.to_string_lossy();
        let name = match parse_tile_name(&dir_name) {
            Ok(name) => name,
            Err(e) => {
                warn!(dir = %path.display(), error = %e, "skipping directory with unconventional name");
                return None;
            }
        };

        let mut exposures: Vec<PathBuf> = match std::fs::read_dir(path) {
            Ok(iter) => iter
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                        .is_some_and(|ext| ext == "tif" || ext == "tiff")
                })
                .collect(),
            Err(e) => {
                warn!(dir = %path.display(), error = %e, "skipping unreadable tile directory");
                return None;
            }
        };
        exposures.sort();

        if exposures.is_empty() {
            warn!(dir = %path.display(), "skipping tile directory with no exposures");
            return None;
        }

        Some(TileRecord {
            name,
            dir: path.to_path_buf(),
            exposures,
            position: None,
        })
    }
}
