//! Batch run configuration.

use crate::overlap::OverlapConfig;
use crate::pipeline::DEFAULT_WORKER_LIMIT;
use std::path::PathBuf;

/// Configuration for one stitching batch.
#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Scan root holding tile directories and acquisition logs.
    pub input_dir: PathBuf,

    /// Where flattened tiles, row rasters and mosaics are written.
    /// Created if absent.
    pub output_dir: PathBuf,

    /// Maximum concurrent raster workers.
    pub worker_limit: usize,

    /// Overlap estimation tuning.
    pub overlap: OverlapConfig,
}

impl StitchConfig {
    /// Configuration with default worker limit and overlap tuning.
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            worker_limit: DEFAULT_WORKER_LIMIT,
            overlap: OverlapConfig::default(),
        }
    }
}
