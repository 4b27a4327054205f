//! Application entry point for a stitching batch.
//!
//! [`StitchApp`] wires the whole pipeline together: metadata correlation
//! over the input root, per-prefix grouping, and one assembly task per
//! mosaic, all sharing a bounded worker pool. Mosaics are isolated from
//! each other; the batch only aborts when the input root is unreadable or
//! the output directory cannot be created.

mod config;
mod error;

pub use config::StitchConfig;
pub use error::AppError;

use crate::assembler::{BatchReport, MosaicAssembler, MosaicReport};
use crate::compositor::RasterCompositor;
use crate::metadata::MetadataCorrelator;
use crate::overlap::{OverlapEstimator, SeamStripMatcher};
use crate::pipeline::WorkerLimiter;
use crate::tile::group_by_prefix;
use futures::future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs a stitching batch over one scan directory.
pub struct StitchApp {
    config: StitchConfig,
}

impl StitchApp {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Runs the batch to completion.
    ///
    /// Returns a report covering every discovered mosaic; per-mosaic
    /// failures are recorded there, not raised here.
    pub async fn run(&self) -> Result<BatchReport, AppError> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            AppError::OutputRoot {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let records = MetadataCorrelator::new(&self.config.input_dir).correlate()?;
        let groups = group_by_prefix(records);
        if groups.is_empty() {
            warn!(
                input = %self.config.input_dir.display(),
                "no placeable tiles found, nothing to stitch"
            );
            return Ok(BatchReport::default());
        }

        info!(
            mosaics = groups.len(),
            workers = self.config.worker_limit,
            "starting assembly"
        );

        let assembler = MosaicAssembler::new(
            Arc::new(RasterCompositor::new()),
            Arc::new(OverlapEstimator::new(
                SeamStripMatcher::new(),
                self.config.overlap.clone(),
            )),
            WorkerLimiter::new(self.config.worker_limit, "raster"),
            &self.config.output_dir,
        );

        // One task per mosaic; join preserves prefix order.
        let tasks: Vec<_> = groups
            .into_iter()
            .map(|group| {
                let assembler = assembler.clone();
                let prefix = group.prefix.clone();
                (prefix, tokio::spawn(async move { assembler.assemble(group).await }))
            })
            .collect();

        let mut mosaics = Vec::with_capacity(tasks.len());
        for (prefix, joined) in future::join_all(
            tasks
                .into_iter()
                .map(|(prefix, handle)| async move { (prefix, handle.await) }),
        )
        .await
        {
            match joined {
                Ok(report) => mosaics.push(report),
                Err(e) => {
                    error!(prefix = %prefix, error = %e, "mosaic task panicked");
                    mosaics.push(MosaicReport::failed(
                        prefix,
                        format!("assembly task panicked: {}", e),
                    ));
                }
            }
        }

        let batch = BatchReport { mosaics };
        info!(
            completed = batch.completed(),
            failed = batch.failed(),
            "batch finished"
        );
        Ok(batch)
    }
}
