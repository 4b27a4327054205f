//! Mosaic assembly.
//!
//! [`MosaicAssembler`] turns one [`MosaicGroup`] into a stitched mosaic
//! raster: every tile's z-stack is flattened, every horizontally adjacent
//! pair gets an overlap estimate, each left tile is cropped along its
//! trailing edge by that estimate, rows are concatenated left-to-right and
//! finally stacked top-to-bottom, padded to the widest row where their
//! estimates left them a few pixels apart.
//!
//! Work fans out along the dependency DAG — flattens in parallel, pair
//! estimates in parallel, rows in parallel — all bounded by the worker
//! limiter. Ordering is structural, not temporal: results are joined in
//! submission order, so rows consume crops in ascending column order and
//! the mosaic consumes rows in ascending row order no matter what finishes
//! first.
//!
//! Failure is isolated at the smallest useful unit: a failed flatten or
//! overlap estimate fails its row, a failed row fails its mosaic, and
//! sibling rows and sibling mosaics keep going.

mod state;

pub use state::{BatchReport, MosaicPhase, MosaicReport, RowPhase, RowReport};

use crate::compositor::{CompositorError, ImageCompositor, Raster};
use crate::overlap::{Confidence, FeatureMatcher, OverlapEstimate, OverlapEstimator};
use crate::pipeline::WorkerLimiter;
use crate::tile::{GridPos, MosaicGroup, TileName};
use futures::future;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Assembles mosaics from flattened, overlap-trimmed tile grids.
pub struct MosaicAssembler<M> {
    compositor: Arc<dyn ImageCompositor>,
    estimator: Arc<OverlapEstimator<M>>,
    limiter: WorkerLimiter,
    output_dir: PathBuf,
}

impl<M> Clone for MosaicAssembler<M> {
    fn clone(&self) -> Self {
        Self {
            compositor: Arc::clone(&self.compositor),
            estimator: Arc::clone(&self.estimator),
            limiter: self.limiter.clone(),
            output_dir: self.output_dir.clone(),
        }
    }
}

/// One flattened tile staged for row assembly.
struct StagedTile {
    name: TileName,
    pos: GridPos,
    raster: Arc<Raster>,
}

impl<M: FeatureMatcher + 'static> MosaicAssembler<M> {
    /// Creates an assembler writing outputs into `output_dir`.
    pub fn new(
        compositor: Arc<dyn ImageCompositor>,
        estimator: Arc<OverlapEstimator<M>>,
        limiter: WorkerLimiter,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compositor,
            estimator,
            limiter,
            output_dir: output_dir.into(),
        }
    }

    /// Assembles one mosaic group end to end.
    ///
    /// Never returns an error: every failure is captured in the report so
    /// sibling mosaics keep running.
    pub async fn assemble(&self, group: MosaicGroup) -> MosaicReport {
        let prefix = group.prefix.clone();
        info!(
            prefix = %prefix,
            tiles = group.tiles.len(),
            rows = group.row_count,
            cols = group.col_count,
            phase = ?MosaicPhase::MetadataResolved,
            "assembling mosaic"
        );

        // Flatten every placed tile's z-stack, bounded-parallel.
        let (flattened, flatten_failures) = self.flatten_tiles(&group).await;

        // Assemble all rows in parallel; join preserves ascending row order.
        let row_futures = (0..group.row_count)
            .map(|row| self.assemble_row(&group, row, &flattened, &flatten_failures));
        let row_outcomes = future::join_all(row_futures).await;

        let mut reports: Vec<RowReport> = Vec::new();
        let mut row_rasters: Vec<Raster> = Vec::new();
        for outcome in row_outcomes.into_iter().flatten() {
            let (report, raster) = outcome;
            if let Some(raster) = raster {
                row_rasters.push(raster);
            }
            reports.push(report);
        }

        info!(prefix = %prefix, phase = ?MosaicPhase::RowsAssembled, "all rows terminal");

        let failed_rows: Vec<u32> = reports
            .iter()
            .filter(|r| !r.is_complete())
            .map(|r| r.row)
            .collect();

        if !failed_rows.is_empty() {
            error!(prefix = %prefix, rows = ?failed_rows, "mosaic failed: rows incomplete");
            return MosaicReport {
                prefix,
                phase: MosaicPhase::Failed,
                rows: reports,
                output: None,
                failure: Some(format!("rows {:?} failed to assemble", failed_rows)),
            };
        }
        if row_rasters.is_empty() {
            error!(prefix = %prefix, "mosaic failed: no rows assembled");
            return MosaicReport {
                prefix,
                phase: MosaicPhase::Failed,
                rows: reports,
                output: None,
                failure: Some("no rows assembled".to_string()),
            };
        }

        // Stack rows top-to-bottom, ascending row order.
        let out_path = self
            .output_dir
            .join(format!("stitched_mosaic_{}.tif", prefix));
        let compositor = Arc::clone(&self.compositor);
        let write_path = out_path.clone();
        let _permit = self.limiter.acquire().await;
        let stacked = tokio::task::spawn_blocking(move || {
            // Each row's width reflects its own overlap estimates, so rows
            // routinely disagree by a pixel or two of estimate noise. Pad
            // every row to the widest before stacking.
            let widest = row_rasters.iter().map(|r| r.width()).max().unwrap_or(0);
            let mut padded = Vec::with_capacity(row_rasters.len());
            for raster in &row_rasters {
                padded.push(compositor.pad_to_width(raster, widest)?);
            }
            let mosaic = compositor.concat_vertical(&padded)?;
            compositor.write_raster(&mosaic, &write_path)?;
            Ok::<(), CompositorError>(())
        })
        .await;

        match flatten_join(stacked) {
            Ok(()) => {
                info!(
                    prefix = %prefix,
                    output = %out_path.display(),
                    phase = ?MosaicPhase::MosaicComplete,
                    "mosaic complete"
                );
                MosaicReport {
                    prefix,
                    phase: MosaicPhase::MosaicComplete,
                    rows: reports,
                    output: Some(out_path),
                    failure: None,
                }
            }
            Err(reason) => {
                error!(prefix = %prefix, error = %reason, "mosaic concatenation failed");
                MosaicReport {
                    prefix,
                    phase: MosaicPhase::Failed,
                    rows: reports,
                    output: None,
                    failure: Some(reason),
                }
            }
        }
    }

    /// Flattens every tile of the group, bounded-parallel.
    ///
    /// Returns the flattened rasters by grid position, plus the failure
    /// reason for every tile that didn't make it.
    async fn flatten_tiles(
        &self,
        group: &MosaicGroup,
    ) -> (HashMap<GridPos, Arc<Raster>>, HashMap<GridPos, String>) {
        let futures = group.tiles.iter().map(|tile| {
            let compositor = Arc::clone(&self.compositor);
            let limiter = self.limiter.clone();
            let name = tile.name.clone();
            let pos = tile.position.expect("grouped tiles are placed");
            let exposures = tile.exposures.clone();
            let out_path = self.output_dir.join(format!("{}.tif", name));

            async move {
                let _permit = limiter.acquire().await;
                let result = tokio::task::spawn_blocking(move || {
                    let raster = compositor.flatten_stack(&exposures)?;
                    compositor.write_raster(&raster, &out_path)?;
                    Ok::<Raster, CompositorError>(raster)
                })
                .await;
                (name, pos, flatten_join(result))
            }
        });

        let mut flattened = HashMap::new();
        let mut failures = HashMap::new();
        for (name, pos, result) in future::join_all(futures).await {
            match result {
                Ok(raster) => {
                    debug!(tile = %name, row = pos.row, col = pos.col, "tile flattened");
                    flattened.insert(pos, Arc::new(raster));
                }
                Err(reason) => {
                    warn!(
                        tile = %name,
                        row = pos.row,
                        col = pos.col,
                        error = %reason,
                        "tile flatten failed; its rows cannot assemble"
                    );
                    failures.insert(pos, reason);
                }
            }
        }
        (flattened, failures)
    }

    /// Assembles one row: overlap estimates for each adjacent pair, crops
    /// consumed in ascending column order, horizontal concatenation.
    ///
    /// Returns `None` for a row with no tiles at all (every candidate was
    /// dropped during correlation); such rows are excluded from the mosaic
    /// rather than failing it.
    async fn assemble_row(
        &self,
        group: &MosaicGroup,
        row: u32,
        flattened: &HashMap<GridPos, Arc<Raster>>,
        flatten_failures: &HashMap<GridPos, String>,
    ) -> Option<(RowReport, Option<Raster>)> {
        let prefix = &group.prefix;
        let row_tiles = group.row(row);
        if row_tiles.is_empty() {
            warn!(prefix = %prefix, row, "row has no placed tiles, excluded from mosaic");
            return None;
        }

        // A tile that failed to flatten poisons exactly this row.
        let mut staged: Vec<StagedTile> = Vec::with_capacity(row_tiles.len());
        for tile in &row_tiles {
            let pos = tile.position.expect("grouped tiles are placed");
            match flattened.get(&pos) {
                Some(raster) => staged.push(StagedTile {
                    name: tile.name.clone(),
                    pos,
                    raster: Arc::clone(raster),
                }),
                None => {
                    let reason = flatten_failures
                        .get(&pos)
                        .cloned()
                        .unwrap_or_else(|| "tile raster unavailable".to_string());
                    error!(
                        prefix = %prefix,
                        row,
                        col = pos.col,
                        tile = %tile.name,
                        error = %reason,
                        "row failed: missing flattened tile"
                    );
                    return Some((
                        RowReport::failed(row, format!("tile {}: {}", tile.name, reason)),
                        None,
                    ));
                }
            }
        }

        debug!(prefix = %prefix, row, tiles = staged.len(), phase = ?RowPhase::Pending, "row staged");

        // Estimate all adjacent-pair overlaps in parallel; join preserves
        // pair order, so consumption stays in ascending column order.
        let estimate_futures = staged.windows(2).map(|pair| {
            let estimator = Arc::clone(&self.estimator);
            let limiter = self.limiter.clone();
            let left = Arc::clone(&pair[0].raster);
            let right = Arc::clone(&pair[1].raster);
            async move {
                let _permit = limiter.acquire().await;
                tokio::task::spawn_blocking(move || estimator.estimate(&left, &right)).await
            }
        });
        let estimate_results = future::join_all(estimate_futures).await;

        let mut estimates: Vec<OverlapEstimate> = Vec::with_capacity(estimate_results.len());
        for (i, result) in estimate_results.into_iter().enumerate() {
            let (left, right) = (&staged[i], &staged[i + 1]);
            match flatten_join(result) {
                Ok(estimate) => {
                    if estimate.confidence == Confidence::Low {
                        warn!(
                            prefix = %prefix,
                            row,
                            left = %left.name,
                            right = %right.name,
                            distance = estimate.distance,
                            "low-confidence overlap estimate"
                        );
                    }
                    estimates.push(estimate);
                }
                Err(reason) => {
                    error!(
                        prefix = %prefix,
                        row,
                        left = %left.name,
                        left_col = left.pos.col,
                        right = %right.name,
                        right_col = right.pos.col,
                        error = %reason,
                        "row failed: overlap estimation"
                    );
                    return Some((
                        RowReport::failed(
                            row,
                            format!("overlap {} / {}: {}", left.name, right.name, reason),
                        ),
                        None,
                    ));
                }
            }
        }

        debug!(prefix = %prefix, row, phase = ?RowPhase::OverlapResolved, "overlaps resolved");

        // Crop trailing edges and concatenate, strictly left to right.
        let compositor = Arc::clone(&self.compositor);
        let out_path = self
            .output_dir
            .join(format!("stitched_row_{}_{}.tif", prefix, row));
        let write_path = out_path.clone();
        let rasters: Vec<Arc<Raster>> = staged.iter().map(|t| Arc::clone(&t.raster)).collect();

        let _permit = self.limiter.acquire().await;
        let result = tokio::task::spawn_blocking(move || {
            let mut parts: Vec<Raster> = Vec::with_capacity(rasters.len());
            for (i, raster) in rasters.iter().enumerate() {
                if let Some(estimate) = estimates.get(i) {
                    // Remove the pixels adjacent to the right neighbour.
                    parts.push(compositor.crop_trailing_edge(raster, estimate.distance)?);
                } else {
                    // Last tile of the row keeps its trailing edge.
                    parts.push(raster.as_ref().clone());
                }
            }
            let row_raster = compositor.concat_horizontal(&parts)?;
            compositor.write_raster(&row_raster, &write_path)?;
            Ok::<Raster, CompositorError>(row_raster)
        })
        .await;

        match flatten_join(result) {
            Ok(row_raster) => {
                info!(
                    prefix = %prefix,
                    row,
                    output = %out_path.display(),
                    phase = ?RowPhase::RowComplete,
                    "row complete"
                );
                Some((RowReport::complete(row, out_path), Some(row_raster)))
            }
            Err(reason) => {
                error!(prefix = %prefix, row, error = %reason, "row failed: concatenation");
                Some((RowReport::failed(row, reason), None))
            }
        }
    }
}

/// Collapses a `spawn_blocking` join result into a failure reason.
fn flatten_join<T, E: std::fmt::Display>(
    result: Result<Result<T, E>, JoinError>,
) -> Result<T, String> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) => Err(format!("worker panicked: {}", join)),
    }
}
