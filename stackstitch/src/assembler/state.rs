//! Assembly state tracking.
//!
//! Every mosaic and every row walks a small state machine; the terminal
//! states are captured in reports so a failed unit can be re-run on its
//! own. Phases only ever advance.
//!
//! Mosaic: `Discovered → MetadataResolved → RowsAssembled →
//! MosaicComplete | Failed`. Row: `Pending → OverlapResolved →
//! RowComplete | Failed`.

use std::path::PathBuf;

/// Lifecycle of one mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicPhase {
    /// Grid known, nothing assembled yet.
    Discovered,
    /// All tiles carry resolved grid positions.
    MetadataResolved,
    /// Every row has reached a terminal state.
    RowsAssembled,
    /// Final mosaic raster written.
    MosaicComplete,
    /// At least one stage failed; see the report's failure reason.
    Failed,
}

/// Lifecycle of one row within a mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPhase {
    /// Tiles known, overlaps not yet estimated.
    Pending,
    /// Every adjacent pair has an overlap estimate.
    OverlapResolved,
    /// Row raster written.
    RowComplete,
    /// Row could not be assembled.
    Failed,
}

/// Terminal record for one row.
#[derive(Debug, Clone)]
pub struct RowReport {
    /// Row index within the mosaic grid.
    pub row: u32,
    /// Terminal phase (`RowComplete` or `Failed`).
    pub phase: RowPhase,
    /// Written row raster, when complete.
    pub output: Option<PathBuf>,
    /// Failure description, when failed.
    pub failure: Option<String>,
}

impl RowReport {
    pub fn complete(row: u32, output: PathBuf) -> Self {
        Self {
            row,
            phase: RowPhase::RowComplete,
            output: Some(output),
            failure: None,
        }
    }

    pub fn failed(row: u32, failure: impl Into<String>) -> Self {
        Self {
            row,
            phase: RowPhase::Failed,
            output: None,
            failure: Some(failure.into()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == RowPhase::RowComplete
    }
}

/// Terminal record for one mosaic.
#[derive(Debug, Clone)]
pub struct MosaicReport {
    /// Mosaic prefix.
    pub prefix: String,
    /// Terminal phase (`MosaicComplete` or `Failed`).
    pub phase: MosaicPhase,
    /// Per-row outcomes, ascending row order.
    pub rows: Vec<RowReport>,
    /// Written mosaic raster, when complete.
    pub output: Option<PathBuf>,
    /// Failure description, when failed.
    pub failure: Option<String>,
}

impl MosaicReport {
    pub fn is_complete(&self) -> bool {
        self.phase == MosaicPhase::MosaicComplete
    }

    pub fn failed(prefix: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            phase: MosaicPhase::Failed,
            rows: Vec::new(),
            output: None,
            failure: Some(failure.into()),
        }
    }
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One report per mosaic prefix, in prefix order.
    pub mosaics: Vec<MosaicReport>,
}

impl BatchReport {
    /// Number of mosaics that completed.
    pub fn completed(&self) -> usize {
        self.mosaics.iter().filter(|m| m.is_complete()).count()
    }

    /// Number of mosaics that failed.
    pub fn failed(&self) -> usize {
        self.mosaics.len() - self.completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_report_constructors() {
        let ok = RowReport::complete(2, PathBuf::from("row.tif"));
        assert!(ok.is_complete());
        assert_eq!(ok.row, 2);

        let bad = RowReport::failed(3, "no overlap");
        assert!(!bad.is_complete());
        assert_eq!(bad.failure.as_deref(), Some("no overlap"));
    }

    #[test]
    fn test_batch_counts() {
        let batch = BatchReport {
            mosaics: vec![
                MosaicReport {
                    prefix: "a".into(),
                    phase: MosaicPhase::MosaicComplete,
                    rows: vec![],
                    output: None,
                    failure: None,
                },
                MosaicReport::failed("b", "boom"),
            ],
        };
        assert_eq!(batch.completed(), 1);
        assert_eq!(batch.failed(), 1);
    }
}
