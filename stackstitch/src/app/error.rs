//! Batch-fatal errors.
//!
//! Almost nothing here is fatal on purpose: a broken tile fails its row, a
//! broken row fails its mosaic, a broken mosaic fails only itself, and all
//! of that lives in the batch report. [`AppError`] covers the rest — the
//! conditions under which no batch can run at all.

use crate::metadata::MetadataError;
use std::path::PathBuf;

/// Error that aborts the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The input root could not be scanned.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
