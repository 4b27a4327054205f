//! Reconstructs composite mosaics from grids of overlapping scan tiles.
//!
//! A scan produces one directory per tile, each holding a z-stack of
//! exposures, plus XML acquisition logs recording every tile's grid
//! position. This crate rebuilds the full picture:
//!
//! 1. [`metadata`] correlates directory names with acquisition logs into
//!    placed tile records, grouped per mosaic prefix by [`tile`].
//! 2. [`compositor`] flattens each z-stack into a single raster by
//!    per-pixel maximum projection.
//! 3. [`overlap`] estimates the duplicated pixel width between each pair
//!    of horizontal neighbours from point-correspondence consensus.
//! 4. [`assembler`] crops every left tile by its overlap, concatenates
//!    rows left-to-right, and stacks rows into the final mosaic.
//!
//! [`app::StitchApp`] drives the whole batch with bounded concurrency from
//! [`pipeline`]; failures are isolated per tile, per row and per mosaic,
//! and surfaced in a [`assembler::BatchReport`].
//!
//! # Examples
//!
//! ```no_run
//! use stackstitch::app::{StitchApp, StitchConfig};
//!
//! # async fn run() -> Result<(), stackstitch::app::AppError> {
//! let config = StitchConfig::new("/data/scan", "/data/out");
//! let report = StitchApp::new(config).run().await?;
//! println!("{} mosaics stitched", report.completed());
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod assembler;
pub mod compositor;
pub mod metadata;
pub mod overlap;
pub mod pipeline;
pub mod tile;
