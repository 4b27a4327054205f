//! Raster compositing collaborator.
//!
//! The pipeline treats raster work as an external collaborator behind the
//! [`ImageCompositor`] trait: flattening a z-stack, concatenating tiles into
//! rows and rows into mosaics, and trimming the trailing overlap off a tile.
//! [`RasterCompositor`] is the default implementation, backed by the `image`
//! crate; tests substitute mocks.

mod raster;

pub use raster::RasterCompositor;

use image::RgbaImage;
use std::path::{Path, PathBuf};

/// Working raster type. Decoded inputs are normalised to 8-bit RGBA.
pub type Raster = RgbaImage;

/// Errors from compositor operations.
#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    /// Filesystem failure reading or writing a raster.
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An exposure failed to decode.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An output raster failed to encode.
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An operation was handed an empty input list.
    #[error("compositor operation received no input rasters")]
    EmptyInput,

    /// Inputs to a concatenation disagree on the cross-axis dimension.
    #[error("raster dimension mismatch: expected {expected}px, found {found}px")]
    DimensionMismatch { expected: u32, found: u32 },

    /// A trailing-edge crop would consume the whole raster.
    #[error("crop of {pixels}px exceeds raster width {width}px")]
    CropExceedsWidth { pixels: u32, width: u32 },

    /// A pad target is narrower than the raster it should extend.
    #[error("pad target {target}px is narrower than raster width {width}px")]
    PadBelowWidth { target: u32, width: u32 },
}

/// Raster operations the stitching pipeline depends on.
///
/// Implementations must be thread-safe; the assembler invokes them from
/// bounded blocking workers. Every operation is stateless.
pub trait ImageCompositor: Send + Sync {
    /// Flatten a z-stack of exposure files into one composite raster.
    fn flatten_stack(&self, exposures: &[PathBuf]) -> Result<Raster, CompositorError>;

    /// Concatenate rasters left-to-right. Heights must agree.
    fn concat_horizontal(&self, rasters: &[Raster]) -> Result<Raster, CompositorError>;

    /// Concatenate rasters top-to-bottom. Widths must agree.
    fn concat_vertical(&self, rasters: &[Raster]) -> Result<Raster, CompositorError>;

    /// Remove `pixels` columns from the trailing (right) edge, full height.
    fn crop_trailing_edge(&self, raster: &Raster, pixels: u32) -> Result<Raster, CompositorError>;

    /// Extend the trailing (right) edge with background up to `width`
    /// columns. `width` must not be narrower than the raster.
    fn pad_to_width(&self, raster: &Raster, width: u32) -> Result<Raster, CompositorError>;

    /// Write a raster to disk.
    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<(), CompositorError>;
}
