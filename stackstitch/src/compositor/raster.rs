//! `image`-backed compositor implementation.
//!
//! Flattening uses a per-pixel, per-channel maximum projection across the
//! exposures, which keeps the in-focus (brightest) structure from each
//! z-plane. Concatenation composites the inputs onto a fresh canvas at
//! running offsets.

use super::{CompositorError, ImageCompositor, Raster};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default compositor backed by the `image` crate.
#[derive(Debug, Clone, Default)]
pub struct RasterCompositor;

impl RasterCompositor {
    /// Creates a new compositor.
    pub fn new() -> Self {
        Self
    }

    fn decode(path: &Path) -> Result<Raster, CompositorError> {
        let img = image::open(path).map_err(|source| CompositorError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(img.to_rgba8())
    }
}

impl ImageCompositor for RasterCompositor {
    fn flatten_stack(&self, exposures: &[PathBuf]) -> Result<Raster, CompositorError> {
        let (first, rest) = exposures.split_first().ok_or(CompositorError::EmptyInput)?;
        let mut composite = Self::decode(first)?;

        for path in rest {
            let layer = Self::decode(path)?;
            if layer.dimensions() != composite.dimensions() {
                return Err(CompositorError::DimensionMismatch {
                    expected: composite.width(),
                    found: layer.width(),
                });
            }
            for (acc, px) in composite.pixels_mut().zip(layer.pixels()) {
                for c in 0..4 {
                    acc.0[c] = acc.0[c].max(px.0[c]);
                }
            }
        }

        debug!(
            exposures = exposures.len(),
            width = composite.width(),
            height = composite.height(),
            "flattened z-stack"
        );
        Ok(composite)
    }

    fn concat_horizontal(&self, rasters: &[Raster]) -> Result<Raster, CompositorError> {
        let first = rasters.first().ok_or(CompositorError::EmptyInput)?;
        let height = first.height();

        let mut width: u32 = 0;
        for raster in rasters {
            if raster.height() != height {
                return Err(CompositorError::DimensionMismatch {
                    expected: height,
                    found: raster.height(),
                });
            }
            width += raster.width();
        }

        let mut canvas = RgbaImage::new(width, height);
        let mut x: i64 = 0;
        for raster in rasters {
            image::imageops::replace(&mut canvas, raster, x, 0);
            x += i64::from(raster.width());
        }
        Ok(canvas)
    }

    fn concat_vertical(&self, rasters: &[Raster]) -> Result<Raster, CompositorError> {
        let first = rasters.first().ok_or(CompositorError::EmptyInput)?;
        let width = first.width();

        let mut height: u32 = 0;
        for raster in rasters {
            if raster.width() != width {
                return Err(CompositorError::DimensionMismatch {
                    expected: width,
                    found: raster.width(),
                });
            }
            height += raster.height();
        }

        let mut canvas = RgbaImage::new(width, height);
        let mut y: i64 = 0;
        for raster in rasters {
            image::imageops::replace(&mut canvas, raster, 0, y);
            y += i64::from(raster.height());
        }
        Ok(canvas)
    }

    fn crop_trailing_edge(&self, raster: &Raster, pixels: u32) -> Result<Raster, CompositorError> {
        if pixels >= raster.width() {
            return Err(CompositorError::CropExceedsWidth {
                pixels,
                width: raster.width(),
            });
        }
        let kept = raster.width() - pixels;
        Ok(image::imageops::crop_imm(raster, 0, 0, kept, raster.height()).to_image())
    }

    fn pad_to_width(&self, raster: &Raster, width: u32) -> Result<Raster, CompositorError> {
        if width < raster.width() {
            return Err(CompositorError::PadBelowWidth {
                target: width,
                width: raster.width(),
            });
        }
        if width == raster.width() {
            return Ok(raster.clone());
        }
        let mut canvas =
            RgbaImage::from_pixel(width, raster.height(), image::Rgba([0, 0, 0, 255]));
        image::imageops::replace(&mut canvas, raster, 0, 0);
        Ok(canvas)
    }

    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<(), CompositorError> {
        raster.save(path).map_err(|source| CompositorError::Encode {
            path: path.to_path_buf(),
            source,
        })
    }
}
