//! Horizontal overlap estimation between adjacent tiles.
//!
//! Given two tiles known to be horizontal neighbours in the same row, the
//! estimator recovers the pixel width of their duplicated content:
//!
//! 1. Search is restricted to the left tile's rightmost third and the right
//!    tile's leftmost third — the scan step keeps true overlap inside that
//!    band, and narrowing the window suppresses false correspondences.
//! 2. Both crops are normalised to 8-bit grayscale with an identical
//!    contrast gain (the matcher wants 8-bit, and scan imagery is dim).
//! 3. The matcher returns point correspondences; an oversized low-precision
//!    set is cut to the best K by score.
//! 4. Each match contributes `displacement = crop_width − query.x`, the gap
//!    between the matched point and the left tile's trailing edge.
//! 5. The estimate is the lower-middle median of the sorted displacements.
//!    Correspondences are noisy; the median shrugs off a spurious minority
//!    without a full robust fit, since the only modelled degree of freedom
//!    is horizontal translation.
//!
//! Zero matches fail with [`OverlapError::NoOverlapFound`]. A thin match
//! set still produces an estimate, flagged [`Confidence::Low`].

mod matcher;

pub use matcher::{FeatureMatch, FeatureMatcher, KeyPoint, MatcherError, SeamStripMatcher};

use crate::compositor::Raster;
use image::GrayImage;
use tracing::debug;

/// Default cap on retained correspondences per pair.
pub const DEFAULT_MAX_MATCHES: usize = 100;

/// Default match count below which an estimate is flagged low-confidence.
pub const DEFAULT_MIN_CONFIDENT_MATCHES: usize = 3;

/// Default contrast gain applied to both crops before matching.
pub const DEFAULT_CONTRAST_GAIN: f32 = 10.0;

/// Tuning for the overlap estimator.
#[derive(Debug, Clone)]
pub struct OverlapConfig {
    /// Multiplicative contrast boost applied identically to both crops.
    pub contrast_gain: f32,

    /// Keep at most this many matches, best score first.
    pub max_matches: usize,

    /// Estimates from fewer matches than this are flagged low-confidence.
    pub min_confident_matches: usize,

    /// Treat a low-confidence estimate as a failure instead of a result.
    pub reject_low_confidence: bool,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            contrast_gain: DEFAULT_CONTRAST_GAIN,
            max_matches: DEFAULT_MAX_MATCHES,
            min_confident_matches: DEFAULT_MIN_CONFIDENT_MATCHES,
            reject_low_confidence: false,
        }
    }
}

/// How trustworthy an estimate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Backed by at least the configured minimum of correspondences.
    Normal,
    /// Backed by fewer; returned anyway, caller may want to log it.
    Low,
}

/// Estimated horizontal overlap for one adjacent tile pair.
///
/// `base_width`/`base_height` are the left tile's full, uncropped
/// dimensions; `distance` is always in `[0, base_width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlapEstimate {
    /// Overlap width in pixels.
    pub distance: u32,
    /// Full width of the left tile.
    pub base_width: u32,
    /// Full height of the left tile.
    pub base_height: u32,
    /// Estimate confidence.
    pub confidence: Confidence,
}

/// Errors from overlap estimation.
#[derive(Debug, thiserror::Error)]
pub enum OverlapError {
    /// The matcher produced no correspondences at all.
    #[error("no overlap correspondences found between adjacent tiles")]
    NoOverlapFound,

    /// Too few correspondences and the config demands rejection.
    #[error("only {matches} correspondences found (minimum {required})")]
    LowConfidence { matches: usize, required: usize },

    /// A tile is too narrow to carve a search window from.
    #[error("tile too narrow for an overlap search window ({width}px wide)")]
    WindowTooNarrow { width: u32 },

    /// The matching backend failed outright.
    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

/// Estimates the horizontal overlap of adjacent tile pairs.
pub struct OverlapEstimator<M> {
    matcher: M,
    config: OverlapConfig,
}

impl<M: FeatureMatcher> OverlapEstimator<M> {
    /// Creates an estimator over the given matcher.
    pub fn new(matcher: M, config: OverlapConfig) -> Self {
        Self { matcher, config }
    }

    /// Estimate the overlap between `left` and `right`, horizontal
    /// neighbours in the same row.
    pub fn estimate(&self, left: &Raster, right: &Raster) -> Result<OverlapEstimate, OverlapError> {
        let (left_w, left_h) = left.dimensions();
        let (right_w, _) = right.dimensions();

        // Left tile's rightmost third, right tile's leftmost third. A tile
        // narrower than 3px has no third to carve.
        if left_w < 3 {
            return Err(OverlapError::WindowTooNarrow { width: left_w });
        }
        if right_w < 3 {
            return Err(OverlapError::WindowTooNarrow { width: right_w });
        }
        let window_start = 2 * left_w / 3;
        let left_crop_w = left_w - window_start;
        let right_crop_w = right_w / 3;

        let query = self.normalize(left, window_start, left_crop_w);
        let train = self.normalize(right, 0, right_crop_w);

        let mut matches = self.matcher.match_features(&query, &train)?;
        if matches.is_empty() {
            return Err(OverlapError::NoOverlapFound);
        }

        // A low-precision many-to-many set gets cut to the best K; a
        // high-precision one-to-one set passes through untouched.
        if matches.len() > self.config.max_matches {
            matches.sort_by(|a, b| a.score.total_cmp(&b.score));
            matches.truncate(self.config.max_matches);
        }

        let confidence = if matches.len() < self.config.min_confident_matches {
            if self.config.reject_low_confidence {
                return Err(OverlapError::LowConfidence {
                    matches: matches.len(),
                    required: self.config.min_confident_matches,
                });
            }
            Confidence::Low
        } else {
            Confidence::Normal
        };

        let displacements: Vec<u32> = matches
            .iter()
            .map(|m| {
                let gap = left_crop_w as f32 - m.query.x;
                (gap.max(0.0).floor() as u32).min(left_w.saturating_sub(1))
            })
            .collect();

        let distance =
            consensus_median(displacements).expect("non-empty match set has a median");

        debug!(
            matches = matches.len(),
            distance,
            base_width = left_w,
            confidence = ?confidence,
            "overlap estimated"
        );

        Ok(OverlapEstimate {
            distance,
            base_width: left_w,
            base_height: left_h,
            confidence,
        })
    }

    /// Crop a window out of a tile and normalise it for the matcher:
    /// 8-bit grayscale with the configured contrast gain.
    fn normalize(&self, raster: &Raster, x0: u32, width: u32) -> GrayImage {
        let crop = image::imageops::crop_imm(raster, x0, 0, width, raster.height()).to_image();
        let mut gray = image::imageops::grayscale(&crop);
        let gain = self.config.contrast_gain;
        for px in gray.pixels_mut() {
            px.0[0] = (px.0[0] as f32 * gain).min(255.0) as u8;
        }
        gray
    }
}

/// Lower-middle median: element `floor(n/2)` of the ascending sort.
fn consensus_median(mut values: Vec<u32>) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    Some(values[values.len() / 2])
}
