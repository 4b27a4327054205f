//! Feature matching collaborator.
//!
//! The overlap estimator treats keypoint detection and descriptor matching
//! as an external collaborator behind [`FeatureMatcher`]. The built-in
//! [`SeamStripMatcher`] is a CPU correspondence search over zero-normalised
//! cross-correlation: it carves fixed-size strips anchored at the train
//! crop's leading (left) edge and hunts for each strip's best placement in
//! the query crop, tolerating a few pixels of vertical stage drift.
//!
//! Anchoring the strips at the train crop's left edge matters: the
//! estimator's displacement formula reads the overlap width off the query
//! point alone, which is exact only when the matched content sits at the
//! train crop's leading boundary.

use image::GrayImage;

/// A point in a crop's local coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

/// One correspondence between the query (left) and train (right) crops.
///
/// `score` follows the brute-force matcher convention: an L2-like distance,
/// lower is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    /// Location in the query (left tile) crop.
    pub query: KeyPoint,
    /// Location in the train (right tile) crop.
    pub train: KeyPoint,
    /// Match distance; lower is better.
    pub score: f32,
}

/// Error from a feature matching backend.
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    /// Backend-specific failure.
    #[error("feature matcher backend failure: {0}")]
    Backend(String),
}

/// Produces point correspondences between two grayscale crops.
///
/// Implementations must be thread-safe; the estimator is invoked from
/// bounded blocking workers. Returning an empty set is not an error — the
/// estimator decides how to treat it.
pub trait FeatureMatcher: Send + Sync {
    /// Match features of `query` (left tile crop) against `train` (right
    /// tile crop).
    fn match_features(
        &self,
        query: &GrayImage,
        train: &GrayImage,
    ) -> Result<Vec<FeatureMatch>, MatcherError>;
}

/// Default matcher: ZNCC strip search anchored at the train crop's seam.
#[derive(Debug, Clone)]
pub struct SeamStripMatcher {
    /// Strip width in pixels, taken from the train crop's left edge.
    strip_width: u32,
    /// Strip height; one strip per vertical segment.
    strip_height: u32,
    /// Vertical search slack around the strip's own row, in pixels.
    vertical_drift: u32,
    /// Minimum per-pixel variance for a strip to count as textured.
    min_variance: f32,
    /// Minimum ZNCC for a placement to be reported as a correspondence.
    min_correlation: f32,
}

impl Default for SeamStripMatcher {
    fn default() -> Self {
        Self {
            strip_width: 16,
            strip_height: 48,
            vertical_drift: 4,
            min_variance: 25.0,
            min_correlation: 0.6,
        }
    }
}

impl SeamStripMatcher {
    /// Creates a matcher with default strip geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strip geometry (width, height).
    pub fn with_strip_size(mut self, width: u32, height: u32) -> Self {
        self.strip_width = width;
        self.strip_height = height;
        self
    }

    /// Set the vertical drift allowance.
    pub fn with_vertical_drift(mut self, drift: u32) -> Self {
        self.vertical_drift = drift;
        self
    }

    /// Mean and variance of a rectangular window.
    fn window_stats(img: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> (f32, f32) {
        let n = (w * h) as f32;
        let mut sum = 0.0f32;
        let mut sum_sq = 0.0f32;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let v = img.get_pixel(x, y).0[0] as f32;
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean = sum / n;
        (mean, (sum_sq / n - mean * mean).max(0.0))
    }

    /// Zero-normalised cross-correlation between a train strip and a query
    /// window of the same size.
    fn zncc(
        query: &GrayImage,
        qx: u32,
        qy: u32,
        train: &GrayImage,
        ty: u32,
        w: u32,
        h: u32,
        train_mean: f32,
        train_var: f32,
    ) -> f32 {
        let (q_mean, q_var) = Self::window_stats(query, qx, qy, w, h);
        if q_var <= f32::EPSILON || train_var <= f32::EPSILON {
            return 0.0;
        }

        let mut cov = 0.0f32;
        for dy in 0..h {
            for dx in 0..w {
                let q = query.get_pixel(qx + dx, qy + dy).0[0] as f32 - q_mean;
                let t = train.get_pixel(dx, ty + dy).0[0] as f32 - train_mean;
                cov += q * t;
            }
        }
        let n = (w * h) as f32;
        cov / (n * q_var.sqrt() * train_var.sqrt())
    }
}

impl FeatureMatcher for SeamStripMatcher {
    fn match_features(
        &self,
        query: &GrayImage,
        train: &GrayImage,
    ) -> Result<Vec<FeatureMatch>, MatcherError> {
        let (qw, qh) = query.dimensions();
        let (tw, th) = train.dimensions();
        let w = self.strip_width;
        let h = self.strip_height.min(th).min(qh);

        if w > qw || w > tw || h == 0 {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();

        let mut y0 = 0;
        while y0 + h <= th {
            let (t_mean, t_var) = Self::window_stats(train, 0, y0, w, h);
            if t_var < self.min_variance {
                y0 += h;
                continue;
            }

            let y_lo = y0.saturating_sub(self.vertical_drift);
            let y_hi = (y0 + self.vertical_drift).min(qh.saturating_sub(h));

            let mut best: Option<(u32, u32, f32)> = None;
            for qy in y_lo..=y_hi {
                for qx in 0..=qw - w {
                    let c = Self::zncc(query, qx, qy, train, y0, w, h, t_mean, t_var);
                    if best.map(|(_, _, b)| c > b).unwrap_or(true) {
                        best = Some((qx, qy, c));
                    }
                }
            }

            if let Some((qx, qy, corr)) = best {
                if corr >= self.min_correlation {
                    matches.push(FeatureMatch {
                        query: KeyPoint {
                            x: qx as f32,
                            y: qy as f32,
                        },
                        train: KeyPoint {
                            x: 0.0,
                            y: y0 as f32,
                        },
                        score: 1.0 - corr,
                    });
                }
            }

            y0 += h;
        }

        Ok(matches)
    }
}
