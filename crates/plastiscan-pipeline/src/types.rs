//! Shared types for the plastiscan detection pipeline.

use std::fmt;

use geo::{Area, LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::classify::{AreaBounds, CategoryThresholds};
use crate::segment::{BandMask, SegmenterKind};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate masks without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can reference the
/// decoded source photograph without depending on `image` directly.
pub use image::RgbImage;

/// An integer pixel coordinate on a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column (pixels from left edge).
    pub x: u32,
    /// Row (pixels from top edge).
    pub y: u32,
}

impl PixelPoint {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// The closed outer boundary of one connected foreground region.
///
/// Points are ordered along the boundary; the last point connects
/// back to the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<PixelPoint>);

impl Contour {
    /// Create a contour from boundary points in traversal order.
    #[must_use]
    pub const fn new(points: Vec<PixelPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of boundary points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all boundary points.
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.0
    }

    /// Enclosed area in square pixels.
    ///
    /// Computed with the shoelace formula over the boundary polygon, so a
    /// single pixel or a one-pixel-wide line encloses zero area and an
    /// `n x n` filled square encloses `(n - 1)^2`.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.0.len() < 3 {
            return 0.0;
        }
        let ring: LineString<f64> = self
            .0
            .iter()
            .map(|p| (f64::from(p.x), f64::from(p.y)))
            .collect::<Vec<_>>()
            .into();
        Polygon::new(ring, vec![]).unsigned_area()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of any `image` buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// Particle density category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Fewer particles than the low threshold.
    Low,
    /// At least the low threshold but fewer than the high threshold.
    Medium,
    /// At least the high threshold.
    High,
}

impl Category {
    /// The category label as reported to users.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one pipeline run: how many particles and how dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Number of contours whose area fell strictly inside the bounds.
    pub count: usize,
    /// Density category derived from `count`.
    pub category: Category,
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Detected particles: {} \u{2192} Category: {}",
            self.count, self.category
        )
    }
}

/// Process-wide detection configuration.
///
/// Loaded once and read-only afterwards. Reconfiguring the segmenter
/// bands changes the detected emission spectrum without touching any
/// stage logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Which color segmentation strategy to use, with its bands.
    pub segmenter: SegmenterKind,

    /// Side length of the square Gaussian kernel used to smooth the
    /// combined mask. Must be a positive odd integer.
    pub blur_kernel_size: u32,

    /// Radius of the elliptical structuring element used for the
    /// morphological opening. Radius 1 is a 3x3 element.
    pub morph_radius: u32,
}

impl PipelineConfig {
    /// Default Gaussian kernel side length.
    pub const DEFAULT_BLUR_KERNEL_SIZE: u32 = 3;

    /// Default structuring element radius.
    pub const DEFAULT_MORPH_RADIUS: u32 = 1;

    /// Largest accepted structuring element radius.
    pub const MAX_MORPH_RADIUS: u32 = 64;

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the blur kernel size is
    /// zero or even, if the morphology radius exceeds
    /// [`Self::MAX_MORPH_RADIUS`], if the segmenter has no bands, or if a
    /// band name is not a plain file-name stem.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "blur_kernel_size must be a positive odd integer, got {}",
                self.blur_kernel_size
            )));
        }
        if self.morph_radius > Self::MAX_MORPH_RADIUS {
            return Err(PipelineError::InvalidConfig(format!(
                "morph_radius must be at most {}, got {}",
                Self::MAX_MORPH_RADIUS,
                self.morph_radius
            )));
        }
        if self.segmenter.band_count() == 0 {
            return Err(PipelineError::InvalidConfig(
                "segmenter must define at least one band".to_string(),
            ));
        }
        if let Some(name) = self
            .segmenter
            .band_names()
            .into_iter()
            .find(|name| !is_band_name(name))
        {
            return Err(PipelineError::InvalidConfig(format!(
                "band name {name:?} must be non-empty ASCII letters, digits, '_' or '-'"
            )));
        }
        Ok(())
    }
}

/// Whether `name` can label a band.
///
/// Band names end up in diagnostic file names, so only ASCII
/// alphanumerics, `_` and `-` are accepted.
#[must_use]
pub fn is_band_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterKind::default(),
            blur_kernel_size: Self::DEFAULT_BLUR_KERNEL_SIZE,
            morph_radius: Self::DEFAULT_MORPH_RADIUS,
        }
    }
}

/// Per-call filtering and classification parameters.
///
/// Values are accepted as given (negative numbers included) and
/// normalized by [`normalize`](Self::normalize) before any processing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Exclusive lower bound on contour area, in square pixels.
    pub min_area: f64,
    /// Exclusive upper bound on contour area, in square pixels.
    pub max_area: f64,
    /// Counts below this are `Low`.
    pub low_thresh: i64,
    /// Counts below this (and not `Low`) are `Medium`; the rest are `High`.
    pub high_thresh: i64,
}

impl AnalysisParams {
    /// Default exclusive minimum particle area.
    pub const DEFAULT_MIN_AREA: f64 = 10.0;
    /// Default exclusive maximum particle area.
    pub const DEFAULT_MAX_AREA: f64 = 5000.0;
    /// Default `Low`/`Medium` boundary.
    pub const DEFAULT_LOW_THRESH: i64 = 10;
    /// Default `Medium`/`High` boundary.
    pub const DEFAULT_HIGH_THRESH: i64 = 30;

    /// Validate and clamp into the bounds the classifier works with.
    ///
    /// The inverted-bounds check runs on the values as given, before
    /// clamping, so `min_area = 5, max_area = -3` is rejected rather than
    /// silently collapsing to `(5, 0)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if either area bound is
    /// not finite or if `min_area > max_area`.
    pub fn normalize(&self) -> Result<(AreaBounds, CategoryThresholds), PipelineError> {
        let areas = AreaBounds::new(self.min_area, self.max_area)?;
        let thresholds = CategoryThresholds::new(self.low_thresh, self.high_thresh);
        Ok((areas, thresholds))
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            min_area: Self::DEFAULT_MIN_AREA,
            max_area: Self::DEFAULT_MAX_AREA,
            low_thresh: Self::DEFAULT_LOW_THRESH,
            high_thresh: Self::DEFAULT_HIGH_THRESH,
        }
    }
}

/// Result of running the pipeline with every intermediate preserved.
///
/// Each field captures the output of one stage. This is the value handed
/// to a [`DiagnosticsSink`](crate::DiagnosticsSink); it does not derive
/// `PartialEq` since comparing pixel buffers is never what callers want.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: decoded source photograph.
    pub original: RgbImage,
    /// Stage 1a: one mask per configured band, in band order.
    pub bands: Vec<BandMask>,
    /// Stage 1b: union of all band masks.
    pub combined: GrayImage,
    /// Stage 2: Gaussian-smoothed combined mask.
    pub smoothed: GrayImage,
    /// Stage 3: Otsu-binarized mask.
    pub binary: GrayImage,
    /// Otsu level chosen for stage 3.
    pub otsu_level: u8,
    /// Stage 4: mask after morphological opening.
    pub cleaned: GrayImage,
    /// Stage 5: every outer contour found in the cleaned mask.
    pub contours: Vec<Contour>,
    /// Stage 6: contours that passed the area filter.
    pub retained: Vec<Contour>,
    /// Final count and category.
    pub result: DetectionResult,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration or analysis parameters are invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
