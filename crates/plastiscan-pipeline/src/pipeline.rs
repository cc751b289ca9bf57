//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process_staged`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use plastiscan_pipeline::{AnalysisParams, Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let staged = Pipeline::new(png, PipelineConfig::default(), &AnalysisParams::default())?
//!     .decode()?
//!     .segment()
//!     .smooth()
//!     .binarize()
//!     .clean()
//!     .trace_contours()
//!     .classify()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates. No stage writes into a
//! mask it received; every stage allocates its own output.
//!
//! Configuration and analysis parameters are validated by
//! [`Pipeline::new`], before the source bytes are touched.

use crate::classify::{AreaBounds, CategoryThresholds};
use crate::morphology::StructuringElement;
use crate::segment::{BandMask, ColorSegmenter};
use crate::types::{
    AnalysisParams, Contour, DetectionResult, Dimensions, GrayImage, PipelineConfig,
    PipelineError, RgbImage, StagedResult,
};

/// Validated settings carried through every stage.
#[derive(Debug, Clone)]
struct Settings {
    config: PipelineConfig,
    bounds: AreaBounds,
    thresholds: CategoryThresholds,
}

impl Settings {
    fn new(config: PipelineConfig, params: &AnalysisParams) -> Result<Self, PipelineError> {
        config.validate()?;
        let (bounds, thresholds) = params.normalize()?;
        Ok(Self {
            config,
            bounds,
            thresholds,
        })
    }
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Validate settings and hold the source bytes for decoding.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration or
    /// analysis parameters are invalid. Nothing is decoded in that case.
    pub fn new(
        source: Vec<u8>,
        config: PipelineConfig,
        params: &AnalysisParams,
    ) -> Result<Pending, PipelineError> {
        Ok(Pending {
            settings: Settings::new(config, params)?,
            source,
        })
    }

    /// Start from an already-decoded photograph.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration or
    /// analysis parameters are invalid.
    pub fn from_image(
        original: RgbImage,
        config: PipelineConfig,
        params: &AnalysisParams,
    ) -> Result<Decoded, PipelineError> {
        Ok(Decoded {
            settings: Settings::new(config, params)?,
            original,
        })
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    settings: Settings,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Decode the source image and advance to the [`Decoded`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if the source bytes are
    /// empty. Returns [`PipelineError::ImageDecode`] if the image
    /// format is unrecognized or the data is corrupt.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let original = crate::decode::decode_rgb(&self.source)?;
        tracing::debug!(
            bytes = self.source.len(),
            width = original.width(),
            height = original.height(),
            "decoded source image"
        );
        Ok(Decoded {
            settings: self.settings,
            original,
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state after decoding the source photograph.
#[must_use = "pipeline stages are consumed by advancing; call .segment() to continue"]
pub struct Decoded {
    settings: Settings,
    original: RgbImage,
}

impl Decoded {
    /// The decoded RGB photograph.
    #[must_use]
    pub const fn original(&self) -> &RgbImage {
        &self.original
    }

    /// Run the configured color segmenter.
    pub fn segment(self) -> Segmented {
        let segmentation = self.settings.config.segmenter.segment(&self.original);
        tracing::debug!(
            bands = segmentation.bands.len(),
            on_pixels = crate::segment::count_on(&segmentation.combined),
            "segmented color bands"
        );
        Segmented {
            settings: self.settings,
            original: self.original,
            bands: segmentation.bands,
            combined: segmentation.combined,
        }
    }
}

// ───────────────────────── Stage 2: Segmented ────────────────────────

/// Pipeline state after color segmentation.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct Segmented {
    settings: Settings,
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
}

impl Segmented {
    /// Per-band masks in configured order.
    #[must_use]
    pub fn bands(&self) -> &[BandMask] {
        &self.bands
    }

    /// Union of all band masks.
    #[must_use]
    pub const fn combined(&self) -> &GrayImage {
        &self.combined
    }

    /// Gaussian-smooth the combined mask.
    pub fn smooth(self) -> Smoothed {
        let smoothed =
            crate::blur::smooth_mask(&self.combined, self.settings.config.blur_kernel_size);
        Smoothed {
            settings: self.settings,
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed,
        }
    }
}

// ───────────────────────── Stage 3: Smoothed ─────────────────────────

/// Pipeline state after noise suppression.
#[must_use = "pipeline stages are consumed by advancing; call .binarize() to continue"]
pub struct Smoothed {
    settings: Settings,
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
    smoothed: GrayImage,
}

impl Smoothed {
    /// The smoothed combined mask.
    #[must_use]
    pub const fn smoothed(&self) -> &GrayImage {
        &self.smoothed
    }

    /// Binarize with Otsu's method.
    pub fn binarize(self) -> Binarized {
        let (binary, otsu_level) = crate::threshold::otsu_binarize(&self.smoothed);
        tracing::debug!(otsu_level, "binarized smoothed mask");
        Binarized {
            settings: self.settings,
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed: self.smoothed,
            binary,
            otsu_level,
        }
    }
}

// ───────────────────────── Stage 4: Binarized ────────────────────────

/// Pipeline state after Otsu binarization.
#[must_use = "pipeline stages are consumed by advancing; call .clean() to continue"]
pub struct Binarized {
    settings: Settings,
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
    smoothed: GrayImage,
    binary: GrayImage,
    otsu_level: u8,
}

impl Binarized {
    /// The binary mask.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// The Otsu level that produced the binary mask.
    #[must_use]
    pub const fn otsu_level(&self) -> u8 {
        self.otsu_level
    }

    /// Remove small specks with a morphological opening.
    pub fn clean(self) -> Cleaned {
        let element = StructuringElement::ellipse(self.settings.config.morph_radius);
        let cleaned = crate::morphology::open(&self.binary, &element);
        Cleaned {
            settings: self.settings,
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed: self.smoothed,
            binary: self.binary,
            otsu_level: self.otsu_level,
            cleaned,
        }
    }
}

// ───────────────────────── Stage 5: Cleaned ──────────────────────────

/// Pipeline state after morphological cleanup.
#[must_use = "pipeline stages are consumed by advancing; call .trace_contours() to continue"]
pub struct Cleaned {
    settings: Settings,
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
    smoothed: GrayImage,
    binary: GrayImage,
    otsu_level: u8,
    cleaned: GrayImage,
}

impl Cleaned {
    /// The opened mask.
    #[must_use]
    pub const fn cleaned(&self) -> &GrayImage {
        &self.cleaned
    }

    /// Extract outer contours of the cleaned mask.
    pub fn trace_contours(self) -> Traced {
        let contours = crate::contour::outer_contours(&self.cleaned);
        tracing::debug!(contours = contours.len(), "traced outer contours");
        Traced {
            settings: self.settings,
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed: self.smoothed,
            binary: self.binary,
            otsu_level: self.otsu_level,
            cleaned: self.cleaned,
            contours,
        }
    }
}

// ───────────────────────── Stage 6: Traced ───────────────────────────

/// Pipeline state after contour extraction.
#[must_use = "pipeline stages are consumed by advancing; call .classify() to continue"]
pub struct Traced {
    settings: Settings,
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
    smoothed: GrayImage,
    binary: GrayImage,
    otsu_level: u8,
    cleaned: GrayImage,
    contours: Vec<Contour>,
}

impl Traced {
    /// Every outer contour, before area filtering.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Filter by area, count and categorize.
    pub fn classify(self) -> Classified {
        let (retained, result) = crate::classify::classify(
            &self.contours,
            &self.settings.bounds,
            &self.settings.thresholds,
        );
        tracing::info!(
            contours = self.contours.len(),
            count = result.count,
            category = %result.category,
            "classified particles"
        );
        Classified {
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed: self.smoothed,
            binary: self.binary,
            otsu_level: self.otsu_level,
            cleaned: self.cleaned,
            contours: self.contours,
            retained,
            result,
        }
    }
}

// ───────────────────────── Stage 7: Classified ───────────────────────

/// Final pipeline state.
#[must_use = "call .into_result() to obtain the staged result"]
pub struct Classified {
    original: RgbImage,
    bands: Vec<BandMask>,
    combined: GrayImage,
    smoothed: GrayImage,
    binary: GrayImage,
    otsu_level: u8,
    cleaned: GrayImage,
    contours: Vec<Contour>,
    retained: Vec<Contour>,
    result: DetectionResult,
}

impl Classified {
    /// The count and category.
    #[must_use]
    pub const fn result(&self) -> DetectionResult {
        self.result
    }

    /// Contours that passed the area filter.
    #[must_use]
    pub fn retained(&self) -> &[Contour] {
        &self.retained
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.original);
        StagedResult {
            original: self.original,
            bands: self.bands,
            combined: self.combined,
            smoothed: self.smoothed,
            binary: self.binary,
            otsu_level: self.otsu_level,
            cleaned: self.cleaned,
            contours: self.contours,
            retained: self.retained,
            result: self.result,
            dimensions,
        }
    }
}
