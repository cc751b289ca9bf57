//! plastiscan-pipeline: Pure microplastic detection pipeline (sans-IO).
//!
//! Counts fluorescing particles in a Nile-Red-stained sample photograph
//! and places the count in a density category through:
//! decode -> color segmentation -> Gaussian smoothing -> Otsu
//! binarization -> morphological opening -> contour tracing -> area
//! filter and categorization.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Filesystem, camera and
//! light interaction lives in `plastiscan-io`.

pub mod blur;
pub mod classify;
pub mod contour;
pub mod decode;
pub mod diagnostics;
pub mod hsv;
pub mod morphology;
pub mod overlay;
pub mod pipeline;
pub mod segment;
pub mod threshold;
pub mod types;

pub use classify::{AreaBounds, CategoryThresholds};
pub use pipeline::Pipeline;
pub use segment::{BandMask, Channel, ChannelBand, ColorBand, ColorSegmenter, SegmenterKind};
pub use types::{
    AnalysisParams, Category, Contour, DetectionResult, Dimensions, PipelineConfig,
    PipelineError, PixelPoint, StagedResult, is_band_name,
};

/// Error type returned by a [`DiagnosticsSink`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Receiver for the intermediate images of a pipeline run.
///
/// A sink observes a finished run; it cannot influence the detection
/// result. Failures are reported back so the caller can log them.
pub trait DiagnosticsSink {
    /// Present every intermediate of one run.
    ///
    /// # Errors
    ///
    /// Implementation-defined, e.g. failing to write a panel to disk.
    fn show(&mut self, staged: &StagedResult) -> Result<(), SinkError>;
}

/// Run the full detection pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP), a pipeline
/// configuration and analysis parameters, then produces the particle
/// count and its density category.
///
/// # Pipeline steps
///
/// 1. Validate configuration and parameters
/// 2. Decode image to RGB
/// 3. Color segmentation into per-band masks and their union
/// 4. Gaussian smoothing of the union
/// 5. Otsu binarization
/// 6. Morphological opening
/// 7. Outer contour tracing
/// 8. Strict area filter, count and categorize
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if the configuration or
/// parameters are invalid, before the bytes are inspected.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(
    image_bytes: &[u8],
    config: &PipelineConfig,
    params: &AnalysisParams,
) -> Result<DetectionResult, PipelineError> {
    process_staged(image_bytes, config, params).map(|staged| staged.result)
}

/// Run the full pipeline and keep every intermediate.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_staged(
    image_bytes: &[u8],
    config: &PipelineConfig,
    params: &AnalysisParams,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(image_bytes.to_vec(), config.clone(), params)?
        .decode()?
        .segment()
        .smooth()
        .binarize()
        .clean()
        .trace_contours()
        .classify()
        .into_result())
}

/// Run the full pipeline and hand the intermediates to `sink`.
///
/// A sink failure is logged and otherwise ignored: the returned result
/// is identical to [`process`].
///
/// # Errors
///
/// Same as [`process`].
pub fn process_with_sink(
    image_bytes: &[u8],
    config: &PipelineConfig,
    params: &AnalysisParams,
    sink: &mut dyn DiagnosticsSink,
) -> Result<DetectionResult, PipelineError> {
    let staged = process_staged(image_bytes, config, params)?;
    if let Err(e) = sink.show(&staged) {
        tracing::warn!(error = %e, "diagnostics sink failed");
    }
    Ok(staged.result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::decode::tests::encode_png;
    use crate::types::RgbImage;

    const PARTICLE: image::Rgb<u8> = image::Rgb([240, 90, 20]);
    const DARK: image::Rgb<u8> = image::Rgb([12, 10, 14]);

    /// Dark field with filled squares of side `side` at the given origins.
    fn field_png(width: u32, height: u32, squares: &[(u32, u32)], side: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let hit = squares
                .iter()
                .any(|&(sx, sy)| (sx..sx + side).contains(&x) && (sy..sy + side).contains(&y));
            if hit { PARTICLE } else { DARK }
        });
        encode_png(&img)
    }

    /// `n` squares of side 8 on a 20-pixel grid, 10 per row.
    fn grid_png(n: u32) -> Vec<u8> {
        let squares: Vec<(u32, u32)> = (0..n).map(|i| ((i % 10) * 20 + 6, (i / 10) * 20 + 6)).collect();
        let rows = n.div_ceil(10).max(1);
        field_png(200, rows * 20, &squares, 8)
    }

    fn defaults() -> (PipelineConfig, AnalysisParams) {
        (PipelineConfig::default(), AnalysisParams::default())
    }

    #[test]
    fn process_empty_input() {
        let (config, params) = defaults();
        let result = process(&[], &config, &params);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let (config, params) = defaults();
        let result = process(&[0xDE, 0xAD, 0xBE, 0xEF], &config, &params);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn dark_image_has_zero_particles() {
        let (config, params) = defaults();
        let result = process(&field_png(50, 50, &[], 0), &config, &params).unwrap();
        assert_eq!(result.count, 0);
        assert_eq!(result.category, Category::Low);
    }

    #[test]
    fn counts_and_categorizes() {
        let (config, params) = defaults();
        assert_eq!(
            process(&grid_png(3), &config, &params).unwrap(),
            DetectionResult {
                count: 3,
                category: Category::Low
            }
        );
        assert_eq!(
            process(&grid_png(12), &config, &params).unwrap(),
            DetectionResult {
                count: 12,
                category: Category::Medium
            }
        );
        assert_eq!(
            process(&grid_png(30), &config, &params).unwrap(),
            DetectionResult {
                count: 30,
                category: Category::High
            }
        );
    }

    #[test]
    fn specks_are_removed_by_opening() {
        let (config, params) = defaults();
        // One real particle plus two single-pixel specks.
        let mut img = RgbImage::from_pixel(60, 30, DARK);
        for y in 10..20 {
            for x in 10..20 {
                img.put_pixel(x, y, PARTICLE);
            }
        }
        img.put_pixel(40, 5, PARTICLE);
        img.put_pixel(50, 25, PARTICLE);
        let result = process(&encode_png(&img), &config, &params).unwrap();
        assert_eq!(result.count, 1);
    }

    #[test]
    fn particle_on_left_edge_is_counted_with_interior_particle() {
        let (config, params) = defaults();
        let png = field_png(60, 30, &[(0, 10), (30, 10)], 10);
        assert_eq!(process(&png, &config, &params).unwrap().count, 2);
    }

    #[test]
    fn particles_on_every_edge_are_counted() {
        let (config, params) = defaults();
        // Left, top, right and bottom edges, plus one in the middle.
        let squares = [(0, 15), (25, 0), (50, 15), (25, 30), (25, 15)];
        let staged = process_staged(&field_png(60, 40, &squares, 10), &config, &params).unwrap();
        assert_eq!(staged.result.count, 5);
        assert!(
            staged
                .retained
                .iter()
                .all(|c| c.points().iter().all(|p| p.x < 60 && p.y < 40))
        );
    }

    #[test]
    fn each_edge_alone_is_counted() {
        let (config, params) = defaults();
        for origin in [(0, 10), (20, 0), (40, 10), (20, 20)] {
            let png = field_png(50, 30, &[origin], 10);
            assert_eq!(
                process(&png, &config, &params).unwrap().count,
                1,
                "particle at {origin:?}"
            );
        }
    }

    #[test]
    fn all_foreground_frame_is_one_region() {
        let (config, params) = defaults();
        let png = field_png(40, 30, &[(0, 0)], 40);
        let staged = process_staged(&png, &config, &params).unwrap();
        assert_eq!(staged.contours.len(), 1);
        assert!((staged.contours[0].area() - 39.0 * 29.0).abs() < 1e-9);
        assert_eq!(staged.result.count, 1);
    }

    #[test]
    fn deterministic() {
        let (config, params) = defaults();
        let png = grid_png(7);
        let a = process_staged(&png, &config, &params).unwrap();
        let b = process_staged(&png, &config, &params).unwrap();
        assert_eq!(a.result, b.result);
        assert_eq!(a.contours, b.contours);
        assert_eq!(a.cleaned, b.cleaned);
    }

    #[test]
    fn negative_min_area_matches_zero() {
        let config = PipelineConfig::default();
        let png = grid_png(4);
        let neg = AnalysisParams {
            min_area: -10.0,
            ..AnalysisParams::default()
        };
        let zero = AnalysisParams {
            min_area: 0.0,
            ..AnalysisParams::default()
        };
        assert_eq!(
            process(&png, &config, &neg).unwrap(),
            process(&png, &config, &zero).unwrap()
        );
    }

    #[test]
    fn zero_thresholds_give_high() {
        let config = PipelineConfig::default();
        let params = AnalysisParams {
            low_thresh: 0,
            high_thresh: 0,
            ..AnalysisParams::default()
        };
        let result = process(&grid_png(1), &config, &params).unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.category, Category::High);
    }

    #[test]
    fn equal_thresholds_at_count_give_high() {
        let config = PipelineConfig::default();
        let params = AnalysisParams {
            low_thresh: 5,
            high_thresh: 5,
            ..AnalysisParams::default()
        };
        assert_eq!(
            process(&grid_png(5), &config, &params).unwrap().category,
            Category::High
        );
        assert_eq!(
            process(&grid_png(4), &config, &params).unwrap().category,
            Category::Low
        );
    }

    #[test]
    fn inverted_bounds_rejected_before_decode() {
        let config = PipelineConfig::default();
        let params = AnalysisParams {
            min_area: 1000.0,
            max_area: 10.0,
            ..AnalysisParams::default()
        };
        // Empty input would be EmptyInput if decoding were attempted.
        assert!(matches!(
            process(&[], &config, &params),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn area_bounds_exclude_particles() {
        let config = PipelineConfig::default();
        let png = grid_png(6);
        let staged = process_staged(&png, &config, &AnalysisParams::default()).unwrap();
        let area = staged.retained[0].area();
        // Upper bound equal to the measured area excludes it.
        let params = AnalysisParams {
            max_area: area,
            ..AnalysisParams::default()
        };
        assert_eq!(process(&png, &config, &params).unwrap().count, 0);
        // Lower bound equal to the measured area excludes it as well.
        let params = AnalysisParams {
            min_area: area,
            max_area: area + 1.0,
            ..AnalysisParams::default()
        };
        assert_eq!(process(&png, &config, &params).unwrap().count, 0);
    }

    #[test]
    fn rgb_channel_segmenter_counts_particles() {
        let config = PipelineConfig {
            segmenter: SegmenterKind::RgbChannels(ChannelBand::red_green().to_vec()),
            ..PipelineConfig::default()
        };
        let result = process(&grid_png(4), &config, &AnalysisParams::default()).unwrap();
        assert_eq!(result.count, 4);
    }

    #[test]
    fn staged_result_dimensions_match_source() {
        let (config, params) = defaults();
        let staged = process_staged(&grid_png(2), &config, &params).unwrap();
        assert_eq!(staged.dimensions, Dimensions::of(&staged.original));
        assert_eq!(staged.bands.len(), 4);
        for band in &staged.bands {
            assert_eq!(band.mask.dimensions(), staged.original.dimensions());
        }
    }

    struct RecordingSink {
        seen: Option<DetectionResult>,
    }

    impl DiagnosticsSink for RecordingSink {
        fn show(&mut self, staged: &StagedResult) -> Result<(), SinkError> {
            self.seen = Some(staged.result);
            Ok(())
        }
    }

    struct FailingSink;

    impl DiagnosticsSink for FailingSink {
        fn show(&mut self, _staged: &StagedResult) -> Result<(), SinkError> {
            Err("display unavailable".into())
        }
    }

    #[test]
    fn sink_sees_the_same_result() {
        let (config, params) = defaults();
        let png = grid_png(3);
        let mut sink = RecordingSink { seen: None };
        let result = process_with_sink(&png, &config, &params, &mut sink).unwrap();
        assert_eq!(sink.seen, Some(result));
        assert_eq!(result, process(&png, &config, &params).unwrap());
    }

    #[test]
    fn failing_sink_does_not_change_result() {
        let (config, params) = defaults();
        let png = grid_png(3);
        let result = process_with_sink(&png, &config, &params, &mut FailingSink).unwrap();
        assert_eq!(result, process(&png, &config, &params).unwrap());
    }
}
