//! Pipeline diagnostics: timing, pixel counts, and other metrics for
//! each stage.
//!
//! These diagnostics are intended for tuning color bands and area
//! bounds against real photographs. [`process_staged_with_diagnostics`]
//! runs the full pipeline and collects them alongside the staged
//! results.
//!
//! Time is read through the [`Clock`] trait so the pipeline crate stays
//! free of any particular time source; callers on a native target pass
//! a clock backed by [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::types::{AnalysisParams, Category, Contour, PipelineConfig, PipelineError, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Monotonic time source used to measure stage durations.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: color segmentation.
    pub segment: StageDiagnostics,
    /// Stage 2: Gaussian smoothing.
    pub smooth: StageDiagnostics,
    /// Stage 3: Otsu binarization.
    pub binarize: StageDiagnostics,
    /// Stage 4: morphological opening.
    pub clean: StageDiagnostics,
    /// Stage 5: contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 6: area filter and categorization.
    pub classify: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Pixel coverage of one color band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCoverage {
    /// Band name.
    pub name: String,
    /// Pixels inside the band.
    pub on_pixels: u64,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Color segmentation metrics.
    Segment {
        /// Per-band coverage in configured order.
        bands: Vec<BandCoverage>,
        /// Pixels set in the combined mask.
        combined_on_pixels: u64,
        /// Total pixel count for computing coverage.
        total_pixel_count: u64,
    },
    /// Gaussian smoothing metrics.
    Smooth {
        /// Kernel side length.
        kernel_size: u32,
        /// Sigma derived from the kernel size.
        sigma: f32,
    },
    /// Otsu binarization metrics.
    Binarize {
        /// Level chosen by Otsu's method.
        otsu_level: u8,
        /// Foreground pixels in the binary mask.
        foreground_pixels: u64,
    },
    /// Morphological opening metrics.
    Clean {
        /// Structuring element radius.
        radius: u32,
        /// Pixels in the structuring element.
        element_size: usize,
        /// Foreground pixels before opening.
        foreground_before: u64,
        /// Foreground pixels after opening.
        foreground_after: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of outer contours found.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Smallest contour area.
        min_area: f64,
        /// Largest contour area.
        max_area: f64,
        /// Mean contour area.
        mean_area: f64,
    },
    /// Classification metrics.
    Classify {
        /// Exclusive lower area bound after clamping.
        min_area: f64,
        /// Exclusive upper area bound after clamping.
        max_area: f64,
        /// Lower count threshold after clamping.
        low_thresh: u64,
        /// Upper count threshold after clamping.
        high_thresh: u64,
        /// Contours inside the area bounds.
        retained: usize,
        /// Contours at or below the lower bound.
        rejected_small: usize,
        /// Contours at or above the upper bound.
        rejected_large: usize,
        /// Resulting density category.
        category: Category,
    },
}

/// High-level summary for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of outer contours found.
    pub contour_count: usize,
    /// Number of particles counted.
    pub particle_count: usize,
    /// Density category.
    pub category: Category,
}

impl PipelineDiagnostics {
    /// Stages in pipeline order, paired with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Decode", &self.decode),
            ("Segment", &self.segment),
            ("Smooth", &self.smooth),
            ("Binarize", &self.binarize),
            ("Clean", &self.clean),
            ("Contour Tracing", &self.contour_tracing),
            ("Classify", &self.classify),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Particles: {}  |  Category: {}",
            self.summary.contour_count, self.summary.particle_count, self.summary.category,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Segment {
            bands,
            combined_on_pixels,
            total_pixel_count,
        } => {
            let per_band: Vec<String> = bands
                .iter()
                .map(|b| format!("{}={}", b.name, b.on_pixels))
                .collect();
            format!(
                "{} on={combined_on_pixels} ({:.1}%)",
                per_band.join(" "),
                percent(*combined_on_pixels, *total_pixel_count),
            )
        }
        StageMetrics::Smooth { kernel_size, sigma } => {
            format!("k={kernel_size} sigma={sigma:.2}")
        }
        StageMetrics::Binarize {
            otsu_level,
            foreground_pixels,
        } => format!("level={otsu_level} fg={foreground_pixels}"),
        StageMetrics::Clean {
            radius,
            element_size,
            foreground_before,
            foreground_after,
        } => format!(
            "r={radius} ({element_size} px) fg={foreground_before}->{foreground_after}"
        ),
        StageMetrics::ContourTracing {
            contour_count,
            total_point_count,
            min_area,
            max_area,
            mean_area,
        } => format!(
            "{contour_count} contours, {total_point_count} pts (area min={min_area:.1} max={max_area:.1} mean={mean_area:.1})",
        ),
        StageMetrics::Classify {
            min_area,
            max_area,
            low_thresh,
            high_thresh,
            retained,
            rejected_small,
            rejected_large,
            category,
        } => format!(
            "area ({min_area}, {max_area}) kept={retained} small={rejected_small} large={rejected_large} thresholds={low_thresh}/{high_thresh} -> {category}",
        ),
    }
}

/// Area statistics for a set of contours.
struct AreaStats {
    points: usize,
    min: f64,
    max: f64,
    mean: f64,
}

fn area_stats(contours: &[Contour]) -> AreaStats {
    let areas: Vec<f64> = contours.iter().map(Contour::area).collect();
    let points = contours.iter().map(Contour::len).sum();
    if areas.is_empty() {
        return AreaStats {
            points,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = areas.iter().sum::<f64>() / areas.len() as f64;
    AreaStats {
        points,
        min: areas.iter().copied().fold(f64::INFINITY, f64::min),
        max: areas.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean,
    }
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// Produces the same [`StagedResult`] as [`crate::process_staged`].
///
/// # Errors
///
/// Same as [`crate::process_staged`]: invalid settings are reported
/// before decoding is attempted.
pub fn process_staged_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    params: &AnalysisParams,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone(), params)?;
    let (bounds, thresholds) = params.normalize()?;

    // Stage 0: decode
    let start = clock.now();
    let decoded = pending.decode()?;
    let (width, height) = decoded.original().dimensions();
    let pixel_count = u64::from(width) * u64::from(height);
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width,
            height,
            pixel_count,
        },
    };

    // Stage 1: segment
    let start = clock.now();
    let segmented = decoded.segment();
    let segment = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Segment {
            bands: segmented
                .bands()
                .iter()
                .map(|b| BandCoverage {
                    name: b.name.clone(),
                    on_pixels: crate::segment::count_on(&b.mask),
                })
                .collect(),
            combined_on_pixels: crate::segment::count_on(segmented.combined()),
            total_pixel_count: pixel_count,
        },
    };

    // Stage 2: smooth
    let start = clock.now();
    let smoothed = segmented.smooth();
    let smooth = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Smooth {
            kernel_size: config.blur_kernel_size,
            sigma: crate::blur::sigma_for_kernel(config.blur_kernel_size),
        },
    };

    // Stage 3: binarize
    let start = clock.now();
    let binarized = smoothed.binarize();
    let foreground_before = crate::segment::count_on(binarized.binary());
    let binarize = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Binarize {
            otsu_level: binarized.otsu_level(),
            foreground_pixels: foreground_before,
        },
    };

    // Stage 4: clean
    let start = clock.now();
    let cleaned = binarized.clean();
    let element = crate::morphology::StructuringElement::ellipse(config.morph_radius);
    let clean = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Clean {
            radius: config.morph_radius,
            element_size: element.offsets().len(),
            foreground_before,
            foreground_after: crate::segment::count_on(cleaned.cleaned()),
        },
    };

    // Stage 5: contour tracing
    let start = clock.now();
    let traced = cleaned.trace_contours();
    let duration = clock.elapsed(&start);
    let stats = area_stats(traced.contours());
    let rejected_small = traced
        .contours()
        .iter()
        .filter(|c| c.area() <= bounds.min())
        .count();
    let rejected_large = traced
        .contours()
        .iter()
        .filter(|c| c.area() > bounds.min() && c.area() >= bounds.max())
        .count();
    let contour_tracing = StageDiagnostics {
        duration,
        metrics: StageMetrics::ContourTracing {
            contour_count: traced.contours().len(),
            total_point_count: stats.points,
            min_area: stats.min,
            max_area: stats.max,
            mean_area: stats.mean,
        },
    };

    // Stage 6: classify
    let start = clock.now();
    let classified = traced.classify();
    let result = classified.result();
    let classify = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Classify {
            min_area: bounds.min(),
            max_area: bounds.max(),
            low_thresh: thresholds.low(),
            high_thresh: thresholds.high(),
            retained: result.count,
            rejected_small,
            rejected_large,
            category: result.category,
        },
    };

    let staged = classified.into_result();
    let summary = PipelineSummary {
        image_width: width,
        image_height: height,
        pixel_count,
        contour_count: staged.contours.len(),
        particle_count: result.count,
        category: result.category,
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        segment,
        smooth,
        binarize,
        clean,
        contour_tracing,
        classify,
        total_duration: clock.elapsed(&total_start),
        summary,
    };

    Ok((staged, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::decode::tests::encode_png;
    use crate::types::RgbImage;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn two_particles() -> Vec<u8> {
        let img = RgbImage::from_fn(40, 20, |x, y| {
            let inside = (4..14).contains(&y) && ((4..14).contains(&x) || (24..34).contains(&x));
            if inside {
                image::Rgb([220, 30, 20])
            } else {
                image::Rgb([10, 10, 10])
            }
        });
        encode_png(&img)
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn area_stats_empty() {
        let stats = area_stats(&[]);
        assert_eq!(stats.points, 0);
        assert!(stats.mean.abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostics_agree_with_staged_result() {
        let clock = TickClock(Cell::new(0));
        let (staged, diag) = process_staged_with_diagnostics(
            &two_particles(),
            &PipelineConfig::default(),
            &AnalysisParams::default(),
            &clock,
        )
        .unwrap();

        assert_eq!(diag.summary.particle_count, staged.result.count);
        assert_eq!(diag.summary.particle_count, 2);
        assert_eq!(diag.summary.contour_count, staged.contours.len());
        assert_eq!((diag.summary.image_width, diag.summary.image_height), (40, 20));

        match &diag.segment.metrics {
            StageMetrics::Segment { bands, .. } => {
                assert_eq!(bands.len(), 4);
                let red = bands.iter().find(|b| b.name == "red").unwrap();
                assert_eq!(red.on_pixels, 200);
            }
            other => panic!("unexpected metrics: {other:?}"),
        }
        match &diag.binarize.metrics {
            StageMetrics::Binarize { otsu_level, .. } => {
                assert_eq!(*otsu_level, staged.otsu_level);
            }
            other => panic!("unexpected metrics: {other:?}"),
        }
    }

    #[test]
    fn stage_durations_fit_within_total() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(
            &two_particles(),
            &PipelineConfig::default(),
            &AnalysisParams::default(),
            &clock,
        )
        .unwrap();
        let sum: Duration = diag.stages().iter().map(|(_, s)| s.duration).sum();
        assert!(sum <= diag.total_duration);
        assert!(diag.decode.duration > Duration::ZERO);
    }

    #[test]
    fn invalid_params_error_before_decode() {
        let clock = TickClock(Cell::new(0));
        let params = AnalysisParams {
            min_area: 100.0,
            max_area: 1.0,
            ..AnalysisParams::default()
        };
        let result =
            process_staged_with_diagnostics(&[], &PipelineConfig::default(), &params, &clock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn report_names_every_stage() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(
            &two_particles(),
            &PipelineConfig::default(),
            &AnalysisParams::default(),
            &clock,
        )
        .unwrap();
        let report = diag.report();
        for (name, _) in diag.stages() {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("Particles: 2"));
    }

    #[test]
    fn diagnostics_round_trip_through_json() {
        let clock = TickClock(Cell::new(0));
        let (_, diag) = process_staged_with_diagnostics(
            &two_particles(),
            &PipelineConfig::default(),
            &AnalysisParams::default(),
            &clock,
        )
        .unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.particle_count, diag.summary.particle_count);
        assert_eq!(back.total_duration, diag.total_duration);
    }
}
