//! End-to-end analysis of image files written to a temporary directory.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use image::{ImageEncoder, Rgb, RgbImage};
use plastiscan_io::{
    AnalyzeError, DirectorySink, StdClock, analyze, analyze_with_config,
    analyze_with_diagnostics, analyze_with_report,
};
use plastiscan_pipeline::{
    AnalysisParams, Category, ChannelBand, DiagnosticsSink, PipelineConfig, PipelineError,
    SegmenterKind, StagedResult,
};

const PARTICLE: Rgb<u8> = Rgb([235, 40, 15]);
const BACKGROUND: Rgb<u8> = Rgb([8, 8, 12]);

/// Dark sample with `n` 16x16 particles on a 40-pixel grid.
fn sample(n: u32) -> RgbImage {
    let cols = 5;
    let rows = n.div_ceil(cols).max(1);
    RgbImage::from_fn(cols * 40, rows * 40, |x, y| {
        let idx = (y / 40) * cols + x / 40;
        let (lx, ly) = (x % 40, y % 40);
        if idx < n && (12..28).contains(&lx) && (12..28).contains(&ly) {
            PARTICLE
        } else {
            BACKGROUND
        }
    })
}

fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png).unwrap();
    path
}

fn write_jpeg(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 95);
    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    path
}

#[test]
fn analyzes_png_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(4));
    let result = analyze(&path, &AnalysisParams::default()).unwrap();
    assert_eq!(result.count, 4);
    assert_eq!(result.category, Category::Low);
}

#[test]
fn analyzes_jpeg_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_jpeg(dir.path(), "sample.jpg", &sample(3));
    let result = analyze(&path, &AnalysisParams::default()).unwrap();
    assert_eq!(result.count, 3);
}

#[test]
fn repeated_analysis_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(7));
    let params = AnalysisParams::default();
    assert_eq!(
        analyze(&path, &params).unwrap(),
        analyze(&path, &params).unwrap()
    );
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.jpg");
    assert!(matches!(
        analyze(&path, &AnalysisParams::default()),
        Err(AnalyzeError::NotFound(_))
    ));
}

#[test]
fn inverted_bounds_fail_even_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let params = AnalysisParams {
        min_area: 500.0,
        max_area: 50.0,
        ..AnalysisParams::default()
    };
    let result = analyze(&dir.path().join("absent.jpg"), &params);
    assert!(matches!(
        result,
        Err(AnalyzeError::Pipeline(PipelineError::InvalidConfig(_)))
    ));
}

#[test]
fn corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"definitely not an image").unwrap();
    assert!(matches!(
        analyze(&path, &AnalysisParams::default()),
        Err(AnalyzeError::Pipeline(PipelineError::ImageDecode(_)))
    ));
}

#[test]
fn empty_file_is_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.png");
    std::fs::write(&path, b"").unwrap();
    assert!(matches!(
        analyze(&path, &AnalysisParams::default()),
        Err(AnalyzeError::Pipeline(PipelineError::EmptyInput))
    ));
}

#[test]
fn directory_sink_writes_every_panel() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(2));
    let panels = dir.path().join("panels");
    let mut sink = DirectorySink::new(&panels);

    let with_sink = analyze_with_diagnostics(
        &path,
        &AnalysisParams::default(),
        &PipelineConfig::default(),
        &mut sink,
    )
    .unwrap();
    assert_eq!(with_sink, analyze(&path, &AnalysisParams::default()).unwrap());

    for name in [
        "original.png",
        "band-deep_red.png",
        "band-red.png",
        "band-orange.png",
        "band-yellow.png",
        "combined.png",
        "smoothed.png",
        "binary.png",
        "cleaned.png",
        "contours.png",
    ] {
        assert!(panels.join(name).is_file(), "missing {name}");
    }

    let overlay = image::open(panels.join("contours.png")).unwrap().to_rgb8();
    assert_eq!(overlay.dimensions(), (200, 40));
    assert!(overlay.pixels().any(|p| *p == Rgb([0, 255, 0])));
}

#[test]
fn unwritable_sink_does_not_change_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(2));
    // A regular file where the panel directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"").unwrap();
    let mut sink = DirectorySink::new(&blocker);

    let result = analyze_with_diagnostics(
        &path,
        &AnalysisParams::default(),
        &PipelineConfig::default(),
        &mut sink,
    )
    .unwrap();
    assert_eq!(result.count, 2);
}

#[test]
fn write_panels_reports_band_files() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = {
        let path = write_png(dir.path(), "sample.png", &sample(1));
        std::fs::read(path).unwrap()
    };
    let staged: StagedResult = plastiscan_pipeline::process_staged(
        &bytes,
        &PipelineConfig::default(),
        &AnalysisParams::default(),
    )
    .unwrap();
    let written = DirectorySink::new(dir.path().join("out"))
        .write_panels(&staged)
        .unwrap();
    assert_eq!(written.len(), staged.bands.len() + 6);
    assert!(written.last().unwrap().ends_with("contours.png"));
}

#[test]
fn unsafe_band_name_stays_inside_panel_directory() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = {
        let path = write_png(dir.path(), "sample.png", &sample(1));
        std::fs::read(path).unwrap()
    };
    let mut staged = plastiscan_pipeline::process_staged(
        &bytes,
        &PipelineConfig::default(),
        &AnalysisParams::default(),
    )
    .unwrap();
    staged.bands[0].name = "../escape".to_string();

    let out = dir.path().join("out");
    let written = DirectorySink::new(&out).write_panels(&staged).unwrap();
    assert!(written.iter().all(|p| p.parent() == Some(out.as_path())));
    assert!(out.join("band-0.png").is_file());
    assert!(!dir.path().join("escape.png").exists());
}

#[test]
fn custom_config_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(3));
    let config = PipelineConfig {
        segmenter: SegmenterKind::RgbChannels(ChannelBand::red_green().to_vec()),
        ..PipelineConfig::default()
    };
    let result = analyze_with_config(&path, &AnalysisParams::default(), &config).unwrap();
    assert_eq!(result.count, 3);
}

#[test]
fn report_matches_plain_analysis_and_feeds_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "sample.png", &sample(5));
    let params = AnalysisParams::default();
    let config = PipelineConfig::default();
    let panels = dir.path().join("panels");
    let mut sink = DirectorySink::new(&panels);

    let (result, diagnostics) = analyze_with_report(
        &path,
        &params,
        &config,
        &StdClock,
        Some(&mut sink as &mut dyn DiagnosticsSink),
    )
    .unwrap();
    assert_eq!(result, analyze(&path, &params).unwrap());
    assert_eq!(diagnostics.summary.particle_count, 5);
    assert!(!diagnostics.report().is_empty());
    assert!(panels.join("contours.png").is_file());

    let (without_sink, _) =
        analyze_with_report(&path, &params, &config, &StdClock, None).unwrap();
    assert_eq!(without_sink, result);
}
