//! plastiscan: count and classify microplastic particles from the
//! command line.
//!
//! Two workflows are available:
//!
//! - `analyze` runs the detection pipeline on an existing photograph.
//! - `run` switches the excitation LEDs on, captures a photograph with
//!   `libcamera-still`, switches the LEDs off and analyzes the capture.
//!
//! # Usage
//!
//! ```text
//! plastiscan analyze [OPTIONS] <IMAGE>
//! plastiscan run [OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use plastiscan_io::light::{DEFAULT_PINS, SYSFS_GPIO_ROOT};
use plastiscan_io::{
    AnalyzeError, Camera, CaptureError, CaptureSettings, DirectorySink, Illuminated,
    LibcameraStill, LightError, StdClock, SysfsLeds,
};
use plastiscan_pipeline::{
    AnalysisParams, ChannelBand, ColorBand, DetectionResult, DiagnosticsSink, PipelineConfig,
    PipelineError, SegmenterKind,
};
use tracing::Level;

/// Count Nile-Red-stained microplastic particles and classify their
/// density as Low, Medium or High.
#[derive(Parser)]
#[command(name = "plastiscan", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze an existing photograph.
    Analyze(AnalyzeArgs),
    /// Illuminate, capture and analyze a new photograph.
    Run(RunArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the sample photograph (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    #[command(flatten)]
    params: ParamArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    capture: CaptureArgs,

    #[command(flatten)]
    lights: LightArgs,

    #[command(flatten)]
    params: ParamArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    output: OutputArgs,
}

/// Area bounds and count thresholds.
#[derive(Args)]
struct ParamArgs {
    /// Exclusive lower contour area bound in pixels. Negative values clamp to 0.
    #[arg(long, default_value_t = AnalysisParams::DEFAULT_MIN_AREA, allow_negative_numbers = true)]
    min_area: f64,

    /// Exclusive upper contour area bound in pixels.
    #[arg(long, default_value_t = AnalysisParams::DEFAULT_MAX_AREA, allow_negative_numbers = true)]
    max_area: f64,

    /// Counts below this are Low.
    #[arg(long, default_value_t = AnalysisParams::DEFAULT_LOW_THRESH, allow_negative_numbers = true)]
    low_thresh: i64,

    /// Counts below this (and not Low) are Medium; the rest are High.
    #[arg(long, default_value_t = AnalysisParams::DEFAULT_HIGH_THRESH, allow_negative_numbers = true)]
    high_thresh: i64,
}

impl ParamArgs {
    const fn to_params(&self) -> AnalysisParams {
        AnalysisParams {
            min_area: self.min_area,
            max_area: self.max_area,
            low_thresh: self.low_thresh,
            high_thresh: self.high_thresh,
        }
    }
}

/// Color segmentation strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Segmenter {
    /// Nile Red hue bands in HSV space.
    Hsv,
    /// Red and green channel ranges.
    Rgb,
}

/// Pipeline tuning.
#[derive(Args)]
struct PipelineArgs {
    /// Color segmentation strategy.
    #[arg(long, value_enum, default_value_t = Segmenter::Hsv)]
    segmenter: Segmenter,

    /// Gaussian kernel side length (odd).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_KERNEL_SIZE)]
    blur_kernel_size: u32,

    /// Opening structuring element radius.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MORPH_RADIUS)]
    morph_radius: u32,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, the other pipeline flags are ignored. The JSON must
    /// be a valid `PipelineConfig` serialization.
    #[arg(long, conflicts_with = "config")]
    config_json: Option<String>,

    /// Read the full pipeline config from a JSON file.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Report formatting.
#[derive(Args)]
struct OutputArgs {
    /// Print the result as JSON.
    #[arg(long)]
    json: bool,

    /// Print per-stage timing and metrics to stderr.
    #[arg(long)]
    report: bool,

    /// Write every intermediate image as a PNG into this directory.
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,
}

/// Camera controls passed to `libcamera-still`.
#[derive(Args)]
struct CaptureArgs {
    /// Directory for captured photographs.
    #[arg(long, default_value = plastiscan_io::capture::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Capture timeout in milliseconds.
    #[arg(long, default_value_t = plastiscan_io::capture::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u32,

    /// Manual exposure time in microseconds.
    #[arg(long)]
    shutter_us: Option<u32>,

    /// Manual analogue gain.
    #[arg(long)]
    gain: Option<f32>,

    /// Requested ISO.
    #[arg(long)]
    iso: Option<u32>,

    /// Metering mode (centre, spot, average, matrix).
    #[arg(long)]
    metering: Option<String>,

    /// AE/AWB region of interest as normalized `x,y,w,h`.
    #[arg(long)]
    roi: Option<String>,

    /// Auto white balance mode.
    #[arg(long)]
    awb: Option<String>,

    /// Manual white balance gains as `red,blue`.
    #[arg(long)]
    awbgains: Option<String>,

    /// Capture executable with a `libcamera-still` compatible interface.
    #[arg(long, default_value = "libcamera-still")]
    camera_program: String,
}

impl CaptureArgs {
    fn to_settings(&self) -> CaptureSettings {
        CaptureSettings {
            output_dir: self.output_dir.clone(),
            timeout_ms: self.timeout_ms,
            shutter_us: self.shutter_us,
            gain: self.gain,
            iso: self.iso,
            metering: self.metering.clone(),
            roi: self.roi.clone(),
            awb: self.awb.clone(),
            awbgains: self.awbgains.clone(),
        }
    }
}

/// Excitation LED wiring.
#[derive(Args)]
struct LightArgs {
    /// Capture without switching the LEDs.
    #[arg(long)]
    no_lights: bool,

    /// GPIO pins driving the LEDs.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_PINS)]
    gpio_pins: Vec<u32>,

    /// Sysfs GPIO directory.
    #[arg(long, default_value = SYSFS_GPIO_ROOT)]
    gpio_root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Light(#[from] LightError),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        Self::Analyze(AnalyzeError::Pipeline(err))
    }
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` and `--config` replace the individual flags wholesale.
fn config_from_args(args: &PipelineArgs) -> Result<PipelineConfig, CliError> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json)
            .map_err(|e| CliError::Config(format!("Error parsing --config-json: {e}")));
    }
    if let Some(ref path) = args.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Error reading {}: {e}", path.display())))?;
        return serde_json::from_str(&text)
            .map_err(|e| CliError::Config(format!("Error parsing {}: {e}", path.display())));
    }

    Ok(PipelineConfig {
        segmenter: match args.segmenter {
            Segmenter::Hsv => SegmenterKind::HsvBands(ColorBand::nile_red()),
            Segmenter::Rgb => SegmenterKind::RgbChannels(ChannelBand::red_green().to_vec()),
        },
        blur_kernel_size: args.blur_kernel_size,
        morph_radius: args.morph_radius,
    })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the pipeline on `path` and print the outcome.
fn analyze_and_report(
    path: &Path,
    params: &AnalysisParams,
    config: &PipelineConfig,
    output: &OutputArgs,
) -> Result<DetectionResult, CliError> {
    let mut panels = output.diagnostics_dir.as_ref().map(DirectorySink::new);

    let result = if output.report {
        let (result, diagnostics) = plastiscan_io::analyze_with_report(
            path,
            params,
            config,
            &StdClock,
            panels.as_mut().map(|sink| sink as &mut dyn DiagnosticsSink),
        )?;
        eprintln!("{}", diagnostics.report());
        result
    } else if let Some(ref mut sink) = panels {
        plastiscan_io::analyze_with_diagnostics(path, params, config, sink)?
    } else {
        plastiscan_io::analyze_with_config(path, params, config)?
    };

    if let Some(sink) = panels {
        eprintln!("Diagnostic panels: {}", sink.dir().display());
    }

    if output.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("{result}");
    }
    Ok(result)
}

fn analyze_command(args: &AnalyzeArgs) -> Result<(), CliError> {
    let config = config_from_args(&args.pipeline)?;
    analyze_and_report(&args.image, &args.params.to_params(), &config, &args.output)?;
    Ok(())
}

fn run_command(args: &RunArgs) -> Result<(), CliError> {
    // Settings are checked before any hardware is touched.
    let config = config_from_args(&args.pipeline)?;
    let params = args.params.to_params();
    config.validate()?;
    params.normalize()?;

    let settings = args.capture.to_settings();
    let mut camera = LibcameraStill::with_program(&args.capture.camera_program);

    let path = if args.lights.no_lights {
        camera.capture(&settings)?
    } else {
        let mut leds = SysfsLeds::new(&args.lights.gpio_root, args.lights.gpio_pins.clone());
        let lit = Illuminated::new(&mut leds)?;
        let path = camera.capture(&settings)?;
        lit.finish()?;
        path
    };
    eprintln!("Captured {}", path.display());

    analyze_and_report(&path, &params, &config, &args.output)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Command::Analyze(ref args) => analyze_command(args),
        Command::Run(ref args) => run_command(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
