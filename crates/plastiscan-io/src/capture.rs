//! Still capture through `libcamera-still`.
//!
//! The camera is driven as an external process. Exposure, gain,
//! metering and white balance are passed through as command-line flags;
//! anything left unset falls back to the camera's automatic control.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use chrono::{DateTime, Local};

/// Default capture directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "captures";

/// Default `libcamera-still` timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 1000;

/// Errors that can occur while capturing a photograph.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The output directory could not be created.
    #[error("failed to create capture directory {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The capture program could not be started.
    #[error("failed to start {}: {source}", .program.to_string_lossy())]
    Spawn {
        /// Program that failed to start.
        program: OsString,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The capture program exited unsuccessfully.
    #[error("image capture failed ({status}); check camera connection and permissions")]
    Failed {
        /// Exit status of the capture program.
        status: ExitStatus,
    },
}

/// Camera controls for one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Directory the photograph is written to.
    pub output_dir: PathBuf,
    /// Capture timeout in milliseconds.
    pub timeout_ms: u32,
    /// Manual exposure time in microseconds; disables auto exposure.
    pub shutter_us: Option<u32>,
    /// Manual analogue gain; disables auto gain.
    pub gain: Option<f32>,
    /// Requested ISO, mapped to gain by the camera stack.
    pub iso: Option<u32>,
    /// Metering mode, e.g. `centre`, `spot`, `average`.
    pub metering: Option<String>,
    /// Normalized AE/AWB region of interest as `x,y,w,h`.
    pub roi: Option<String>,
    /// Auto white balance mode, e.g. `auto`, `daylight`.
    pub awb: Option<String>,
    /// Manual white balance gains as `red,blue`; disables AWB.
    pub awbgains: Option<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            shutter_us: None,
            gain: None,
            iso: None,
            metering: None,
            roi: None,
            awb: None,
            awbgains: None,
        }
    }
}

impl CaptureSettings {
    /// Timestamped output path: `<output_dir>/sample_YYYYMMDD_HHMMSS.jpg`.
    #[must_use]
    pub fn image_path(&self, at: DateTime<Local>) -> PathBuf {
        self.output_dir
            .join(format!("sample_{}.jpg", at.format("%Y%m%d_%H%M%S")))
    }

    /// Command-line arguments for `libcamera-still` writing to `image_path`.
    ///
    /// Empty string options are omitted.
    #[must_use]
    pub fn args(&self, image_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-o".into(),
            image_path.into(),
            "--nopreview".into(),
            "--timeout".into(),
            self.timeout_ms.to_string().into(),
        ];
        let mut push = |flag: &str, value: String| {
            args.push(flag.into());
            args.push(value.into());
        };

        if let Some(shutter) = self.shutter_us {
            push("--shutter", shutter.to_string());
        }
        if let Some(gain) = self.gain {
            push("--gain", gain.to_string());
        }
        if let Some(iso) = self.iso {
            push("--iso", iso.to_string());
        }

        for (flag, value) in [
            ("--metering", &self.metering),
            ("--roi", &self.roi),
            ("--awb", &self.awb),
            ("--awbgains", &self.awbgains),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                push(flag, value.to_owned());
            }
        }

        args
    }
}

/// A device that can take a still photograph.
pub trait Camera {
    /// Capture one photograph and return where it was written.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] if the photograph could not be taken.
    fn capture(&mut self, settings: &CaptureSettings) -> Result<PathBuf, CaptureError>;
}

/// Camera driven through the `libcamera-still` command.
#[derive(Debug, Clone)]
pub struct LibcameraStill {
    program: OsString,
}

impl Default for LibcameraStill {
    fn default() -> Self {
        Self::with_program("libcamera-still")
    }
}

impl LibcameraStill {
    /// Use a different executable with the same command-line interface,
    /// e.g. `rpicam-still`.
    #[must_use]
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable name or path.
    #[must_use]
    pub fn program(&self) -> &OsString {
        &self.program
    }
}

impl Camera for LibcameraStill {
    fn capture(&mut self, settings: &CaptureSettings) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(&settings.output_dir).map_err(|source| {
            CaptureError::CreateDir {
                path: settings.output_dir.clone(),
                source,
            }
        })?;

        let image_path = settings.image_path(Local::now());
        let args = settings.args(&image_path);
        tracing::info!(
            program = %self.program.to_string_lossy(),
            path = %image_path.display(),
            "capturing image"
        );
        tracing::debug!(?args, "capture arguments");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|source| CaptureError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CaptureError::Failed { status });
        }
        Ok(image_path)
    }
}
