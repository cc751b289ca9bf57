//! Diagnostic panel writer.
//!
//! Encodes every intermediate of a pipeline run as a PNG file so a run
//! can be inspected after the fact: the original photograph, one mask
//! per color band, the combined, smoothed, binary and cleaned masks,
//! and the retained contours outlined on the original.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::ImageEncoder;
use plastiscan_pipeline::overlay::{OUTLINE, draw_contours};
use plastiscan_pipeline::{DiagnosticsSink, SinkError, StagedResult, is_band_name};

/// Errors that can occur while writing diagnostic panels.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The output directory could not be created.
    #[error("failed to create {}: {source}", .path.display())]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A panel file could not be created.
    #[error("failed to create {}: {source}", .path.display())]
    CreateFile {
        /// File that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// PNG encoding failed.
    #[error("PNG encoding failed for {}: {source}", .path.display())]
    PngEncode {
        /// File being written.
        path: PathBuf,
        /// Underlying encoder error.
        source: image::ImageError,
    },
}

/// Writes each intermediate of a run as a PNG into one directory.
///
/// Files are overwritten on every run.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Sink writing into `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every panel and return the written paths in panel order.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] for the first panel that fails.
    pub fn write_panels(&self, staged: &StagedResult) -> Result<Vec<PathBuf>, RenderError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| RenderError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(staged.bands.len() + 6);

        let (w, h) = staged.original.dimensions();
        written.push(self.write_png(
            "original.png",
            staged.original.as_raw(),
            w,
            h,
            image::ExtendedColorType::Rgb8,
        )?);

        for (index, band) in staged.bands.iter().enumerate() {
            let (w, h) = band.mask.dimensions();
            // Names that are not plain file stems fall back to the band index.
            let file = if is_band_name(&band.name) {
                format!("band-{}.png", band.name)
            } else {
                format!("band-{index}.png")
            };
            written.push(self.write_png(
                &file,
                band.mask.as_raw(),
                w,
                h,
                image::ExtendedColorType::L8,
            )?);
        }

        for (name, mask) in [
            ("combined.png", &staged.combined),
            ("smoothed.png", &staged.smoothed),
            ("binary.png", &staged.binary),
            ("cleaned.png", &staged.cleaned),
        ] {
            let (w, h) = mask.dimensions();
            written.push(self.write_png(name, mask.as_raw(), w, h, image::ExtendedColorType::L8)?);
        }

        let overlay = draw_contours(&staged.original, &staged.retained, OUTLINE);
        written.push(self.write_png(
            "contours.png",
            overlay.as_raw(),
            w,
            h,
            image::ExtendedColorType::Rgb8,
        )?);

        tracing::info!(
            dir = %self.dir.display(),
            panels = written.len(),
            "wrote diagnostic panels"
        );
        Ok(written)
    }

    fn write_png(
        &self,
        name: &str,
        raw: &[u8],
        width: u32,
        height: u32,
        color: image::ExtendedColorType,
    ) -> Result<PathBuf, RenderError> {
        let path = self.dir.join(name);
        let file = File::create(&path).map_err(|source| RenderError::CreateFile {
            path: path.clone(),
            source,
        })?;
        let encoder = image::codecs::png::PngEncoder::new(BufWriter::new(file));
        encoder
            .write_image(raw, width, height, color)
            .map_err(|source| RenderError::PngEncode {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), "wrote panel");
        Ok(path)
    }
}

impl DiagnosticsSink for DirectorySink {
    fn show(&mut self, staged: &StagedResult) -> Result<(), SinkError> {
        self.write_panels(staged)?;
        Ok(())
    }
}
