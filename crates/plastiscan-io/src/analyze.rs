//! Analyze a sample photograph stored on disk.

use std::path::{Path, PathBuf};

use plastiscan_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use plastiscan_pipeline::{
    AnalysisParams, DetectionResult, DiagnosticsSink, PipelineConfig, PipelineError,
};

/// Errors that can occur while analyzing an image file.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The image path does not exist.
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The image file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Configuration, decoding or processing failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Read the raw bytes of an image file.
///
/// # Errors
///
/// Returns [`AnalyzeError::NotFound`] if `path` does not exist and
/// [`AnalyzeError::Read`] for any other I/O failure.
pub fn read_image(path: &Path) -> Result<Vec<u8>, AnalyzeError> {
    if !path.exists() {
        return Err(AnalyzeError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|source| AnalyzeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read image");
    Ok(bytes)
}

/// Count particles in the photograph at `path` with the default
/// pipeline configuration.
///
/// # Errors
///
/// Returns [`AnalyzeError::Pipeline`] with
/// [`PipelineError::InvalidConfig`] for invalid parameters; the file is
/// not touched in that case. Otherwise see [`read_image`] and
/// [`plastiscan_pipeline::process`].
pub fn analyze(path: &Path, params: &AnalysisParams) -> Result<DetectionResult, AnalyzeError> {
    analyze_with_config(path, params, &PipelineConfig::default())
}

/// Count particles in the photograph at `path` with `config`.
///
/// # Errors
///
/// Same as [`analyze`], plus [`PipelineError::InvalidConfig`] for an
/// invalid `config`.
pub fn analyze_with_config(
    path: &Path,
    params: &AnalysisParams,
    config: &PipelineConfig,
) -> Result<DetectionResult, AnalyzeError> {
    config.validate()?;
    params.normalize()?;
    let bytes = read_image(path)?;
    Ok(plastiscan_pipeline::process(&bytes, config, params)?)
}

/// Count particles and hand every intermediate to `sink`.
///
/// The result is identical to [`analyze`] with the same configuration;
/// a failing sink is logged and ignored.
///
/// # Errors
///
/// Same as [`analyze`], plus [`PipelineError::InvalidConfig`] for an
/// invalid `config`.
pub fn analyze_with_diagnostics(
    path: &Path,
    params: &AnalysisParams,
    config: &PipelineConfig,
    sink: &mut dyn DiagnosticsSink,
) -> Result<DetectionResult, AnalyzeError> {
    config.validate()?;
    params.normalize()?;
    let bytes = read_image(path)?;
    Ok(plastiscan_pipeline::process_with_sink(
        &bytes, config, params, sink,
    )?)
}

/// Count particles, timing every stage with `clock`.
///
/// When a `sink` is given it receives the intermediates afterwards; a
/// failing sink is logged and ignored.
///
/// # Errors
///
/// Same as [`analyze_with_config`].
pub fn analyze_with_report<C: Clock>(
    path: &Path,
    params: &AnalysisParams,
    config: &PipelineConfig,
    clock: &C,
    sink: Option<&mut dyn DiagnosticsSink>,
) -> Result<(DetectionResult, PipelineDiagnostics), AnalyzeError> {
    config.validate()?;
    params.normalize()?;
    let bytes = read_image(path)?;
    let (staged, diagnostics) =
        plastiscan_pipeline::diagnostics::process_staged_with_diagnostics(
            &bytes, config, params, clock,
        )?;
    if let Some(sink) = sink
        && let Err(e) = sink.show(&staged)
    {
        tracing::warn!(error = %e, "diagnostics sink failed");
    }
    Ok((staged.result, diagnostics))
}
