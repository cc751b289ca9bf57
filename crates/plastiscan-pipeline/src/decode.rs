//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGB
//! photograph the segmenter works on. Alpha, if present, is discarded.

use crate::types::{PipelineError, RgbImage};

/// Decode raw image bytes into an 8-bit RGB image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}
