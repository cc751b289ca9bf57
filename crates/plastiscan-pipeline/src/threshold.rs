//! Otsu binarization of the smoothed mask.
//!
//! Wraps [`imageproc::contrast::otsu_level`] and
//! [`imageproc::contrast::threshold`]. The level adapts to each
//! capture's own histogram, so exposure differences between photographs
//! need no manual tuning.

use image::GrayImage;
use imageproc::contrast::ThresholdType;

/// Binarize with an automatically selected Otsu level.
///
/// Pixels strictly brighter than the level become 255, all others 0.
/// Returns the binary mask together with the level that produced it.
///
/// This is step 3 in the pipeline, between smoothing and morphological
/// cleanup.
#[must_use = "returns the binary mask and the chosen level"]
pub fn otsu_binarize(smoothed: &GrayImage) -> (GrayImage, u8) {
    let level = imageproc::contrast::otsu_level(smoothed);
    let binary = imageproc::contrast::threshold(smoothed, level, ThresholdType::Binary);
    (binary, level)
}
