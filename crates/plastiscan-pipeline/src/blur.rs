//! Gaussian smoothing of the combined color mask.
//!
//! Isolated on-pixels (sensor speckle, stray reflections) are spread
//! into low-intensity blobs so they cannot drag the Otsu level around,
//! while solid particle regions keep their full intensity.
//!
//! The kernel is specified by its side length, as a fixed configuration
//! constant; sigma is derived from the size the same way common vision
//! toolkits do when no explicit sigma is given.

use image::GrayImage;

/// Sigma for a Gaussian kernel of the given odd side length.
///
/// `0.3 * ((size - 1) * 0.5 - 1) + 0.8`, which yields 0.8 for a 3x3
/// kernel and 1.1 for a 5x5 kernel.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(size: u32) -> f32 {
    0.3f32.mul_add((size as f32 - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian kernel of the given odd side length.
///
/// The 2-D kernel is the outer product of this vector with itself, so
/// filtering rows then columns with it is equivalent.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = sigma_for_kernel(size);
    let half = (size / 2) as i32;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Smooth a mask with a `size x size` Gaussian kernel.
///
/// `size` must be a positive odd integer; this is checked by
/// [`PipelineConfig::validate`](crate::PipelineConfig::validate) before
/// the pipeline runs. A size of 1 returns an unchanged copy.
///
/// This is step 2 in the pipeline, between color segmentation and Otsu
/// binarization.
#[must_use = "returns the smoothed mask"]
pub fn smooth_mask(mask: &GrayImage, size: u32) -> GrayImage {
    if size <= 1 {
        return mask.clone();
    }
    let kernel = gaussian_kernel(size);
    imageproc::filter::separable_filter_equal(mask, &kernel)
}
