//! Contour extraction: outer boundaries of foreground regions.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`] and keeps only top-level outer
//! borders. Hole borders, and any region nested inside a hole, are
//! dropped so every particle is counted once by its outline.
//!
//! The mask is traced inside a one-pixel background frame. Border
//! following misreads regions that touch the image edge otherwise.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Contour, PixelPoint};

/// Trace the outer boundary of every top-level foreground region.
///
/// Any nonzero pixel is foreground. Contours come back in raster-scan
/// discovery order (top to bottom, left to right by the first pixel
/// touched), which is stable across runs on identical input.
///
/// This is step 5 in the pipeline, between morphological cleanup and
/// classification.
#[must_use = "returns the extracted contours"]
pub fn outer_contours(mask: &GrayImage) -> Vec<Contour> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&framed(mask));

    contours
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| {
            Contour::new(
                c.points
                    .into_iter()
                    .map(|p| PixelPoint::new(p.x.saturating_sub(1), p.y.saturating_sub(1)))
                    .collect(),
            )
        })
        .collect()
}

/// Copy of `mask` surrounded by a one-pixel background border.
fn framed(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if (1..=w).contains(&x) && (1..=h).contains(&y) {
            *mask.get_pixel(x - 1, y - 1)
        } else {
            image::Luma([0])
        }
    })
}
