//! Morphological opening (erosion followed by dilation).
//!
//! Removes foreground specks thinner than the structuring element while
//! restoring the size of the blobs that survive erosion. Particles are
//! roughly round and several pixels across; residual noise is not.

use image::GrayImage;
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};

/// A symmetric neighborhood, stored as offsets from its center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuringElement {
    radius: u32,
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// Elliptical (here circular) element inscribed in a
    /// `(2r + 1) x (2r + 1)` box.
    ///
    /// Each row `dy` spans `dx` in `-w..=w` with
    /// `w = round(r * sqrt(1 - dy^2 / r^2))`. Radius 1 gives the 3x3
    /// cross, radius 0 a single pixel.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss
    )]
    pub fn ellipse(radius: u32) -> Self {
        let r = radius as i32;
        let rf = f64::from(radius);
        let mut offsets = Vec::new();
        for dy in -r..=r {
            let w = if r == 0 {
                0
            } else {
                let dyf = f64::from(dy);
                (rf * (1.0 - dyf * dyf / (rf * rf)).sqrt()).round() as i32
            };
            for dx in -w..=w {
                offsets.push((dx, dy));
            }
        }
        Self { radius, offsets }
    }

    /// Radius the element was built with.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Offsets `(dx, dy)` covered by the element.
    #[must_use]
    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    /// Apply `pick` to every in-bounds neighbor value under the element.
    ///
    /// Out-of-image neighbors are skipped, so the border neither erodes
    /// nor dilates anything.
    fn apply(&self, image: &GrayImage, pick: fn(u8, u8) -> u8, seed: u8) -> GrayImage {
        let (w, h) = image.dimensions();
        let (wi, hi) = (i64::from(w), i64::from(h));
        GrayImage::from_fn(w, h, |x, y| {
            let mut acc = seed;
            for &(dx, dy) in &self.offsets {
                let nx = i64::from(x) + i64::from(dx);
                let ny = i64::from(y) + i64::from(dy);
                if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let v = image.get_pixel(nx as u32, ny as u32).0[0];
                acc = pick(acc, v);
            }
            image::Luma([acc])
        })
    }
}

/// Minimum under the element at every pixel.
#[must_use = "returns the eroded mask"]
pub fn erode(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    element.apply(image, u8::min, u8::MAX)
}

/// Maximum under the element at every pixel.
#[must_use = "returns the dilated mask"]
pub fn dilate(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    element.apply(image, u8::max, u8::MIN)
}

/// Opening: [`erode`] then [`dilate`] with the same element.
///
/// This is step 4 in the pipeline, between Otsu binarization and
/// contour extraction.
#[must_use = "returns the opened mask"]
pub fn open(image: &GrayImage, element: &StructuringElement) -> GrayImage {
    // The radius-1 element is the L1 unit disk.
    if element.radius() == 1 {
        return imageproc::morphology::open(image, Norm::L1, 1);
    }
    dilate(&erode(image, element), element)
}
