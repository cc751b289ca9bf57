//! RGB to HSV conversion.
//!
//! Hue is kept in whole degrees (`0..360`) rather than a device-native
//! half-degree scale, so band definitions read the same as the emission
//! wavelengths they were derived from. Saturation and value use the full
//! byte range.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, RgbImage};

/// Exclusive upper bound of the hue axis, in degrees.
pub const HUE_RANGE: u16 = 360;

/// One hue/saturation/value triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue in degrees, `0..360`.
    pub h: u16,
    /// Saturation, `0..=255`.
    pub s: u8,
    /// Value (brightness), `0..=255`.
    pub v: u8,
}

impl Hsv {
    /// Create an HSV triple. Hue is taken as given.
    #[must_use]
    pub const fn new(h: u16, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    /// Convert one RGB pixel.
    ///
    /// Value is the largest channel, saturation is the channel spread
    /// relative to value, and hue is the angle of the dominant channel
    /// pair, rounded to the nearest degree and wrapped into `0..360`.
    /// Grays (zero spread) get hue 0 and saturation 0.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::many_single_char_names
    )]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = f32::from(max - min);

        if max == 0 || max == min {
            return Self::new(0, 0, max);
        }

        let s = (delta * 255.0 / f32::from(max)).round() as u8;

        let (rf, gf, bf) = (f32::from(r), f32::from(g), f32::from(b));
        let degrees = if max == r {
            60.0 * (gf - bf) / delta
        } else if max == g {
            60.0f32.mul_add((bf - rf) / delta, 120.0)
        } else {
            60.0f32.mul_add((rf - gf) / delta, 240.0)
        };

        let h = (degrees.round() as i32).rem_euclid(i32::from(HUE_RANGE)) as u16;
        Self::new(h, s, max)
    }
}

/// A grid of HSV pixels with the same dimensions as its source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsvImage {
    dimensions: Dimensions,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    /// Convert an RGB image pixel by pixel.
    #[must_use = "returns the converted HSV image"]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let pixels = image
            .pixels()
            .map(|p| Hsv::from_rgb(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self {
            dimensions: Dimensions::of(image),
            pixels,
        }
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds, like
    /// [`image::ImageBuffer::get_pixel`].
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Hsv {
        assert!(
            x < self.dimensions.width && y < self.dimensions.height,
            "pixel ({x}, {y}) out of bounds",
        );
        self.pixels[y as usize * self.dimensions.width as usize + x as usize]
    }

    /// All pixels in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[Hsv] {
        &self.pixels
    }
}
