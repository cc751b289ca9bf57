//! Color segmentation: select pixels whose color falls in the dye's
//! expected emission windows.
//!
//! This module defines the [`ColorSegmenter`] trait and the
//! [`SegmenterKind`] enum that selects an implementation at runtime.
//!
//! # Strategy pattern
//!
//! Two generations of the detector segment color differently: the
//! multi-band HSV segmenter and the earlier per-RGB-channel extraction.
//! Both honor the same contract (one mask per band plus their union), so
//! swapping them is a configuration change, not a code change.

use serde::{Deserialize, Serialize};

use crate::hsv::{Hsv, HsvImage};
use crate::types::{GrayImage, RgbImage};

/// Mask value for selected pixels.
pub const ON: u8 = 255;

/// Mask value for rejected pixels.
pub const OFF: u8 = 0;

/// Saturation and value floor used by the default bands to reject dim
/// and gray background.
pub const DEFAULT_SV_FLOOR: u8 = 50;

/// A named, inclusive HSV range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    /// Band label, used for diagnostics output.
    pub name: String,
    /// Inclusive lower bound on each channel.
    pub lower: Hsv,
    /// Inclusive upper bound on each channel.
    pub upper: Hsv,
}

impl ColorBand {
    /// Create a band spanning `hue_lo..=hue_hi` degrees with the default
    /// saturation/value floor.
    #[must_use]
    pub fn hue(name: &str, hue_lo: u16, hue_hi: u16) -> Self {
        Self {
            name: name.to_string(),
            lower: Hsv::new(hue_lo, DEFAULT_SV_FLOOR, DEFAULT_SV_FLOOR),
            upper: Hsv::new(hue_hi, 255, 255),
        }
    }

    /// Whether `pixel` lies inside the closed interval on all three channels.
    #[must_use]
    pub const fn contains(&self, pixel: Hsv) -> bool {
        pixel.h >= self.lower.h
            && pixel.h <= self.upper.h
            && pixel.s >= self.lower.s
            && pixel.s <= self.upper.s
            && pixel.v >= self.lower.v
            && pixel.v <= self.upper.v
    }

    /// Nile Red emission windows seen through a 560 nm long-pass filter.
    ///
    /// Hydrophobic plastics (PE, PP) emit around 580-630 nm and land in
    /// the orange/yellow bands; polar plastics (PS) emit past 630 nm and
    /// land in the red bands. Hue edges are in degrees chosen from these
    /// emission windows, not OpenCV's half-degree 0-179 hue scale.
    #[must_use]
    pub fn nile_red() -> Vec<Self> {
        vec![
            Self::hue("deep_red", 340, 359), // 700-661 nm
            Self::hue("red", 0, 22),         // 660-626 nm
            Self::hue("orange", 23, 51),     // 625-591 nm
            Self::hue("yellow", 52, 70),     // 590-566 nm
        ]
    }
}

/// An RGB channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Red component.
    Red,
    /// Green component.
    Green,
    /// Blue component.
    Blue,
}

impl Channel {
    const fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }
}

/// An inclusive byte range on one RGB channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBand {
    /// Which channel to read.
    pub channel: Channel,
    /// Inclusive lower bound.
    pub lower: u8,
    /// Inclusive upper bound.
    pub upper: u8,
}

impl ChannelBand {
    /// Red then green, each with a half-intensity floor.
    #[must_use]
    pub const fn red_green() -> [Self; 2] {
        [
            Self {
                channel: Channel::Red,
                lower: 128,
                upper: 255,
            },
            Self {
                channel: Channel::Green,
                lower: 128,
                upper: 255,
            },
        ]
    }

    const fn contains(&self, pixel: image::Rgb<u8>) -> bool {
        let v = pixel.0[self.channel.index()];
        v >= self.lower && v <= self.upper
    }
}

/// The mask produced for one band.
#[derive(Debug, Clone)]
pub struct BandMask {
    /// Band label.
    pub name: String,
    /// `ON` where the band matched, `OFF` elsewhere.
    pub mask: GrayImage,
}

/// Output of a segmenter: the combined mask and every per-band mask.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Per-band masks, in configured band order.
    pub bands: Vec<BandMask>,
    /// Pixel-wise union of all band masks.
    pub combined: GrayImage,
}

/// Selects which segmentation strategy to use, carrying its bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmenterKind {
    /// Multi-band HSV segmentation.
    HsvBands(Vec<ColorBand>),
    /// Fixed-order RGB channel extraction.
    RgbChannels(Vec<ChannelBand>),
}

impl Default for SegmenterKind {
    fn default() -> Self {
        Self::HsvBands(ColorBand::nile_red())
    }
}

impl SegmenterKind {
    /// Number of configured bands.
    #[must_use]
    pub fn band_count(&self) -> usize {
        match self {
            Self::HsvBands(bands) => bands.len(),
            Self::RgbChannels(bands) => bands.len(),
        }
    }

    /// Labels of the configured bands, in order.
    #[must_use]
    pub fn band_names(&self) -> Vec<&str> {
        match self {
            Self::HsvBands(bands) => bands.iter().map(|b| b.name.as_str()).collect(),
            Self::RgbChannels(bands) => bands.iter().map(|b| b.channel.label()).collect(),
        }
    }
}

/// Trait for color segmentation strategies.
///
/// Input: the decoded photograph.
/// Output: one mask per band plus their union, all the same size as the
/// input.
pub trait ColorSegmenter {
    /// Segment the image into band masks.
    fn segment(&self, image: &RgbImage) -> Segmentation;
}

impl ColorSegmenter for SegmenterKind {
    fn segment(&self, image: &RgbImage) -> Segmentation {
        match self {
            Self::HsvBands(bands) => segment_hsv(image, bands),
            Self::RgbChannels(bands) => segment_rgb(image, bands),
        }
    }
}

fn segment_hsv(image: &RgbImage, bands: &[ColorBand]) -> Segmentation {
    let hsv = HsvImage::from_rgb(image);
    let masks = bands
        .iter()
        .map(|band| BandMask {
            name: band.name.clone(),
            mask: GrayImage::from_fn(image.width(), image.height(), |x, y| {
                image::Luma([if band.contains(hsv.get(x, y)) { ON } else { OFF }])
            }),
        })
        .collect();
    combine(image, masks)
}

fn segment_rgb(image: &RgbImage, bands: &[ChannelBand]) -> Segmentation {
    let masks = bands
        .iter()
        .map(|band| BandMask {
            name: band.channel.label().to_string(),
            mask: GrayImage::from_fn(image.width(), image.height(), |x, y| {
                image::Luma([if band.contains(*image.get_pixel(x, y)) {
                    ON
                } else {
                    OFF
                }])
            }),
        })
        .collect();
    combine(image, masks)
}

/// Union the band masks into a fresh combined mask.
fn combine(image: &RgbImage, bands: Vec<BandMask>) -> Segmentation {
    let mut combined = GrayImage::new(image.width(), image.height());
    for band in &bands {
        for (dst, src) in combined.pixels_mut().zip(band.mask.pixels()) {
            dst.0[0] |= src.0[0];
        }
    }
    Segmentation { bands, combined }
}

/// Count `ON` pixels in a mask.
pub(crate) fn count_on(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(u8::from(p.0[0] == ON))).sum()
}
