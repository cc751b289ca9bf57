//! Contour overlay for diagnostics.
//!
//! Draws contour outlines on a copy of the source photograph so the
//! retained particles can be checked by eye.

use image::Rgb;
use imageproc::drawing::draw_line_segment_mut;

use crate::types::{Contour, RgbImage};

/// Outline color used for retained particles.
pub const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);

/// Draw every contour as a closed one-pixel outline on a copy of `image`.
#[must_use = "returns the annotated copy"]
#[allow(clippy::cast_precision_loss)]
pub fn draw_contours(image: &RgbImage, contours: &[Contour], color: Rgb<u8>) -> RgbImage {
    let mut canvas = image.clone();
    for contour in contours {
        let points = contour.points();
        match points {
            [] => {}
            [only] => {
                if only.x < canvas.width() && only.y < canvas.height() {
                    canvas.put_pixel(only.x, only.y, color);
                }
            }
            _ => {
                for (i, a) in points.iter().enumerate() {
                    let b = points[(i + 1) % points.len()];
                    draw_line_segment_mut(
                        &mut canvas,
                        (a.x as f32, a.y as f32),
                        (b.x as f32, b.y as f32),
                        color,
                    );
                }
            }
        }
    }
    canvas
}
