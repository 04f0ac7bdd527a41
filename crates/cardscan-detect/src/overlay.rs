// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Debug overlay: the chosen outline drawn over a grayscale copy of the photo.

use cardscan_core::OrderedQuad;
use image::{DynamicImage, Rgb, RgbImage, imageops};
use imageproc::drawing::draw_line_segment_mut;

/// Outline colour.
pub const OVERLAY_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);

/// Grayscale copy of `image` rendered as RGB, with `quad` outlined in blue.
///
/// `thickness` is in pixels; zero is treated as one.
pub fn render_overlay(image: &RgbImage, quad: &OrderedQuad, thickness: u32) -> RgbImage {
    let gray = imageops::grayscale(image);
    let mut canvas = DynamicImage::ImageLuma8(gray).to_rgb8();

    let corners = quad.corners();
    let half = thickness.max(1) as i32 / 2;
    let span = thickness.max(1) as i32;

    for i in 0..corners.len() {
        let a = corners[i];
        let b = corners[(i + 1) % corners.len()];
        for dx in -half..(span - half) {
            for dy in -half..(span - half) {
                draw_line_segment_mut(
                    &mut canvas,
                    (a.x + dx as f32, a.y + dy as f32),
                    (b.x + dx as f32, b.y + dy as f32),
                    OVERLAY_COLOUR,
                );
            }
        }
    }
    canvas
}
