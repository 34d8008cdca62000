// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Marker mask — HSV range thresholding and erosion of the resulting binary
// image.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use tracing::{debug, instrument};

/// Foreground value of a binary mask.
pub const FOREGROUND: u8 = 255;

/// Convert one RGB pixel to HSV on the 8-bit scale used by the marker range:
/// hue in `0..180` (degrees halved), saturation and value in `0..=255`.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    // 360 degrees rounds to 180, which wraps back to red.
    let half_hue = (hue / 2.0).round() as u32 % 180;
    [
        half_hue as u8,
        saturation.round().clamp(0.0, 255.0) as u8,
        max as u8,
    ]
}

/// Threshold an RGB image to a binary mask: a pixel is foreground when its
/// HSV triple lies inside `[lower, upper]` on every axis (inclusive).
#[instrument(skip(image), fields(width = image.width(), height = image.height()))]
pub fn hsv_in_range(image: &RgbImage, lower: [u8; 3], upper: [u8; 3]) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut mask = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let hsv = rgb_to_hsv(pixel.0);
        let inside = (0..3).all(|axis| lower[axis] <= hsv[axis] && hsv[axis] <= upper[axis]);
        if inside {
            mask.put_pixel(x, y, Luma([FOREGROUND]));
        }
    }

    debug!(
        foreground = mask.pixels().filter(|p| p.0[0] == FOREGROUND).count(),
        "HSV mask built"
    );
    mask
}

/// Thin the strokes of a binary mask by one pixel on every side.
///
/// A pixel survives only when its whole 3x3 neighbourhood is foreground,
/// which leaves the core of thick ink lines and removes strokes narrower than
/// three pixels. Neighbours outside the image never veto, so strokes cut by
/// the region border are not eaten from that side.
pub fn thin(mask: &GrayImage) -> GrayImage {
    morphology::erode(mask, Norm::LInf, 1)
}
