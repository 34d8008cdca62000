// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster buffers — the interleaved pixel samples a document library hands to
// the detector for one rendered page region.

use image::{RgbImage, RgbaImage};
use pagemark_core::error::{PagemarkError, Result};

/// An interleaved 8-bit pixel buffer with an explicit channel count.
///
/// Libraries may produce gray, gray+alpha, RGB or RGBA samples; only the
/// colour layouts (3 or 4 channels) can carry a highlighter mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl Raster {
    /// Wrap raw samples. The buffer length must equal
    /// `width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(PagemarkError::Render(format!(
                "raster buffer holds {} samples, expected {} ({}x{}x{})",
                samples.len(),
                expected,
                width,
                height,
                channels
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// An opaque white RGBA raster, used for pages with nothing to rasterise.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([255, 255, 255, 255]),
        ))
    }

    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 4,
            samples: image.into_raw(),
        }
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 3,
            samples: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Drop alpha and return the colour samples as an `RgbImage`.
    ///
    /// Fails with [`PagemarkError::UnsupportedChannelCount`] for anything that
    /// is not RGB or RGBA.
    pub fn to_rgb(&self) -> Result<RgbImage> {
        let rgb = match self.channels {
            3 => self.samples.clone(),
            4 => self
                .samples
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            other => return Err(PagemarkError::UnsupportedChannelCount(other)),
        };
        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| PagemarkError::Render("raster dimensions overflow".into()))
    }
}
