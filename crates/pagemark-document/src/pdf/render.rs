// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region rendering for scanned PDFs.
//
// Scanner output paints one full-page image per page, so rasterising a page
// region means decoding that image and cropping the matching pixels. The
// largest image XObject on the page is assumed to cover the page box. Pages
// without a decodable image render as blank white, which can never carry a
// marker.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, Stream};
use pagemark_core::error::{PagemarkError, Result};
use tracing::{debug, warn};

use super::reader::{number, resolve};
use crate::library::PageRect;
use crate::raster::Raster;

/// Decode the page scan once, as RGBA. `None` when the page carries no
/// decodable image.
pub(crate) fn page_scan(document: &Document, page: &Dictionary) -> Option<RgbaImage> {
    let scan = largest_page_image(document, page)?;
    Some(scan.to_rgba8())
}

/// Rasterise `clip` at `zoom` pixels per point, as RGBA.
///
/// `scan` is stretched over `extent`, the page's media box; both rectangles
/// are in page space with the origin at the top-left.
pub(crate) fn render_region(
    scan: Option<&RgbaImage>,
    extent: PageRect,
    clip: PageRect,
    zoom: f32,
) -> Result<Raster> {
    if zoom <= 0.0 || clip.width() <= 0.0 || clip.height() <= 0.0 {
        return Err(PagemarkError::Render(format!(
            "invalid render request: clip {clip:?} at zoom {zoom}"
        )));
    }

    let out_w = (clip.width() * zoom).round().max(1.0) as u32;
    let out_h = (clip.height() * zoom).round().max(1.0) as u32;

    let Some(scan) = scan else {
        debug!("page has no decodable image; rendering blank region");
        return Ok(Raster::blank(out_w, out_h));
    };

    let (img_w, img_h) = scan.dimensions();
    let scale_x = img_w as f32 / extent.width();
    let scale_y = img_h as f32 / extent.height();

    let px0 = ((clip.x0 - extent.x0) * scale_x).floor().clamp(0.0, img_w as f32) as u32;
    let py0 = ((clip.y0 - extent.y0) * scale_y).floor().clamp(0.0, img_h as f32) as u32;
    let px1 = ((clip.x1 - extent.x0) * scale_x).ceil().clamp(0.0, img_w as f32) as u32;
    let py1 = ((clip.y1 - extent.y0) * scale_y).ceil().clamp(0.0, img_h as f32) as u32;

    if px1 <= px0 || py1 <= py0 {
        return Ok(Raster::blank(out_w, out_h));
    }

    let cropped: RgbaImage = imageops::crop_imm(scan, px0, py0, px1 - px0, py1 - py0).to_image();
    let resized = imageops::resize(&cropped, out_w, out_h, FilterType::Triangle);
    Ok(Raster::from_rgba(resized))
}

/// Decode the image XObject with the most pixels, if any can be decoded.
fn largest_page_image(document: &Document, page: &Dictionary) -> Option<DynamicImage> {
    let resources = page_resources(document, page)?;
    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve(document, obj))
        .and_then(|obj| obj.as_dict().ok())?;

    let mut candidates: Vec<&Stream> = xobjects
        .iter()
        .filter_map(|(_, obj)| resolve(document, obj))
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| name_of(stream.dict.get(b"Subtype").ok()) == Some(b"Image".as_slice()))
        .collect();
    candidates.sort_by_key(|stream| std::cmp::Reverse(pixel_area(stream)));

    candidates
        .into_iter()
        .find_map(|stream| match decode_image(document, stream) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "skipping undecodable page image");
                None
            }
        })
}

/// `/Resources` of the page or its nearest ancestor.
fn page_resources<'a>(document: &'a Document, page: &'a Dictionary) -> Option<&'a Dictionary> {
    let mut current = page;
    for _ in 0..32 {
        if let Some(resources) = current
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(document, obj))
            .and_then(|obj| obj.as_dict().ok())
        {
            return Some(resources);
        }
        current = current
            .get(b"Parent")
            .ok()
            .and_then(|obj| resolve(document, obj))
            .and_then(|obj| obj.as_dict().ok())?;
    }
    None
}

fn pixel_area(stream: &Stream) -> u64 {
    let dim = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(number)
            .map(|v| v.max(0.0) as u64)
            .unwrap_or(0)
    };
    dim(b"Width") * dim(b"Height")
}

fn name_of(object: Option<&Object>) -> Option<&[u8]> {
    match object {
        Some(Object::Name(name)) => Some(name.as_slice()),
        _ => None,
    }
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| name_of(Some(item)).map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Number of colour components declared by `/ColorSpace`.
fn color_components(document: &Document, stream: &Stream) -> Option<u8> {
    let space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|obj| resolve(document, obj))?;
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) if name_of(items.first()) == Some(b"ICCBased".as_slice()) => {
            let profile = items
                .get(1)
                .and_then(|obj| resolve(document, obj))
                .and_then(|obj| obj.as_stream().ok())?;
            profile
                .dict
                .get(b"N")
                .ok()
                .and_then(number)
                .map(|n| n as u8)
        }
        _ => None,
    }
}

fn decode_image(document: &Document, stream: &Stream) -> Result<DynamicImage> {
    let filters = filters(stream);

    if filters.iter().any(|f| f == b"DCTDecode") {
        if filters.len() != 1 {
            return Err(PagemarkError::Render("chained JPEG filters are not supported".into()));
        }
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|err| PagemarkError::Render(format!("JPEG page image: {err}")));
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else if filters.iter().all(|f| f == b"FlateDecode") {
        stream
            .decompressed_content()
            .map_err(|err| PagemarkError::Render(format!("inflate page image: {err}")))?
    } else {
        return Err(PagemarkError::Render(format!(
            "unsupported image filter chain {:?}",
            filters
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
        )));
    };

    let dim = |key: &[u8]| stream.dict.get(key).ok().and_then(number).map(|v| v as u32);
    let (Some(width), Some(height)) = (dim(b"Width"), dim(b"Height")) else {
        return Err(PagemarkError::Render("page image lacks /Width or /Height".into()));
    };
    let bits = dim(b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(PagemarkError::Render(format!(
            "{bits}-bit page images are not supported"
        )));
    }
    let components = color_components(document, stream)
        .ok_or_else(|| PagemarkError::Render("unsupported page image colour space".into()))?;

    raw_to_image(width, height, components, data)
}

/// Build an image from unfiltered 8-bit samples.
fn raw_to_image(width: u32, height: u32, components: u8, data: Vec<u8>) -> Result<DynamicImage> {
    let expected = width as usize * height as usize * components as usize;
    if data.len() < expected {
        return Err(PagemarkError::Render(format!(
            "page image holds {} bytes, expected {}",
            data.len(),
            expected
        )));
    }
    let mut data = data;
    data.truncate(expected);

    let overflow = || PagemarkError::Render("page image dimensions overflow".into());
    match components {
        1 => GrayImage::from_raw(width, height, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(overflow),
        3 => RgbImage::from_raw(width, height, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(overflow),
        4 => {
            // Naive CMYK: enough to keep a yellow highlighter yellow.
            let rgb = RgbImage::from_fn(width, height, |x, y| {
                let i = (y as usize * width as usize + x as usize) * 4;
                let k = 255 - data[i + 3] as u16;
                let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
                Rgb([channel(data[i]), channel(data[i + 1]), channel(data[i + 2])])
            });
            Ok(DynamicImage::ImageRgb8(rgb))
        }
        other => Err(PagemarkError::Render(format!(
            "{other}-component page images are not supported"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_rgb_round_trips_pixels() {
        let image = raw_to_image(2, 1, 3, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let rgb = image.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(raw_to_image(4, 4, 3, vec![0; 10]).is_err());
    }

    #[test]
    fn regions_are_cropped_from_the_scan() {
        let mut scan = RgbaImage::from_pixel(100, 100, image::Rgba([255, 255, 255, 255]));
        for y in 0..50 {
            for x in 50..100 {
                scan.put_pixel(x, y, image::Rgba([250, 235, 40, 255]));
            }
        }
        let extent = PageRect::sized(200.0, 200.0);

        let top_right =
            render_region(Some(&scan), extent, PageRect::new(100.0, 0.0, 200.0, 100.0), 1.0)
                .unwrap();
        assert_eq!((top_right.width(), top_right.height()), (100, 100));
        assert_eq!(&top_right.samples()[..4], &[250, 235, 40, 255]);

        let bottom_left =
            render_region(Some(&scan), extent, PageRect::new(0.0, 100.0, 100.0, 200.0), 1.0)
                .unwrap();
        assert_eq!(&bottom_left.samples()[..4], &[255, 255, 255, 255]);
    }

    #[test]
    fn missing_scan_renders_blank() {
        let extent = PageRect::sized(100.0, 100.0);
        let raster = render_region(None, extent, PageRect::sized(50.0, 50.0), 2.0).unwrap();
        assert_eq!(raster, Raster::blank(100, 100));
    }

    #[test]
    fn cmyk_yellow_stays_yellow() {
        let image = raw_to_image(1, 1, 4, vec![0, 0, 255, 0]).unwrap();
        assert_eq!(image.to_rgb8().get_pixel(0, 0).0, [255, 255, 0]);
    }
}
