// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open, inspect, render corner regions of, and extract page
// ranges from existing PDF documents using the `lopdf` crate.

use std::cell::RefCell;
use std::ops::Range;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use lopdf::{Dictionary, Document, Object, ObjectId};
use pagemark_core::error::{PagemarkError, Result};
use tracing::{debug, info, instrument};

use super::render;
use crate::library::{DocumentLibrary, PageDocument, PageRect};
use crate::raster::Raster;

/// Page size used when a page tree carries no usable /MediaBox (US Letter).
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Opens PDFs from disk with `lopdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLibrary;

impl PdfLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentLibrary for PdfLibrary {
    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>> {
        Ok(Box::new(PdfDocument::open(path)?))
    }
}

/// Decoded scan of the page rendered last.
struct CachedScan {
    page: usize,
    scan: Option<RgbaImage>,
}

/// A loaded PDF.
///
/// Wraps `lopdf::Document` and keeps the page object ids in page order so
/// that 0-based page indices map straight onto them.
pub struct PdfDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids, index 0 = first page.
    pages: Vec<ObjectId>,
    /// Source path (useful for diagnostics).
    source_path: PathBuf,
    /// Pages are inspected in order, corner after corner, so one entry is
    /// enough to decode every scan once.
    scan_cache: RefCell<Option<CachedScan>>,
}

impl PdfDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| PagemarkError::DocumentOpen {
            path: path_ref.to_path_buf(),
            reason: err.to_string(),
        })?;

        // lopdf pages are keyed by 1-indexed page number, in order.
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = pages.len(), "PDF loaded");

        Ok(Self {
            document,
            pages,
            source_path: path_ref.to_path_buf(),
            scan_cache: RefCell::new(None),
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages.get(index).copied().ok_or_else(|| {
            PagemarkError::Render(format!(
                "page {} out of range (document has {} pages)",
                index,
                self.pages.len()
            ))
        })
    }

    /// Media box and visible (crop) box of page `index`, in page space with
    /// the origin at the top-left of the media box.
    fn page_boxes(&self, index: usize) -> Result<(PageRect, PageRect)> {
        let page_id = self.page_id(index)?;
        let media =
            inherited_box(&self.document, page_id, b"MediaBox").unwrap_or(FALLBACK_MEDIA_BOX);
        let crop = inherited_box(&self.document, page_id, b"CropBox");
        Ok(page_space_boxes(media, crop))
    }

    fn page_dict(&self, index: usize) -> Result<&Dictionary> {
        let page_id = self.page_id(index)?;
        self.document
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|err| PagemarkError::Render(format!("cannot read page {index}: {err}")))
    }

    // -- Extraction -----------------------------------------------------------

    /// Build a standalone document holding only the pages in `range`.
    ///
    /// Clones the whole document, deletes every page outside the range, then
    /// drops the objects nothing references any more.
    fn extract_range(&self, range: &Range<usize>) -> Result<Document> {
        let mut extracted = self.document.clone();
        let doomed: Vec<u32> = (0..self.pages.len())
            .filter(|index| !range.contains(index))
            .map(|index| index as u32 + 1)
            .collect();

        extracted.delete_pages(&doomed);
        extracted.prune_objects();
        extracted.renumber_objects();
        Ok(extracted)
    }
}

impl PageDocument for PdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, index: usize) -> Result<PageRect> {
        let (_, visible) = self.page_boxes(index)?;
        Ok(visible)
    }

    fn render_region(&self, index: usize, clip: PageRect, zoom: f32) -> Result<Raster> {
        let (media, _) = self.page_boxes(index)?;

        let mut cache = self.scan_cache.borrow_mut();
        let cached = matches!(cache.as_ref(), Some(entry) if entry.page == index);
        if !cached {
            let scan = render::page_scan(&self.document, self.page_dict(index)?);
            debug!(page = index, decoded = scan.is_some(), "page scan loaded");
            *cache = Some(CachedScan { page: index, scan });
        }

        let scan = cache.as_ref().and_then(|entry| entry.scan.as_ref());
        render::render_region(scan, media, clip, zoom)
    }

    #[instrument(skip(self, path), fields(source = %self.source_path.display(), dest = %path.display()))]
    fn save_range(&self, pages: Range<usize>, path: &Path) -> Result<()> {
        if pages.start >= pages.end || pages.end > self.pages.len() {
            return Err(PagemarkError::DocumentSave {
                path: path.to_path_buf(),
                reason: format!(
                    "page range {}..{} invalid for {} page document",
                    pages.start,
                    pages.end,
                    self.pages.len()
                ),
            });
        }

        let mut extracted = self.extract_range(&pages)?;
        extracted
            .save(path)
            .map_err(|err| PagemarkError::DocumentSave {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        debug!(start = pages.start, end = pages.end, "page range saved");
        Ok(())
    }
}

/// Resolve the rectangle `key` (`/MediaBox`, `/CropBox`) on the page or the
/// nearest ancestor in the page tree.
fn inherited_box(document: &Document, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
    let mut current = Some(page_id);
    // Page trees are shallow; the bound only guards against /Parent cycles.
    for _ in 0..32 {
        let id = current?;
        let dict = document.get_object(id).and_then(Object::as_dict).ok()?;
        if let Some(rect) = dict
            .get(key)
            .ok()
            .and_then(|obj| resolve(document, obj))
            .and_then(number_quad)
        {
            return Some(rect);
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
    }
    None
}

/// Convert PDF boxes (origin bottom-left, y up) to page space (origin at the
/// media box's top-left, y down). The visible box is the crop box clipped to
/// the media box, or the whole media box without a usable crop box.
fn page_space_boxes(media: [f32; 4], crop: Option<[f32; 4]>) -> (PageRect, PageRect) {
    let [mx0, my0, mx1, my1] = normalized(media);
    let page = PageRect::sized(mx1 - mx0, my1 - my0);

    let visible = crop
        .map(normalized)
        .map(|[cx0, cy0, cx1, cy1]| PageRect::new(cx0 - mx0, my1 - cy1, cx1 - mx0, my1 - cy0))
        .and_then(|rect| page.intersect(&rect))
        .unwrap_or(page);
    (page, visible)
}

fn normalized([x0, y0, x1, y1]: [f32; 4]) -> [f32; 4] {
    [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
}

/// Follow a single level of indirection.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn number_quad(object: &Object) -> Option<[f32; 4]> {
    let items = object.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    Some([
        number(&items[0])?,
        number(&items[1])?,
        number(&items[2])?,
        number(&items[3])?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_file_is_a_document_open_error() {
        let err = PdfDocument::open("/definitely/not/here.pdf").err().unwrap();
        assert!(matches!(err, PagemarkError::DocumentOpen { .. }));
    }

    #[test]
    fn open_garbage_is_a_document_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        let err = PdfLibrary::new().open(&path).err().unwrap();
        assert!(matches!(err, PagemarkError::DocumentOpen { .. }));
    }

    #[test]
    fn crop_box_is_measured_from_the_media_box_top_left() {
        let (media, visible) =
            page_space_boxes([0.0, 0.0, 600.0, 800.0], Some([50.0, 100.0, 550.0, 780.0]));
        assert_eq!(media, PageRect::sized(600.0, 800.0));
        assert_eq!(visible, PageRect::new(50.0, 20.0, 550.0, 700.0));
    }

    #[test]
    fn crop_box_is_clipped_or_ignored() {
        let media = [0.0, 0.0, 200.0, 200.0];
        let (_, visible) = page_space_boxes(media, Some([100.0, 100.0, 400.0, 400.0]));
        assert_eq!(visible, PageRect::new(100.0, 0.0, 200.0, 100.0));

        let (page, visible) = page_space_boxes(media, Some([300.0, 300.0, 400.0, 400.0]));
        assert_eq!(visible, page);
        let (page, visible) = page_space_boxes(media, None);
        assert_eq!(visible, page);
    }

    #[test]
    fn flipped_boxes_are_normalized() {
        let (media, _) = page_space_boxes([612.0, 792.0, 0.0, 0.0], None);
        assert_eq!(media, PageRect::sized(612.0, 792.0));
    }

    #[test]
    fn media_box_quad_accepts_mixed_numbers() {
        let quad = Object::Array(vec![
            Object::Integer(0),
            Object::Real(0.0),
            Object::Integer(595),
            Object::Real(842.0),
        ]);
        assert_eq!(number_quad(&quad), Some([0.0, 0.0, 595.0, 842.0]));
        assert_eq!(number_quad(&Object::Array(vec![Object::Integer(1)])), None);
    }
}
