// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document library seam — the operations the segmenter needs from a paged
// document backend. `PdfLibrary` is the production implementation; tests
// plug in in-memory documents.

use std::ops::Range;
use std::path::Path;

use pagemark_core::error::Result;

use crate::raster::Raster;

/// A rectangle in page space: points, origin at the top-left, y downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// A page box of the given size anchored at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Intersection with `other`, or `None` when they do not overlap.
    pub fn intersect(&self, other: &PageRect) -> Option<PageRect> {
        let rect = PageRect::new(
            self.x0.max(other.x0),
            self.y0.max(other.y0),
            self.x1.min(other.x1),
            self.y1.min(other.y1),
        );
        (rect.width() > 0.0 && rect.height() > 0.0).then_some(rect)
    }
}

/// Opens documents from the filesystem.
pub trait DocumentLibrary: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>>;
}

/// An opened, read-only paged document.
pub trait PageDocument {
    fn page_count(&self) -> usize;

    /// Page box of the 0-based page `index`.
    fn page_bounds(&self, index: usize) -> Result<PageRect>;

    /// Rasterise the `clip` region of page `index` at `zoom` pixels per
    /// point, with an alpha channel.
    fn render_region(&self, index: usize, clip: PageRect, zoom: f32) -> Result<Raster>;

    /// Write a new document made of the pages in `pages` (0-based,
    /// half-open) to `path`.
    fn save_range(&self, pages: Range<usize>, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_clamps_to_page() {
        let page = PageRect::sized(80.0, 60.0);
        let clip = PageRect::new(-20.0, 0.0, 80.0, 100.0);
        assert_eq!(page.intersect(&clip), Some(PageRect::new(0.0, 0.0, 80.0, 60.0)));
    }

    #[test]
    fn disjoint_rects_do_not_intersect() {
        let a = PageRect::sized(10.0, 10.0);
        let b = PageRect::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.intersect(&b), None);
    }
}
