// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagemark-document — Marker detection and document segmentation.
//
// Finds a hand-drawn highlighter mark in the corners of each page (HSV mask,
// hit-or-miss thinning, outer contours, Hausdorff shape matching) and splits
// PDFs at the marked pages using the `lopdf` crate.

pub mod detect;
pub mod image;
pub mod library;
pub mod pdf;
pub mod raster;
pub mod segment;
pub mod shape;

// Re-export the primary structs so callers can use `pagemark_document::Segmenter` etc.
pub use detect::{Corner, MarkerDetector};
pub use crate::image::contour::{Contour, ContourExtractor};
pub use library::{DocumentLibrary, PageDocument, PageRect};
pub use pdf::reader::{PdfDocument, PdfLibrary};
pub use raster::Raster;
pub use segment::{DirectoryReport, SegmentJob, Segmenter, SplitOutcome, SplitPlan};
pub use shape::{MatchResult, ShapeMatcher};
