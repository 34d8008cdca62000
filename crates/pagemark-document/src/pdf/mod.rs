// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — opening documents, rendering page regions, extracting page
// ranges.

pub mod reader;
mod render;

pub use reader::{PdfDocument, PdfLibrary};
