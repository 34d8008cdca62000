// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — highlighter mask construction and contour extraction.

pub mod contour;
pub mod mask;

pub use contour::{Contour, ContourExtractor};
