// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour extraction — raster region to highlighter mask to outer boundary
// contours, using `imageproc`'s border following.

use imageproc::contours::{self, BorderType};
use pagemark_core::DetectorConfig;
use pagemark_core::Point;
use pagemark_core::error::Result;
use tracing::{debug, instrument};

use super::mask;
use crate::raster::Raster;

/// An ordered boundary traced around one connected mask component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Turns a rendered page region into the outer contours of every highlighter
/// stroke found in it.
///
/// Pipeline:
///
/// 1. Drop alpha (rasters must be RGB or RGBA)
/// 2. HSV range threshold to a binary mask
/// 3. Thinning: erosion by the full 3x3 neighbourhood
/// 4. Border following, keeping outermost borders only
/// 5. Straight runs collapsed to their end points
#[derive(Debug, Clone)]
pub struct ContourExtractor {
    hsv_lower: [u8; 3],
    hsv_upper: [u8; 3],
}

impl Default for ContourExtractor {
    fn default() -> Self {
        Self::from_config(&DetectorConfig::default())
    }
}

impl ContourExtractor {
    pub fn new(hsv_lower: [u8; 3], hsv_upper: [u8; 3]) -> Self {
        Self {
            hsv_lower,
            hsv_upper,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.hsv_lower, config.hsv_upper)
    }

    /// Extract outer contours in raster-scan order of their starting pixel.
    ///
    /// Fails with `UnsupportedChannelCount` for rasters that are not RGB or
    /// RGBA.
    #[instrument(skip_all, fields(width = raster.width(), height = raster.height(), channels = raster.channels()))]
    pub fn extract(&self, raster: &Raster) -> Result<Vec<Contour>> {
        let rgb = raster.to_rgb()?;
        let marker_mask = mask::hsv_in_range(&rgb, self.hsv_lower, self.hsv_upper);
        let thinned = mask::thin(&marker_mask);

        let found: Vec<Contour> = contours::find_contours::<i32>(&thinned)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                let traced: Vec<Point> = c.points.iter().map(|p| Point::new(p.x, p.y)).collect();
                Contour::new(compress_runs(&traced))
            })
            .filter(|c| !c.is_empty())
            .collect();

        debug!(contours = found.len(), "contours extracted");
        Ok(found)
    }
}

/// Collapse every horizontal, vertical or diagonal run of a closed boundary
/// to its end points, keeping only the pixels where the direction changes.
///
/// The starting pixel is always kept. A trailing repeat of the start is
/// dropped.
pub fn compress_runs(points: &[Point]) -> Vec<Point> {
    let mut points = points;
    if points.len() > 1 && points.first() == points.last() {
        points = &points[..points.len() - 1];
    }
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let step = |from: Point, to: Point| ((to.x - from.x).signum(), (to.y - from.y).signum());
    let mut kept = vec![points[0]];
    for i in 1..n {
        let incoming = step(points[i - 1], points[i]);
        let outgoing = step(points[i], points[(i + 1) % n]);
        if incoming != outgoing {
            kept.push(points[i]);
        }
    }
    kept
}
