// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Marker detection — renders the two corner regions of a page and asks the
// shape matcher whether any highlighter stroke there looks like the
// reference pattern.

use pagemark_core::error::Result;
use pagemark_core::{ContourPolicy, DetectorConfig, Pattern};
use tracing::{debug, warn};

use crate::image::contour::ContourExtractor;
use crate::library::{PageDocument, PageRect};
use crate::raster::Raster;
use crate::shape::{MatchResult, ShapeMatcher};

/// The page corners inspected for a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopRight,
    BottomLeft,
}

impl Corner {
    /// Inspection order.
    pub const ALL: [Corner; 2] = [Corner::TopRight, Corner::BottomLeft];

    /// Square clip of side `size` in this corner of `page`, clamped to the
    /// page for pages smaller than the region.
    pub fn clip(self, page: &PageRect, size: f32) -> Option<PageRect> {
        let rect = match self {
            Corner::TopRight => PageRect::new(page.x1 - size, page.y0, page.x1, page.y0 + size),
            Corner::BottomLeft => PageRect::new(page.x0, page.y1 - size, page.x0 + size, page.y1),
        };
        page.intersect(&rect)
    }
}

/// Decides, page by page, whether the reference marker was drawn.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    pattern: Pattern,
    extractor: ContourExtractor,
    matcher: ShapeMatcher,
    region_size: f32,
    zoom: f32,
    policy: ContourPolicy,
}

impl MarkerDetector {
    pub fn new(pattern: Pattern, config: &DetectorConfig) -> Self {
        Self {
            pattern,
            extractor: ContourExtractor::from_config(config),
            matcher: ShapeMatcher::new(config.match_threshold),
            region_size: config.region_size,
            zoom: config.zoom,
            policy: config.contour_policy,
        }
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Judge one rendered region.
    ///
    /// Returns `None` when the region holds no candidate contour. With
    /// [`ContourPolicy::FirstOnly`] the first contour alone decides; with
    /// [`ContourPolicy::BestOf`] the closest contour does.
    pub fn judge_region(&self, raster: &Raster) -> Result<Option<MatchResult>> {
        let contours = self.extractor.extract(raster)?;
        let reference = self.pattern.points();

        let verdict = match self.policy {
            ContourPolicy::FirstOnly => contours
                .first()
                .map(|contour| self.matcher.compare(reference, contour.points())),
            ContourPolicy::BestOf => contours
                .iter()
                .map(|contour| self.matcher.compare(reference, contour.points()))
                .min_by(|a, b| a.distance.total_cmp(&b.distance)),
        };

        if let Some(result) = verdict {
            debug!(
                distance = result.distance,
                is_match = result.is_match,
                candidates = contours.len(),
                "region judged"
            );
        }
        Ok(verdict)
    }

    /// Whether page `index` carries the marker in either corner.
    ///
    /// Always false for an empty pattern. Region failures (unsupported
    /// raster layout, render errors) count as "no marker" for that region.
    pub fn page_has_marker(&self, document: &dyn PageDocument, index: usize) -> bool {
        if self.pattern.is_empty() {
            return false;
        }

        let page = match document.page_bounds(index) {
            Ok(page) => page,
            Err(e) => {
                warn!(page = index, error = %e, "cannot read page bounds; assuming no marker");
                return false;
            }
        };

        Corner::ALL.iter().any(|&corner| {
            let Some(clip) = corner.clip(&page, self.region_size) else {
                return false;
            };
            let verdict = document
                .render_region(index, clip, self.zoom)
                .and_then(|raster| self.judge_region(&raster));
            match verdict {
                Ok(Some(result)) => result.is_match,
                Ok(None) => false,
                Err(e) => {
                    warn!(page = index, ?corner, error = %e, "region detection failed");
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::path::Path;

    use image::{Rgb, RgbImage};
    use pagemark_core::Point;
    use pagemark_core::error::PagemarkError;

    use super::*;
    use crate::image::contour::tests::{paint, ring_raster};

    /// Corner points of a square, the shape the ring fixture compresses to.
    fn square_pattern() -> Pattern {
        Pattern::from(vec![[0, 0], [40, 0], [40, 40], [0, 40]])
    }

    fn stroke_pattern() -> Pattern {
        Pattern::new((0..60).map(|i| Point::new(i, i)).collect())
    }

    /// A document whose every region renders the same raster.
    struct StaticDoc {
        raster: Raster,
    }

    impl PageDocument for StaticDoc {
        fn page_count(&self) -> usize {
            1
        }
        fn page_bounds(&self, _index: usize) -> Result<PageRect> {
            Ok(PageRect::sized(595.0, 842.0))
        }
        fn render_region(&self, _index: usize, _clip: PageRect, _zoom: f32) -> Result<Raster> {
            Ok(self.raster.clone())
        }
        fn save_range(&self, _pages: Range<usize>, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn corner_clips_follow_page_box() {
        let page = PageRect::sized(600.0, 800.0);
        assert_eq!(
            Corner::TopRight.clip(&page, 100.0),
            Some(PageRect::new(500.0, 0.0, 600.0, 100.0))
        );
        assert_eq!(
            Corner::BottomLeft.clip(&page, 100.0),
            Some(PageRect::new(0.0, 700.0, 100.0, 800.0))
        );
        let tiny = PageRect::sized(50.0, 50.0);
        assert_eq!(Corner::TopRight.clip(&tiny, 100.0), Some(tiny));
    }

    #[test]
    fn ring_matches_square_pattern() {
        let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
        let verdict = detector.judge_region(&ring_raster(200)).unwrap().unwrap();
        assert!(verdict.is_match, "distance {}", verdict.distance);

        let doc = StaticDoc { raster: ring_raster(200) };
        assert!(detector.page_has_marker(&doc, 0));
    }

    #[test]
    fn dense_outline_differs_from_compressed_corners() {
        // Every pixel of a square outline: same shape, different density.
        let mut dense = Vec::new();
        for i in 0..40 {
            dense.push(Point::new(i, 0));
            dense.push(Point::new(40, i));
            dense.push(Point::new(40 - i, 40));
            dense.push(Point::new(0, 40 - i));
        }
        let detector = MarkerDetector::new(Pattern::new(dense), &DetectorConfig::default());
        let verdict = detector.judge_region(&ring_raster(200)).unwrap().unwrap();
        assert!(!verdict.is_match, "distance {}", verdict.distance);
    }

    #[test]
    fn ring_does_not_match_stroke_pattern() {
        let detector = MarkerDetector::new(stroke_pattern(), &DetectorConfig::default());
        let doc = StaticDoc { raster: ring_raster(200) };
        assert!(!detector.page_has_marker(&doc, 0));
    }

    #[test]
    fn empty_pattern_never_matches() {
        let detector = MarkerDetector::new(Pattern::empty(), &DetectorConfig::default());
        let doc = StaticDoc { raster: ring_raster(200) };
        assert!(!detector.page_has_marker(&doc, 0));
    }

    #[test]
    fn blank_region_has_no_verdict() {
        let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
        assert_eq!(detector.judge_region(&Raster::blank(100, 100)).unwrap(), None);
    }

    #[test]
    fn unsupported_raster_counts_as_no_marker() {
        let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
        let raster = Raster::new(4, 4, 1, vec![0; 16]).unwrap();
        assert!(matches!(
            detector.judge_region(&raster),
            Err(PagemarkError::UnsupportedChannelCount(1))
        ));
        assert!(!detector.page_has_marker(&StaticDoc { raster }, 0));
    }

    /// A diagonal stroke scanned first, then a square ring further down.
    fn stroke_then_ring() -> Raster {
        let mut img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for i in 0..40 {
            paint(&mut img, 10 + i, 5 + i, 18 + i, 13 + i);
        }
        paint(&mut img, 80, 90, 180, 98);
        paint(&mut img, 80, 182, 180, 190);
        paint(&mut img, 80, 90, 88, 190);
        paint(&mut img, 172, 90, 180, 190);
        Raster::from_rgb(img)
    }

    #[test]
    fn first_only_judges_the_first_contour() {
        let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
        let verdict = detector.judge_region(&stroke_then_ring()).unwrap().unwrap();
        assert!(!verdict.is_match);
    }

    #[test]
    fn best_of_finds_the_later_contour() {
        let config = DetectorConfig {
            contour_policy: ContourPolicy::BestOf,
            ..DetectorConfig::default()
        };
        let detector = MarkerDetector::new(square_pattern(), &config);
        let verdict = detector.judge_region(&stroke_then_ring()).unwrap().unwrap();
        assert!(verdict.is_match, "distance {}", verdict.distance);
    }
}
