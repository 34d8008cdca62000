// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shape matching — centroid/scale normalisation and the symmetric Hausdorff
// distance between two point sequences.

use pagemark_core::Point;

/// Default distance below which a detected contour counts as the marker.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.40;

/// Outcome of comparing a reference pattern with one detected contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Symmetric Hausdorff distance between the normalised shapes.
    pub distance: f64,
    pub is_match: bool,
}

/// Compares shapes independently of their position and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMatcher {
    threshold: f64,
}

impl Default for ShapeMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl ShapeMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Normalise both shapes and compare them.
    ///
    /// An empty side cannot be compared: the distance is infinite and the
    /// result never matches.
    pub fn compare(&self, reference: &[Point], detected: &[Point]) -> MatchResult {
        let distance = if reference.is_empty() || detected.is_empty() {
            f64::INFINITY
        } else {
            hausdorff_distance(&normalize(reference), &normalize(detected))
        };
        self.judge(distance)
    }

    /// Apply the decision rule to a precomputed distance.
    pub fn judge(&self, distance: f64) -> MatchResult {
        MatchResult {
            distance,
            is_match: distance < self.threshold,
        }
    }
}

/// Translate the centroid to the origin and scale so that the farthest point
/// lies on the unit circle. Coincident points are only translated.
pub fn normalize(points: &[Point]) -> Vec<[f64; 2]> {
    if points.is_empty() {
        return Vec::new();
    }

    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let mut centred: Vec<[f64; 2]> = points
        .iter()
        .map(|p| [p.x as f64 - cx, p.y as f64 - cy])
        .collect();

    let max_dist = centred
        .iter()
        .map(|[x, y]| x.hypot(*y))
        .fold(0.0_f64, f64::max);

    if max_dist > 0.0 {
        for point in &mut centred {
            point[0] /= max_dist;
            point[1] /= max_dist;
        }
    }

    centred
}

/// Largest distance from a point of `a` to its nearest point of `b`.
pub fn directed_hausdorff(a: &[[f64; 2]], b: &[[f64; 2]]) -> f64 {
    a.iter()
        .map(|[ax, ay]| {
            b.iter()
                .map(|[bx, by]| (ax - bx).hypot(ay - by))
                .fold(f64::INFINITY, f64::min)
        })
        .fold(0.0_f64, f64::max)
}

/// `max(h(a, b), h(b, a))`.
pub fn hausdorff_distance(a: &[[f64; 2]], b: &[[f64; 2]]) -> f64 {
    directed_hausdorff(a, b).max(directed_hausdorff(b, a))
}
