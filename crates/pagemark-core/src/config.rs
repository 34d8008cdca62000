// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the detector judges a region that yields several contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourPolicy {
    /// Only the first contour in extraction order is judged.
    #[default]
    FirstOnly,
    /// Every contour is compared and the smallest distance decides.
    BestOf,
}

/// Tunables of the marker detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Inclusive lower HSV bound (H in 0..180, S and V in 0..=255).
    pub hsv_lower: [u8; 3],
    /// Inclusive upper HSV bound.
    pub hsv_upper: [u8; 3],
    /// Side of the square corner regions, in page points.
    pub region_size: f32,
    /// Render multiplier applied to the corner regions.
    pub zoom: f32,
    /// Hausdorff distance below which two shapes match.
    pub match_threshold: f64,
    pub contour_policy: ContourPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            hsv_lower: [21, 60, 90],
            hsv_upper: [48, 255, 255],
            region_size: 100.0,
            zoom: 2.0,
            match_threshold: 0.40,
            contour_policy: ContourPolicy::FirstOnly,
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interval between two snapshots of a watched folder.
    pub poll_interval_ms: u64,
    /// Extension (without dot) of the documents a watcher picks up.
    pub document_extension: String,
    pub detector: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            document_extension: "pdf".into(),
            detector: DetectorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Whether `file_name` carries the recognised document extension
    /// (case-insensitive).
    pub fn is_document_name(&self, file_name: &str) -> bool {
        let suffix = format!(".{}", self.document_extension.to_ascii_lowercase());
        file_name.to_ascii_lowercase().ends_with(&suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_highlighter_tuning() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.detector.hsv_lower, [21, 60, 90]);
        assert_eq!(config.detector.hsv_upper, [48, 255, 255]);
        assert!((config.detector.match_threshold - 0.40).abs() < f64::EPSILON);
    }

    #[test]
    fn document_names_are_case_insensitive() {
        let config = AppConfig::default();
        assert!(config.is_document_name("scan.pdf"));
        assert!(config.is_document_name("SCAN.PDF"));
        assert!(!config.is_document_name("scan.pdf.part"));
        assert!(!config.is_document_name("notes.txt"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"poll_interval_ms": 500, "detector": {"zoom": 3.0}}"#)
                .unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.document_extension, "pdf");
        assert_eq!(config.detector.zoom, 3.0);
        assert_eq!(config.detector.region_size, 100.0);
    }
}
