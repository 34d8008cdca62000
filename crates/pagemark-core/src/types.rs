// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Pagemark.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the fallback pattern used when a watcher has no motif of its own.
pub const DEFAULT_PATTERN_ID: &str = "DEFAULT";

/// An integer point in drawing or raster coordinates.
///
/// Serialised as a two-element `[x, y]` array, which is how patterns are
/// stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// A hand-drawn reference shape.
///
/// Point order is drawing order and is significant: it defines the topology
/// of the stroke, not just a set of samples.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    points: Vec<Point>,
}

impl Pattern {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl From<Vec<[i32; 2]>> for Pattern {
    fn from(pairs: Vec<[i32; 2]>) -> Self {
        Self::new(pairs.into_iter().map(Point::from).collect())
    }
}

/// Lifecycle states of a folder watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// No poll loop is running.
    Idle,
    /// Poll loop active, nothing in flight.
    Watching,
    /// A detected document is being segmented.
    Processing,
}

impl PollState {
    /// Whether a poll loop is alive in this state.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Watching => "watching",
            Self::Processing => "processing",
        };
        f.write_str(label)
    }
}

/// Static configuration of one watched folder pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Unique watcher id; also the key of its pattern record.
    pub id: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Only watchers in auto mode start polling.
    pub auto_mode: bool,
}

impl WatcherConfig {
    pub fn new(
        id: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        auto_mode: bool,
    ) -> Self {
        Self {
            id: id.into(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            auto_mode,
        }
    }
}

/// Snapshot of a watcher's runtime state, published after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherStatus {
    pub state: PollState,
    pub auto_mode: bool,
    /// Number of poll loops ever spawned for this watcher.
    pub loops_started: u64,
    /// Documents that went through the segmenter without error.
    pub files_processed: u64,
    /// Documents whose segmentation failed.
    pub files_failed: u64,
    /// Most recent error, fatal or per-file.
    pub last_error: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl WatcherStatus {
    pub fn idle(auto_mode: bool) -> Self {
        Self {
            state: PollState::Idle,
            auto_mode,
            loops_started: 0,
            files_processed: 0,
            files_failed: 0,
            last_error: None,
            last_activity: None,
        }
    }
}
