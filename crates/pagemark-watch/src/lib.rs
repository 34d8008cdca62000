// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagemark-watch — Folder watchers and their persistence.
//
// Each watched folder pair runs as a small actor owning at most one poll
// loop. The registry owns every watcher; the pattern store keeps reference
// motifs and watcher settings in a JSON file.

pub mod registry;
pub mod store;
pub mod watcher;

pub use registry::WatcherRegistry;
pub use store::{PatternRecord, PatternStore, PatternUpdate};
pub use watcher::{WatcherDirectory, WatcherHandle};
