// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagemark.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Pagemark operations.
#[derive(Debug, Error)]
pub enum PagemarkError {
    // -- Detection errors --
    #[error("unsupported raster channel count: {0} (expected 3 or 4)")]
    UnsupportedChannelCount(u8),

    #[error("page rendering failed: {0}")]
    Render(String),

    // -- Document errors --
    #[error("failed to open document {}: {reason}", path.display())]
    DocumentOpen { path: PathBuf, reason: String },

    #[error("failed to save document {}: {reason}", path.display())]
    DocumentSave { path: PathBuf, reason: String },

    #[error("failed to delete source file {}: {source}", path.display())]
    SourceDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Patterns and watchers --
    #[error("no usable pattern for '{0}' and no DEFAULT pattern")]
    PatternNotFound(String),

    #[error("a watcher with id '{0}' is already registered")]
    DuplicateId(String),

    #[error("no watcher with id '{0}'")]
    WatcherNotFound(String),

    #[error("watcher '{0}' is no longer running its control task")]
    WatcherUnavailable(String),

    #[error("input directory {} is unavailable: {source}", path.display())]
    InputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // -- Storage / configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagemarkError>;
