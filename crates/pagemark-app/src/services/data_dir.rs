// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "PAGEMARK_DATA_DIR";

/// Return the application data directory, creating it if needed.
///
/// An explicit path wins; otherwise `PAGEMARK_DATA_DIR`, then the XDG data
/// directory, then `~/.local/share`.
pub fn data_dir(explicit: Option<&Path>) -> PathBuf {
    let dir = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(DATA_DIR_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => dirs_fallback().join("pagemark"),
        },
    };
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
