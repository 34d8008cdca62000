// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watcher registry — owns every watcher, keyed by id.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{PollState, WatcherConfig};
use pagemark_document::Segmenter;
use tracing::{info, warn};

use crate::store::PatternStore;
use crate::watcher::{WatcherDirectory, WatcherHandle};

/// The set of watchers of one running application.
///
/// Constructed once and shared by `Arc`; ids are unique.
pub struct WatcherRegistry {
    watchers: RwLock<HashMap<String, WatcherHandle>>,
    segmenter: Segmenter,
    store: Arc<PatternStore>,
    poll_interval: Duration,
}

impl WatcherRegistry {
    pub fn new(segmenter: Segmenter, store: Arc<PatternStore>) -> Self {
        let poll_interval = segmenter.config().poll_interval();
        Self {
            watchers: RwLock::new(HashMap::new()),
            segmenter,
            store,
            poll_interval,
        }
    }

    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Register and spawn a watcher. Fails with `DuplicateId` when the id is
    /// taken; the check and the insert happen under one write lock. A watcher
    /// writing into its own input folder is rejected with `Config`, since it
    /// would pick up its own outputs.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn add(&self, config: WatcherConfig) -> Result<WatcherHandle> {
        if same_dir(&config.input_dir, &config.output_dir) {
            return Err(PagemarkError::Config(format!(
                "watcher '{}' would write into its own input folder {}",
                config.id,
                config.input_dir.display()
            )));
        }

        let mut watchers = self.watchers.write().expect("registry lock poisoned");
        if watchers.contains_key(&config.id) {
            return Err(PagemarkError::DuplicateId(config.id));
        }

        let id = config.id.clone();
        let handle = WatcherDirectory::spawn(
            config,
            self.segmenter.clone(),
            Arc::clone(&self.store),
            self.poll_interval,
        );
        watchers.insert(id.clone(), handle.clone());
        info!(watcher = %id, total = watchers.len(), "watcher added");
        Ok(handle)
    }

    /// Stop and drop the watcher `id`. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let Some(handle) = self.get(id) else {
            return Ok(false);
        };
        handle.shutdown().await?;
        self.watchers
            .write()
            .expect("registry lock poisoned")
            .remove(id);
        info!(watcher = %id, "watcher removed");
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<WatcherHandle> {
        self.watchers
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Whether any watcher is segmenting a document right now.
    pub fn any_running(&self) -> bool {
        self.watchers
            .read()
            .expect("registry lock poisoned")
            .values()
            .any(|handle| handle.state() == PollState::Processing)
    }

    /// Whether any watcher has a live poll loop.
    pub fn any_active(&self) -> bool {
        self.watchers
            .read()
            .expect("registry lock poisoned")
            .values()
            .any(|handle| handle.state().is_active())
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .watchers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn handles(&self) -> Vec<WatcherHandle> {
        let mut handles: Vec<WatcherHandle> = self
            .watchers
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        handles.sort_by(|a, b| a.id().cmp(b.id()));
        handles
    }

    pub fn len(&self) -> usize {
        self.watchers.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start every watcher in auto mode. Returns the number of poll loops
    /// spawned; per-watcher failures are logged.
    pub async fn start_all(&self) -> usize {
        let mut started = 0;
        for handle in self.handles() {
            match handle.start().await {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!(watcher = %handle.id(), error = %e, "watcher failed to start"),
            }
        }
        started
    }

    /// Stop every watcher, wait for each, and empty the registry.
    pub async fn shutdown(&self) {
        let handles: Vec<WatcherHandle> = self
            .watchers
            .write()
            .expect("registry lock poisoned")
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        info!(count = handles.len(), "shutting down watchers");
        for handle in handles {
            if let Err(e) = handle.shutdown().await {
                warn!(watcher = %handle.id(), error = %e, "watcher did not shut down cleanly");
            }
        }
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
