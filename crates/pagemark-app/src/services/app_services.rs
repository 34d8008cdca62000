// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — loads configuration and the pattern store, builds
// the watcher registry, and offers the operations the command line calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{AppConfig, Pattern, WatcherConfig, WatcherStatus};
use pagemark_document::{DirectoryReport, SegmentJob, Segmenter, SplitOutcome};
use pagemark_watch::{PatternStore, PatternUpdate, WatcherRegistry};
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";

/// Shared application services.
///
/// Every field is cheaply cloneable so the struct can move into blocking
/// tasks.
#[derive(Clone)]
pub struct AppServices {
    data_dir: PathBuf,
    config: Arc<AppConfig>,
    store: Arc<PatternStore>,
    segmenter: Segmenter,
    registry: Arc<WatcherRegistry>,
}

impl AppServices {
    /// Initialise all services. Call once, inside the Tokio runtime.
    ///
    /// Loads (or writes the default) `config.json`, opens the pattern store
    /// and registers one watcher per stored watcher record. Watchers are not
    /// started.
    pub fn init(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        info!(path = %data_dir.display(), "initialising services");

        let config = match load_config(&data_dir) {
            Some(config) => config,
            None => {
                let config = AppConfig::default();
                if let Err(e) = persist_config(&data_dir, &config) {
                    warn!(error = %e, "could not write default configuration");
                }
                config
            }
        };

        let store = Arc::new(PatternStore::open(&data_dir)?);
        let segmenter = Segmenter::pdf(&config);
        let registry = Arc::new(WatcherRegistry::new(segmenter.clone(), Arc::clone(&store)));

        for watcher in store.watcher_configs()? {
            let id = watcher.id.clone();
            if let Err(e) = registry.add(watcher) {
                warn!(watcher = %id, error = %e, "skipping stored watcher");
            }
        }
        info!(watchers = registry.len(), "services initialised");

        Ok(Self {
            data_dir,
            config: Arc::new(config),
            store,
            segmenter,
            registry,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WatcherRegistry> {
        &self.registry
    }

    // -- Daemon --------------------------------------------------------------

    /// Start every auto-mode watcher and keep them running until `shutdown`
    /// resolves, then stop them all.
    pub async fn run_until(&self, shutdown: impl std::future::Future<Output = ()>) {
        let started = self.registry.start_all().await;
        info!(started, registered = self.registry.len(), "watchers running");

        shutdown.await;

        info!("shutdown requested");
        self.registry.shutdown().await;
    }

    // -- One-shot segmentation -----------------------------------------------

    /// Split one document with the pattern stored under `pattern_id`
    /// (DEFAULT fallback). `delete_source` overrides the stored flag.
    pub fn split_file(
        &self,
        input: &Path,
        output_dir: &Path,
        pattern_id: &str,
        delete_source: Option<bool>,
    ) -> Result<SplitOutcome> {
        let record = self.store.segmentation_record(pattern_id)?;
        let job = SegmentJob {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            delete_source: delete_source.unwrap_or_else(|| record.delete_source()),
            pattern: record.motif,
        };
        self.segmenter.split(&job)
    }

    /// Run one manual pass of watcher `id` over its input folder.
    pub async fn process_now(&self, id: &str) -> Result<DirectoryReport> {
        let handle = self
            .registry
            .get(id)
            .ok_or_else(|| PagemarkError::WatcherNotFound(id.to_string()))?;
        handle.process_now().await
    }

    // -- Watcher management --------------------------------------------------

    /// Register a new watcher and persist its settings.
    pub fn add_watcher(&self, config: WatcherConfig, delete_source: bool) -> Result<()> {
        let id = config.id.clone();
        let mut update = PatternUpdate::watcher(&config);
        update.delete_source = Some(delete_source);

        self.registry.add(config)?;
        self.store.set_pattern(&id, update)?;
        info!(watcher = %id, "watcher saved");
        Ok(())
    }

    /// Stop, unregister and forget watcher `id`.
    pub async fn remove_watcher(&self, id: &str) -> Result<bool> {
        let registered = self.registry.remove(id).await?;
        let stored = self.store.remove(id)?;
        Ok(registered || stored)
    }

    /// Every registered watcher with its current status, sorted by id.
    pub fn watchers(&self) -> Vec<(WatcherConfig, WatcherStatus)> {
        self.registry
            .handles()
            .into_iter()
            .map(|handle| (handle.config().clone(), handle.status()))
            .collect()
    }

    /// Replace the motif stored under `id`.
    pub fn set_pattern(&self, id: &str, motif: Pattern) -> Result<usize> {
        let record = self.store.set_pattern(id, PatternUpdate::motif(motif))?;
        Ok(record.motif.len())
    }
}

/// Parse a motif given as a JSON array of `[x, y]` pairs.
pub fn parse_motif(json: &str) -> Result<Pattern> {
    Ok(serde_json::from_str(json)?)
}

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed configuration");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
