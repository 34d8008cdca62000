// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pattern store — reference motifs and per-watcher settings persisted as one
// JSON object keyed by watcher id.
//
// Every write goes through a temporary file that is synced and renamed over
// the store, so a crash mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pagemark_core::error::{PagemarkError, Result};
use pagemark_core::{DEFAULT_PATTERN_ID, Pattern, WatcherConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// File name of the store inside the data directory.
pub const PATTERN_FILE: &str = "patterns.json";

/// Motif seeded as the DEFAULT pattern when the store is first created.
const DEFAULT_MOTIF: &[[i32; 2]] = &[
    [63, 56], [64, 56], [64, 57], [65, 58], [66, 58], [66, 59], [66, 60], [67, 60], [67, 61],
    [68, 62], [68, 63], [69, 63], [70, 64], [70, 65], [70, 66], [71, 67], [71, 68], [72, 69],
    [73, 70], [74, 71], [76, 72], [77, 74], [78, 75], [80, 77], [82, 78], [83, 80], [85, 81],
    [86, 82], [87, 83], [89, 85], [90, 86], [92, 88], [94, 90], [95, 92], [98, 94], [99, 96],
    [101, 97], [102, 99], [104, 101], [106, 102], [107, 104], [109, 105], [110, 108], [111, 109],
    [113, 110], [114, 112], [115, 113], [116, 115], [118, 116], [119, 117], [120, 118],
    [122, 119], [122, 121], [124, 122], [125, 124], [127, 125], [128, 126], [130, 128],
    [131, 129], [132, 130], [132, 131], [134, 133], [134, 134], [136, 135], [136, 136],
    [137, 137], [138, 137], [139, 139], [140, 140], [140, 141], [142, 142], [142, 143],
    [144, 144], [144, 145], [145, 146], [147, 146], [148, 148], [149, 148], [149, 149],
    [151, 150], [152, 152], [153, 152], [153, 153], [154, 154], [156, 155], [157, 156],
    [158, 157], [159, 158], [159, 159], [161, 160], [162, 161], [163, 162], [164, 163],
    [165, 163], [166, 164], [167, 165], [168, 166], [168, 167], [169, 167], [169, 168],
    [170, 168], [171, 168], [171, 170], [172, 171], [172, 172], [173, 172], [174, 172],
    [174, 173], [175, 173], [176, 174], [177, 175], [178, 175], [179, 177], [179, 178],
    [179, 179], [180, 179], [180, 180], [181, 180], [182, 181], [182, 182], [183, 182],
];

/// One entry of the store.
///
/// Fields other than the known ones are kept in `extra` and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternRecord {
    #[serde(default)]
    pub motif: Pattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_source: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PatternRecord {
    pub fn delete_source(&self) -> bool {
        self.delete_source.unwrap_or(false)
    }

    pub fn auto(&self) -> bool {
        self.auto.unwrap_or(false)
    }

    /// Watcher configuration, if both folders are set.
    pub fn watcher_config(&self, id: &str) -> Option<WatcherConfig> {
        let input = non_empty(self.input_dir.as_deref())?;
        let output = non_empty(self.output_dir.as_deref())?;
        Some(WatcherConfig::new(id, input, output, self.auto()))
    }

    /// Overlay the fields present in `update`.
    pub fn merge(&mut self, update: PatternUpdate) {
        if let Some(motif) = update.motif {
            self.motif = motif;
        }
        if let Some(input_dir) = update.input_dir {
            self.input_dir = Some(input_dir);
        }
        if let Some(output_dir) = update.output_dir {
            self.output_dir = Some(output_dir);
        }
        if let Some(auto) = update.auto {
            self.auto = Some(auto);
        }
        if let Some(delete_source) = update.delete_source {
            self.delete_source = Some(delete_source);
        }
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Partial update for [`PatternStore::set_pattern`]; `None` keeps the stored
/// value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternUpdate {
    pub motif: Option<Pattern>,
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub auto: Option<bool>,
    pub delete_source: Option<bool>,
}

impl PatternUpdate {
    pub fn motif(motif: Pattern) -> Self {
        Self {
            motif: Some(motif),
            ..Self::default()
        }
    }

    /// Settings of a watcher, leaving its motif alone.
    pub fn watcher(config: &WatcherConfig) -> Self {
        Self {
            input_dir: Some(config.input_dir.clone()),
            output_dir: Some(config.output_dir.clone()),
            auto: Some(config.auto_mode),
            ..Self::default()
        }
    }
}

/// JSON-file store of patterns, safe to share between watchers.
#[derive(Debug)]
pub struct PatternStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl PatternStore {
    /// Open (or create) the store in `dir`, seeding the DEFAULT pattern when
    /// the file does not exist yet.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let store = Self {
            path: dir.join(PATTERN_FILE),
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            info!(path = %store.path.display(), "seeding pattern store");
            let mut records = BTreeMap::new();
            records.insert(
                DEFAULT_PATTERN_ID.to_string(),
                PatternRecord {
                    motif: Pattern::from(DEFAULT_MOTIF.to_vec()),
                    ..PatternRecord::default()
                },
            );
            store.save_all(&records)?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the store. A missing file is an empty store.
    pub fn load_all(&self) -> Result<BTreeMap<String, PatternRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// The record for `id`, or the DEFAULT record when `id` is absent or has
    /// an empty motif. `None` when neither is usable or the store cannot be
    /// read.
    pub fn get_pattern(&self, id: &str) -> Option<PatternRecord> {
        match self.resolve(id) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(id, error = %e, "no usable pattern");
                None
            }
        }
    }

    /// Like [`get_pattern`](Self::get_pattern), failing with
    /// `PatternNotFound` instead of returning `None`.
    pub fn resolve(&self, id: &str) -> Result<PatternRecord> {
        let mut records = self.load_all()?;

        if let Some(record) = records.remove(id).filter(|r| !r.motif.is_empty()) {
            return Ok(record);
        }
        if let Some(record) = records
            .remove(DEFAULT_PATTERN_ID)
            .filter(|r| !r.motif.is_empty())
        {
            debug!(id, "falling back to the DEFAULT pattern");
            return Ok(record);
        }
        Err(PagemarkError::PatternNotFound(id.to_string()))
    }

    /// The record to segment with for `id`.
    ///
    /// Only the motif falls back to DEFAULT: a `delete_source` flag set on
    /// `id` itself always wins over the DEFAULT record's. Without any usable
    /// motif the record is empty, so the detector never fires and documents
    /// are left untouched. Store read failures still propagate.
    pub fn segmentation_record(&self, id: &str) -> Result<PatternRecord> {
        let own_delete_source = self
            .load_all()?
            .get(id)
            .and_then(|record| record.delete_source);

        let mut record = match self.resolve(id) {
            Ok(record) => record,
            Err(PagemarkError::PatternNotFound(_)) => {
                warn!(id, "no usable pattern; documents will be left untouched");
                PatternRecord::default()
            }
            Err(e) => return Err(e),
        };
        if own_delete_source.is_some() {
            record.delete_source = own_delete_source;
        }
        Ok(record)
    }

    /// Merge `update` into the record for `id`, creating it if needed, and
    /// return the stored result.
    #[instrument(skip(self, update))]
    pub fn set_pattern(&self, id: &str, update: PatternUpdate) -> Result<PatternRecord> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut records = self.load_all()?;

        let record = records.entry(id.to_string()).or_default();
        record.merge(update);
        let stored = record.clone();

        self.save_all(&records)?;
        Ok(stored)
    }

    /// Delete the record for `id`. Returns whether it existed.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");
        let mut records = self.load_all()?;
        if records.remove(id).is_none() {
            return Ok(false);
        }
        self.save_all(&records)?;
        Ok(true)
    }

    /// Watcher configurations of every non-DEFAULT record with both folders.
    pub fn watcher_configs(&self) -> Result<Vec<WatcherConfig>> {
        Ok(self
            .load_all()?
            .iter()
            .filter(|(id, _)| id.as_str() != DEFAULT_PATTERN_ID)
            .filter_map(|(id, record)| record.watcher_config(id))
            .collect())
    }

    fn save_all(&self, records: &BTreeMap<String, PatternRecord>) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");

        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(records = records.len(), "pattern store written");
        Ok(())
    }
}
