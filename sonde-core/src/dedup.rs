//! Persisted record of sonde ids that have already been alerted on.
//!
//! Stored as a pretty-printed JSON object mapping id to `true`. A missing
//! file is an empty record. Saves go to a sibling temp file which is then
//! renamed over the target, so readers see either the old or the new record.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{Result, SondeError};

/// In-memory view of the dedup file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupRecord {
    entries: BTreeMap<String, bool>,
}

impl DedupRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_notified(&self, id: &str) -> bool {
        self.entries.get(id).copied().unwrap_or(false)
    }

    pub fn mark_notified(&mut self, id: &str) {
        self.entries.insert(id.to_string(), true);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// File-backed dedup store. One store per tracked entity.
#[derive(Debug, Clone)]
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DedupStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. Returns an empty record if the file doesn't exist.
    pub fn load(&self) -> Result<DedupRecord> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DedupRecord::new()),
            Err(e) => return Err(self.error(e)),
        };
        if text.trim().is_empty() {
            return Ok(DedupRecord::new());
        }
        serde_json::from_str(&text).map_err(|e| self.error(e))
    }

    /// Overwrite the stored record with `record`.
    pub fn save(&self, record: &DedupRecord) -> Result<()> {
        let text = serde_json::to_string_pretty(record).map_err(|e| self.error(e))?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, text).map_err(|e| self.error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            self.error(e)
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "notified.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, e: impl ToString) -> SondeError {
        SondeError::storage(self.path.display(), e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
