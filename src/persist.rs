// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence helper (§4.7, §11): a client-side snapshot/restore utility
//! for a whitelist of state keys. Not wired into the hub's own startup —
//! the hub performs no automatic persistence (§1 Non-goals) — this is a
//! library item for other fleet binaries to use against their own copy of
//! the state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Snapshots a whitelist of state keys to a JSON file and can pre-populate
/// a fresh set of entries from that file on construction.
pub struct PersistenceHelper {
    file_path: PathBuf,
    persisted_keys: Vec<String>,
}

impl PersistenceHelper {
    /// Load `file_path` (if it exists) and return the helper along with
    /// whatever entries among `persisted_keys` it found, for the caller to
    /// pre-populate its own store with.
    pub fn load(file_path: impl Into<PathBuf>, persisted_keys: Vec<String>) -> (Self, HashMap<String, Value>) {
        let file_path = file_path.into();
        let loaded = Self::read_existing(&file_path, &persisted_keys);
        (Self { file_path, persisted_keys }, loaded)
    }

    fn read_existing(file_path: &Path, persisted_keys: &[String]) -> HashMap<String, Value> {
        if !file_path.exists() {
            return HashMap::new();
        }

        let Ok(text) = std::fs::read_to_string(file_path) else {
            return HashMap::new();
        };
        let Ok(Value::Object(parsed)) = serde_json::from_str(&text) else {
            return HashMap::new();
        };

        persisted_keys
            .iter()
            .filter_map(|key| parsed.get(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    /// Serialize the given whitelist of current values to the file, keeping
    /// only the keys this helper was configured to persist.
    pub fn persist(&self, current: &HashMap<String, Value>) -> std::io::Result<()> {
        let snapshot: serde_json::Map<String, Value> = self
            .persisted_keys
            .iter()
            .filter_map(|key| current.get(key).map(|v| (key.clone(), v.clone())))
            .collect();
        let text = serde_json::to_string(&Value::Object(snapshot))?;
        std::fs::write(&self.file_path, text)
    }
}
