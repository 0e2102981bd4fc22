// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared key/value state store (§4.2).
//!
//! Owned exclusively by the dispatcher — nothing outside `dispatcher` holds
//! a mutable reference to a `StateStore`, which is what gives the hub its
//! single-writer discipline (§5) without an explicit lock: the store lives
//! inside the dispatcher task and every mutation is a method call in its
//! command loop.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Reserved key published by the hub itself (§3).
pub const HUB_STATS_KEY: &str = "hub_stats";
/// Reserved key published by the hub itself (§3).
pub const SUBSYSTEM_STATS_KEY: &str = "subsystem_stats";

/// A single state entry: an opaque value plus the wall-clock time it was
/// last written.
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub value: Value,
    pub updated_at: f64,
}

/// The hub's in-memory key/value store.
///
/// Writes replace a key's value wholesale (§3 "no structural merge") and
/// always stamp `updated_at`. Keys are created lazily on first write, except
/// for the two reserved keys seeded at construction (§11).
pub struct StateStore {
    entries: HashMap<String, StateEntry>,
}

impl StateStore {
    /// Seed the store with the reserved keys the hub itself publishes.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            HUB_STATS_KEY.to_owned(),
            StateEntry { value: serde_json::json!({"state_updates_recv": 0}), updated_at: now() },
        );
        entries.insert(
            SUBSYSTEM_STATS_KEY.to_owned(),
            StateEntry { value: Value::Object(Map::new()), updated_at: now() },
        );
        Self { entries }
    }

    /// Replace `key`'s value wholesale and stamp `updated_at`.
    pub fn set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_owned(), StateEntry { value, updated_at: now() });
    }

    /// Current value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Snapshot of the requested keys (absent keys are simply omitted), or
    /// the entire store when `keys` is `None` or empty — the wire contract
    /// for `getState`'s empty-list boundary case (§8).
    pub fn snapshot(&self, keys: Option<&[String]>) -> Map<String, Value> {
        match keys {
            Some(requested) if !requested.is_empty() => requested
                .iter()
                .filter_map(|k| self.entries.get(k).map(|e| (k.clone(), e.value.clone())))
                .collect(),
            _ => self.entries.iter().map(|(k, e)| (k.clone(), e.value.clone())).collect(),
        }
    }

    /// Increment `hub_stats.state_updates_recv` and restamp it (§3 invariant).
    pub fn record_state_update(&mut self) {
        let entry = self
            .entries
            .entry(HUB_STATS_KEY.to_owned())
            .or_insert_with(|| StateEntry { value: serde_json::json!({}), updated_at: now() });

        let count = entry.value.get("state_updates_recv").and_then(Value::as_i64).unwrap_or(0);
        if let Some(obj) = entry.value.as_object_mut() {
            obj.insert("state_updates_recv".to_owned(), Value::from(count + 1));
        }
        entry.updated_at = now();
    }

    /// Set `subsystem_stats[id].online` and restamp the key. Returns the new
    /// value of `subsystem_stats` so the caller can fan it out (§3, §4.4).
    pub fn set_subsystem_online(&mut self, id: &str, online: bool) -> Value {
        let entry = self.entries.entry(SUBSYSTEM_STATS_KEY.to_owned()).or_insert_with(|| {
            StateEntry { value: Value::Object(Map::new()), updated_at: now() }
        });

        if !entry.value.is_object() {
            entry.value = Value::Object(Map::new());
        }
        if let Some(obj) = entry.value.as_object_mut() {
            obj.insert(id.to_owned(), serde_json::json!({"online": if online { 1 } else { 0 }}));
        }
        entry.updated_at = now();
        entry.value.clone()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Current wall-clock time in fractional seconds since the epoch.
pub fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
