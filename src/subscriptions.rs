// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The subscription index (§4.3): a per-key set of subscriber connections,
//! plus a distinct "star" set for connections subscribed to every key.

use std::collections::{HashMap, HashSet};

use crate::connection::ConnId;

/// Per-key and star subscriber sets.
///
/// Star membership is never materialized into the per-key sets — `resolve`
/// consults both. Owned by the dispatcher, mutated only from its command
/// loop (§5).
#[derive(Default)]
pub struct SubscriptionIndex {
    by_key: HashMap<String, HashSet<ConnId>>,
    star: HashSet<ConnId>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to the star set.
    pub fn subscribe_star(&mut self, conn: ConnId) {
        self.star.insert(conn);
    }

    /// Add `conn` to each listed key's subscriber set, creating sets that
    /// don't exist yet. Idempotent.
    pub fn subscribe_keys(&mut self, conn: ConnId, keys: &[String]) {
        for key in keys {
            self.by_key.entry(key.clone()).or_default().insert(conn);
        }
    }

    /// Remove `conn` from the star set and every per-key set — the "remove
    /// from every membership" reading of `unsubscribeState("*")` (§9 open
    /// question, resolved in favor of the safer semantic).
    pub fn unsubscribe_star(&mut self, conn: ConnId) {
        self.star.remove(&conn);
        for set in self.by_key.values_mut() {
            set.remove(&conn);
        }
    }

    /// Remove `conn` from the listed keys' subscriber sets. Missing entries
    /// are silently ignored.
    pub fn unsubscribe_keys(&mut self, conn: ConnId, keys: &[String]) {
        for key in keys {
            if let Some(set) = self.by_key.get_mut(key) {
                set.remove(&conn);
            }
        }
    }

    /// Union of the star set and the per-key subscriber sets for each
    /// changed key.
    pub fn resolve<'a>(&self, changed_keys: impl Iterator<Item = &'a str>) -> HashSet<ConnId> {
        let mut targets = self.star.clone();
        for key in changed_keys {
            if let Some(set) = self.by_key.get(key) {
                targets.extend(set.iter().copied());
            }
        }
        targets
    }

    /// Remove `conn` from the star set and from every per-key set.
    pub fn purge(&mut self, conn: ConnId) {
        self.star.remove(&conn);
        for set in self.by_key.values_mut() {
            set.remove(&conn);
        }
    }
}
