// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatcher (§4.5): the single writer for state, subscriptions, and
//! identities. Every mutation request — an inbound frame, a connect, or a
//! disconnect — arrives as a `Command` over a channel and is applied here,
//! one at a time, which is what gives the hub its single-writer discipline
//! (§5) without an explicit lock.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::{ConnHandle, ConnId, ConnKind};
use crate::store::StateStore;
use crate::subscriptions::SubscriptionIndex;
use crate::wire::{self, InboundEnvelope};

/// A request to mutate dispatcher-owned state, sent from a connection's
/// receive loop (inbound or outbound-peer) or from connection setup/teardown.
pub enum Command {
    Connect { handle: ConnHandle },
    Disconnect { id: ConnId },
    Frame { id: ConnId, text: String },
}

/// Channel capacity for the dispatcher's command queue. Generous: the
/// dispatcher drains continuously and this only needs to absorb bursts.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// The single-writer broker task.
pub struct Dispatcher {
    store: StateStore,
    subs: SubscriptionIndex,
    identities: HashMap<ConnId, String>,
    connections: HashMap<ConnId, ConnHandle>,
    verbose_messages: bool,
}

impl Dispatcher {
    pub fn new(verbose_messages: bool) -> Self {
        Self {
            store: StateStore::new(),
            subs: SubscriptionIndex::new(),
            identities: HashMap::new(),
            connections: HashMap::new(),
            verbose_messages,
        }
    }

    /// Run the command loop until the channel closes (shutdown).
    pub async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Connect { handle } => self.on_connect(handle),
                Command::Disconnect { id } => self.on_disconnect(id),
                Command::Frame { id, text } => self.on_frame(id, &text),
            }
        }
        debug!("dispatcher command channel closed, exiting");
    }

    fn on_connect(&mut self, handle: ConnHandle) {
        info!(conn_id = handle.id, remote = %format!("{}:{}", handle.remote_ip, handle.remote_port), "connection accepted");
        self.connections.insert(handle.id, handle);
    }

    fn on_disconnect(&mut self, id: ConnId) {
        let Some(handle) = self.connections.remove(&id) else {
            return;
        };
        info!(conn_id = id, remote = %format!("{}:{}", handle.remote_ip, handle.remote_port), "connection closed");
        self.subs.purge(id);

        if let Some(subsystem_name) = self.identities.remove(&id) {
            self.set_subsystem_online_and_fanout(&subsystem_name, false, None);
        }
    }

    fn on_frame(&mut self, id: ConnId, text: &str) {
        let envelope = match wire::parse_envelope(text) {
            Ok(env) => env,
            Err(e) => {
                warn!(conn_id = id, err = %e, "dropping malformed frame");
                return;
            }
        };

        if self.verbose_messages && envelope.kind != "ping" {
            info!(conn_id = id, kind = %envelope.kind, "received frame");
        }

        match envelope.kind.as_str() {
            "identity" => self.handle_identity(id, &envelope),
            "getState" => self.handle_get_state(id, &envelope),
            "subscribeState" => self.handle_subscribe(id, &envelope, true),
            "unsubscribeState" => self.handle_subscribe(id, &envelope, false),
            "updateState" => self.handle_update_state(id, &envelope),
            "ping" => self.reply(id, "pong", Value::Null),
            other => warn!(conn_id = id, kind = %other, "dropping unsupported message type"),
        }
    }

    // -- per-type handlers (§4.5) ---------------------------------------

    fn handle_identity(&mut self, id: ConnId, envelope: &InboundEnvelope) {
        let Some(name) = extract_identity_name(&envelope.data) else {
            warn!(conn_id = id, "dropping identity frame with unrecognized shape");
            return;
        };

        debug!(conn_id = id, identity = %name, "identity bound");
        self.identities.insert(id, name.clone());
        self.set_subsystem_online_and_fanout(&name, true, None);

        if let Some(handle) = self.connections.get(&id) {
            let payload = serde_json::json!({"ip": handle.remote_ip, "port": handle.remote_port});
            self.reply(id, "iseeu", payload);
        }
    }

    fn handle_get_state(&mut self, id: ConnId, envelope: &InboundEnvelope) {
        let keys = parse_key_list(&envelope.data);
        let requested = match keys {
            Some(KeyArg::Keys(ks)) => Some(ks),
            _ => None,
        };
        let snapshot = self.store.snapshot(requested.as_deref());
        self.reply(id, "state", Value::Object(snapshot));
    }

    fn handle_subscribe(&mut self, id: ConnId, envelope: &InboundEnvelope, subscribing: bool) {
        match parse_key_list(&envelope.data) {
            Some(KeyArg::Star) => {
                if subscribing {
                    self.subs.subscribe_star(id);
                } else {
                    // "remove from every membership" (§9 open question).
                    self.subs.unsubscribe_star(id);
                }
            }
            Some(KeyArg::Keys(keys)) => {
                if subscribing {
                    self.subs.subscribe_keys(id, &keys);
                } else {
                    self.subs.unsubscribe_keys(id, &keys);
                }
            }
            None => warn!(conn_id = id, "dropping subscribe frame with invalid data shape"),
        }
    }

    fn handle_update_state(&mut self, id: ConnId, envelope: &InboundEnvelope) {
        let Some(updates) = envelope.data.as_object() else {
            warn!(conn_id = id, "dropping updateState frame: data is not an object");
            return;
        };

        for (key, value) in updates {
            self.store.set(key, value.clone());
        }
        // Incremented once per updateState message, even when it carries no
        // keys, matching the original hub's unconditional counter bump.
        self.store.record_state_update();

        let is_peer_origin =
            self.connections.get(&id).map(|h| h.kind == ConnKind::OutboundPeer).unwrap_or(false);
        let origin = if is_peer_origin { Some(id) } else { None };

        self.fan_out(updates.keys().map(|k| k.as_str()), Value::Object(updates.clone()), origin);
    }

    // -- shared machinery -------------------------------------------------

    /// Write `subsystem_stats[id].online` and fan out the whole
    /// `subsystem_stats` key, like any other state change (§3).
    fn set_subsystem_online_and_fanout(&mut self, id: &str, online: bool, origin: Option<ConnId>) {
        let new_value = self.store.set_subsystem_online(id, online);
        self.fan_out(std::iter::once("subsystem_stats"), new_value, origin);
    }

    /// Fan out a single `stateUpdate` frame carrying `data` to every
    /// connection subscribed to any of `changed_keys` (§4.3 tie-break: the
    /// whole original `data` object, unfiltered). When `origin` names an
    /// outbound-peer connection, it is excluded from the recipients to
    /// prevent echo back to the peer it came from (§4.6, §9).
    fn fan_out<'a>(
        &mut self,
        changed_keys: impl Iterator<Item = &'a str>,
        data: Value,
        origin: Option<ConnId>,
    ) {
        let mut targets = self.subs.resolve(changed_keys);
        if let Some(origin_id) = origin {
            targets.remove(&origin_id);
        }
        if targets.is_empty() {
            return;
        }

        let frame: Arc<str> = Arc::from(wire::encode("stateUpdate", data));
        self.send_to_many(targets, &frame);
    }

    /// Send `frame` to `targets`, disconnecting any whose outbound queue
    /// rejects it (full or closed) — a slow or dead subscriber never blocks
    /// progress on the others (§4.5 fan-out policy).
    fn send_to_many(&mut self, targets: impl IntoIterator<Item = ConnId>, frame: &Arc<str>) {
        let mut dead = Vec::new();
        for id in targets {
            if let Some(handle) = self.connections.get(&id) {
                if handle.try_send(Arc::clone(frame)).is_err() {
                    dead.push(id);
                }
            }
        }
        for id in dead {
            warn!(conn_id = id, "outbound queue rejected frame, disconnecting");
            self.on_disconnect(id);
        }
    }

    /// Reply to the originating connection only (never broadcast).
    fn reply(&mut self, id: ConnId, kind: &str, data: Value) {
        let Some(handle) = self.connections.get(&id) else {
            return;
        };
        let frame: Arc<str> = Arc::from(wire::encode(kind, data));
        if handle.try_send(frame).is_err() {
            warn!(conn_id = id, "reply queue rejected frame, disconnecting");
            self.on_disconnect(id);
        }
    }
}

/// Parsed shape of a subscribe/unsubscribe/getState key argument.
enum KeyArg {
    Star,
    Keys(Vec<String>),
}

fn parse_key_list(data: &Value) -> Option<KeyArg> {
    match data {
        Value::Null => Some(KeyArg::Keys(Vec::new())),
        Value::String(s) if s == "*" => Some(KeyArg::Star),
        Value::Array(items) => {
            let keys = items.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect();
            Some(KeyArg::Keys(keys))
        }
        _ => None,
    }
}

/// Accept both the inbound identity shape (`data: <string>`) and the
/// outbound-peer shape (`data: {"subsystem_name": <string>, "shared_token":
/// <string?>}`) — §9 open question, resolved in favor of compatibility.
///
/// `shared_token` is parsed but deliberately not enforced here: validating it
/// would be authenticating an incoming client, which is out of scope (§1
/// Non-goals). It exists so a future revision can opt in without a wire
/// change.
fn extract_identity_name(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => data.get("subsystem_name").and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
