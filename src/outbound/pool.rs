// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One outbound peer connection (§4.6).
//!
//! State machine per the spec: `Dialing -> Identifying -> Connected ->
//! Backoff -> Dialing`, terminal `Closed` on shutdown. Unlike the teacher's
//! upstream bridge (which backs off exponentially), a failed outbound peer
//! retries on a fixed 5-second delay — the spec is explicit about this and
//! it deliberately overrides the teacher's curve.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::Uri;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OutboundPeerConfig;
use crate::connection::{ConnHandle, ConnId, ConnKind, OUTBOUND_QUEUE_CAPACITY};
use crate::dispatcher::Command;
use crate::wire;

/// Fixed reconnect delay (§3 "Lifecycles", §4.6 step 5, §5).
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

static NEXT_OUTBOUND_ID: AtomicU64 = AtomicU64::new(1_000_000);

/// Spawn the task that dials `peer` and retries indefinitely until
/// `shutdown` is cancelled.
pub fn spawn_outbound_peer(
    peer: OutboundPeerConfig,
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_loop(peer, commands, shutdown))
}

async fn run_loop(peer: OutboundPeerConfig, commands: mpsc::Sender<Command>, shutdown: CancellationToken) {
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        if let Err(e) = connect_and_mirror(&peer, &commands, &shutdown).await {
            warn!(peer = %peer.name, uri = %peer.uri, err = %e, "outbound peer connection failed");
        }

        if shutdown.is_cancelled() {
            break;
        }

        debug!(peer = %peer.name, delay_s = RECONNECT_DELAY.as_secs(), "backing off before reconnect");
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

async fn connect_and_mirror(
    peer: &OutboundPeerConfig,
    commands: &mpsc::Sender<Command>,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    debug!(peer = %peer.name, uri = %peer.uri, "dialing outbound peer");
    let (ws_stream, _) = tokio_tungstenite::connect_async(&peer.uri).await?;
    let (mut write, mut read) = ws_stream.split();

    let token = read_token(peer).await;
    let identity_frame = wire::encode("identity", identity_payload(&peer.identity, token));
    write.send(Message::Text(identity_frame.into())).await?;
    info!(peer = %peer.name, uri = %peer.uri, "outbound peer identified");

    let id: ConnId = NEXT_OUTBOUND_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let (remote_ip, remote_port) = split_uri(&peer.uri);

    let handle = ConnHandle { id, remote_ip, remote_port, kind: ConnKind::OutboundPeer, tx };
    commands.send(Command::Connect { handle }).await?;

    // Subscribe this connection to every key so local updates mirror out to
    // the peer (§4.6 "Broadcast side").
    let subscribe_frame = wire::encode("subscribeState", serde_json::json!("*"));
    commands.send(Command::Frame { id, text: subscribe_frame }).await?;

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),

            outgoing = rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        if write.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break Ok(());
                        }
                    }
                    None => break Ok(()),
                }
            }

            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let cmd = Command::Frame { id, text: text.to_string() };
                        if commands.send(cmd).await.is_err() {
                            break Ok(());
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break Ok(()),
                    Some(Err(e)) => break Err(anyhow::Error::from(e)),
                    _ => {}
                }
            }
        }
    };

    let _ = commands.send(Command::Disconnect { id }).await;
    result
}

/// Read the peer's shared-token file, if configured. A read failure is
/// logged and the peer proceeds without a token (§7 "Outbound peer token
/// read failure").
async fn read_token(peer: &OutboundPeerConfig) -> Option<String> {
    let path = peer.shared_token_file.as_ref()?;
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Some(contents.trim().to_owned()),
        Err(e) => {
            warn!(peer = %peer.name, path = %path.display(), err = %e, "failed to read shared token, proceeding without one");
            None
        }
    }
}

/// Build the outbound-peer identity payload (§4.6 step 3). `shared_token` is
/// only present when a token was actually read — omitted, not `null`, when
/// there isn't one, matching the original's `if token: identity_data[...]
/// = token`.
fn identity_payload(identity: &str, token: Option<String>) -> Value {
    let mut data = serde_json::json!({"subsystem_name": identity});
    if let Some(token) = token {
        data["shared_token"] = Value::String(token);
    }
    data
}

/// Best-effort host/port split of a peer URI, used only for logging.
fn split_uri(uri: &str) -> (String, u16) {
    match uri.parse::<Uri>() {
        Ok(parsed) => {
            let host = parsed.host().unwrap_or("unknown").to_owned();
            let port = parsed.port_u16().unwrap_or(0);
            (host, port)
        }
        Err(_) => (uri.to_owned(), 0),
    }
}
