// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound WebSocket handler: one task per connection, feeding the shared
//! dispatcher (§4.4).

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::connection::{ConnHandle, ConnKind, OUTBOUND_QUEUE_CAPACITY};
use crate::dispatcher::Command;
use crate::transport::HubState;

/// `GET /` — WebSocket upgrade for the single hub endpoint (§1).
pub async fn ws_handler(
    State(state): State<Arc<HubState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, remote))
}

async fn handle_connection(socket: WebSocket, state: Arc<HubState>, remote: SocketAddr) {
    let id = state.next_conn_id.fetch_add(1, Ordering::Relaxed);
    let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

    let handle = ConnHandle {
        id,
        remote_ip: remote.ip().to_string(),
        remote_port: remote.port(),
        kind: ConnKind::Inbound,
        tx,
    };

    if state.commands.send(Command::Connect { handle }).await.is_err() {
        debug!(conn_id = id, "dispatcher unavailable, dropping connection");
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }

            outgoing = rx.recv() => {
                match outgoing {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let cmd = Command::Frame { id, text: text.to_string() };
                        if state.commands.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    let _ = state.commands.send(Command::Disconnect { id }).await;
}
