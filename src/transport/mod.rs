// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the hub (§4.4 connection manager).

pub mod ws;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::dispatcher::Command;
use tokio::sync::mpsc;

/// Shared state handed to every connection handler.
pub struct HubState {
    pub commands: mpsc::Sender<Command>,
    pub next_conn_id: AtomicU64,
    pub shutdown: CancellationToken,
}

impl HubState {
    pub fn new(commands: mpsc::Sender<Command>, shutdown: CancellationToken) -> Self {
        Self { commands, next_conn_id: AtomicU64::new(1), shutdown }
    }
}

/// Build the axum `Router` exposing the single websocket endpoint (§1, §6).
pub fn build_router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
