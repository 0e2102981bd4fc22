// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for spinning up a real hub over loopback TCP and driving
//! it with real websocket clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use fleethub::dispatcher::{Command, Dispatcher, COMMAND_QUEUE_CAPACITY};
use fleethub::transport::{build_router, HubState};

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
pub type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
pub type WsRx = futures_util::stream::SplitStream<WsStream>;

pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// Spawn a hub (dispatcher + router) bound to an ephemeral loopback port.
/// Also returns the dispatcher's command sender so tests can attach an
/// outbound peer task to the same hub a websocket client would reach.
pub async fn spawn_hub(
    verbose_messages: bool,
) -> anyhow::Result<(SocketAddr, tokio::sync::mpsc::Sender<Command>)> {
    let (addr, tx, _shutdown) = spawn_hub_with_shutdown(verbose_messages).await?;
    Ok((addr, tx))
}

/// Like [`spawn_hub`], but also returns the `CancellationToken` wired into
/// every inbound connection's receive loop, for tests that exercise
/// shutdown behavior directly.
pub async fn spawn_hub_with_shutdown(
    verbose_messages: bool,
) -> anyhow::Result<(SocketAddr, tokio::sync::mpsc::Sender<Command>, CancellationToken)> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Command>(COMMAND_QUEUE_CAPACITY);
    let dispatcher = Dispatcher::new(verbose_messages);
    tokio::spawn(dispatcher.run(rx));

    let shutdown = CancellationToken::new();
    let state = Arc::new(HubState::new(tx.clone(), shutdown.clone()));
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let serve_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
        .await;
    });

    Ok((addr, tx, shutdown))
}

pub async fn ws_connect(addr: &SocketAddr) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}/");
    let (stream, _) = tokio_tungstenite::connect_async(&url).await?;
    Ok(stream.split())
}

pub async fn ws_send(tx: &mut WsTx, kind: &str, data: serde_json::Value) -> anyhow::Result<()> {
    let frame = serde_json::json!({"type": kind, "data": data});
    tx.send(WsMessage::Text(frame.to_string().into())).await?;
    Ok(())
}

pub async fn ws_recv(rx: &mut WsRx, timeout: Duration) -> anyhow::Result<serde_json::Value> {
    let msg = tokio::time::timeout(timeout, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;

    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected Text message, got {other:?}"),
    }
}

/// Assert that no message arrives within `timeout` (§8 "selective
/// non-delivery").
pub async fn assert_silent(rx: &mut WsRx, timeout: Duration) {
    let result = tokio::time::timeout(timeout, rx.next()).await;
    assert!(result.is_err(), "expected no message, got one");
}
