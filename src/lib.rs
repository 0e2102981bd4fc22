// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleet hub: an in-memory pub/sub coordination service for a fleet of
//! cooperating robot services, exposed over a single websocket endpoint.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod outbound;
pub mod persist;
pub mod store;
pub mod subscriptions;
pub mod transport;
pub mod wire;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{HubConfig, HubFileConfig};
use crate::dispatcher::{Command, Dispatcher, COMMAND_QUEUE_CAPACITY};
use crate::error::HubError;
use crate::transport::{build_router, HubState};

/// Run the hub until shutdown. Binds the listener, starts the dispatcher
/// task, starts one outbound-peer task per configured peer, and serves
/// until a SIGTERM/SIGINT-driven shutdown completes (§5, §6).
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let file_config = HubFileConfig::load(config.config_file.as_deref())?;

    let addr = format!("{}:{}", config.host, config.resolved_port());
    let listener = TcpListener::bind(&addr).await.map_err(|source| HubError::BindFailed {
        addr: addr.clone(),
        source,
    })?;
    tracing::info!(addr = %addr, env = ?config.env, "fleethub listening");

    let (commands_tx, commands_rx) = tokio::sync::mpsc::channel::<Command>(COMMAND_QUEUE_CAPACITY);
    let dispatcher = Dispatcher::new(config.resolved_verbose_messages());
    let dispatcher_task = tokio::spawn(dispatcher.run(commands_rx));

    let shutdown = CancellationToken::new();
    let mut outbound_tasks = Vec::new();
    for peer in file_config.outbound_clients {
        tracing::info!(peer = %peer.name, uri = %peer.uri, "starting outbound peer");
        outbound_tasks.push(crate::outbound::spawn_outbound_peer(
            peer,
            commands_tx.clone(),
            shutdown.clone(),
        ));
    }

    let state = Arc::new(HubState::new(commands_tx, shutdown.clone()));
    let router = build_router(state);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    for task in outbound_tasks {
        let _ = task.await;
    }
    let _ = dispatcher_task.await;

    Ok(())
}

/// Resolve once either SIGTERM or SIGINT (Ctrl-C) arrives, or the passed
/// token is cancelled by something else (§6 exit codes).
///
/// Cancels `shutdown` itself before returning, so every inbound connection's
/// receive loop (which also holds a clone of this token) observes shutdown
/// concurrently with axum's graceful wait for in-flight connections to
/// close, rather than only after that wait is already over (§5 "close every
/// connection ... wait for receive loops to exit").
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(_) => return,
        };
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
