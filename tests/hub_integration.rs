// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end websocket scenarios against a real hub over loopback TCP.

mod common;

use common::{assert_silent, spawn_hub, spawn_hub_with_shutdown, ws_connect, ws_recv, ws_send, RECV_TIMEOUT};
use futures_util::StreamExt;

#[tokio::test]
async fn identity_handshake_replies_with_iseeu_and_marks_online() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, "identity", serde_json::json!("svcA")).await?;
    let reply = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(reply["type"], "iseeu");
    assert_eq!(reply["data"]["ip"], "127.0.0.1");

    ws_send(&mut tx, "getState", serde_json::json!(["subsystem_stats"])).await?;
    let state = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(state["data"]["subsystem_stats"]["svcA"]["online"], 1);

    Ok(())
}

#[tokio::test]
async fn set_then_get_roundtrips() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, "updateState", serde_json::json!({"angles": [10, 50, 180, 120, 90, 0]})).await?;
    // self-echo: the sender is not subscribed, so nothing is pushed yet.
    ws_send(&mut tx, "getState", serde_json::json!(["angles"])).await?;

    let reply = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(reply["type"], "state");
    assert_eq!(reply["data"]["angles"], serde_json::json!([10, 50, 180, 120, 90, 0]));

    Ok(())
}

#[tokio::test]
async fn fan_out_by_key_reaches_subscriber_and_echoes_to_sender() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut a_tx, mut a_rx) = ws_connect(&addr).await?;
    let (mut b_tx, mut b_rx) = ws_connect(&addr).await?;

    ws_send(&mut a_tx, "subscribeState", serde_json::json!(["angles"])).await?;
    ws_send(&mut b_tx, "subscribeState", serde_json::json!(["angles"])).await?;
    ws_send(&mut b_tx, "updateState", serde_json::json!({"angles": [1, 2, 3, 4, 5, 6]})).await?;

    let a_update = ws_recv(&mut a_rx, RECV_TIMEOUT).await?;
    assert_eq!(a_update["type"], "stateUpdate");
    assert_eq!(a_update["data"]["angles"], serde_json::json!([1, 2, 3, 4, 5, 6]));

    let b_update = ws_recv(&mut b_rx, RECV_TIMEOUT).await?;
    assert_eq!(b_update["data"]["angles"], serde_json::json!([1, 2, 3, 4, 5, 6]));

    Ok(())
}

#[tokio::test]
async fn selective_non_delivery_for_unrelated_keys() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut a_tx, mut a_rx) = ws_connect(&addr).await?;
    let (mut b_tx, _b_rx) = ws_connect(&addr).await?;

    ws_send(&mut a_tx, "subscribeState", serde_json::json!(["angles"])).await?;
    ws_send(&mut b_tx, "updateState", serde_json::json!({"throttle": 0.5})).await?;

    assert_silent(&mut a_rx, RECV_TIMEOUT).await;

    Ok(())
}

#[tokio::test]
async fn star_subscription_matches_previously_unknown_key() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut a_tx, mut a_rx) = ws_connect(&addr).await?;
    let (mut b_tx, _b_rx) = ws_connect(&addr).await?;

    ws_send(&mut a_tx, "subscribeState", serde_json::json!("*")).await?;
    ws_send(&mut b_tx, "updateState", serde_json::json!({"newkey": "x"})).await?;

    let update = ws_recv(&mut a_rx, RECV_TIMEOUT).await?;
    assert_eq!(update["type"], "stateUpdate");
    assert_eq!(update["data"], serde_json::json!({"newkey": "x"}));

    Ok(())
}

#[tokio::test]
async fn unsubscribe_suppresses_future_updates() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut a_tx, mut a_rx) = ws_connect(&addr).await?;
    let (mut b_tx, _b_rx) = ws_connect(&addr).await?;

    ws_send(&mut a_tx, "subscribeState", serde_json::json!(["angles"])).await?;
    ws_send(&mut a_tx, "unsubscribeState", serde_json::json!(["angles"])).await?;
    ws_send(&mut b_tx, "updateState", serde_json::json!({"angles": [1]})).await?;

    assert_silent(&mut a_rx, RECV_TIMEOUT).await;

    Ok(())
}

#[tokio::test]
async fn disconnect_hygiene_marks_subsystem_offline() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut watcher_tx, mut watcher_rx) = ws_connect(&addr).await?;
    ws_send(&mut watcher_tx, "subscribeState", serde_json::json!(["subsystem_stats"])).await?;

    let (mut b_tx, b_rx) = ws_connect(&addr).await?;
    ws_send(&mut b_tx, "identity", serde_json::json!("svcB")).await?;

    let online_update = ws_recv(&mut watcher_rx, RECV_TIMEOUT).await?;
    assert_eq!(online_update["data"]["subsystem_stats"]["svcB"]["online"], 1);

    drop(b_tx);
    drop(b_rx);

    let offline_update = ws_recv(&mut watcher_rx, RECV_TIMEOUT).await?;
    assert_eq!(offline_update["data"]["subsystem_stats"]["svcB"]["online"], 0);

    Ok(())
}

#[tokio::test]
async fn unknown_message_type_is_dropped_and_connection_stays_usable() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, "doSomethingUnsupported", serde_json::json!(null)).await?;
    ws_send(&mut tx, "ping", serde_json::json!(null)).await?;

    let reply = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(reply["type"], "pong");

    Ok(())
}

#[tokio::test]
async fn get_state_with_empty_key_list_returns_full_state() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, "updateState", serde_json::json!({"angles": [1]})).await?;
    ws_send(&mut tx, "getState", serde_json::json!([])).await?;

    let reply = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(reply["type"], "state");
    assert!(reply["data"].get("hub_stats").is_some());
    assert!(reply["data"].get("angles").is_some());

    Ok(())
}

#[tokio::test]
async fn multi_key_update_delivers_one_combined_frame() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut a_tx, mut a_rx) = ws_connect(&addr).await?;
    let (mut b_tx, _b_rx) = ws_connect(&addr).await?;

    ws_send(&mut a_tx, "subscribeState", serde_json::json!(["angles"])).await?;
    ws_send(
        &mut b_tx,
        "updateState",
        serde_json::json!({"angles": [1, 2], "throttle": 0.9}),
    )
    .await?;

    let update = ws_recv(&mut a_rx, RECV_TIMEOUT).await?;
    assert_eq!(update["data"]["angles"], serde_json::json!([1, 2]));
    assert_eq!(update["data"]["throttle"], serde_json::json!(0.9));

    assert_silent(&mut a_rx, RECV_TIMEOUT).await;

    Ok(())
}

#[tokio::test]
async fn ping_pong_roundtrip() -> anyhow::Result<()> {
    let (addr, _commands) = spawn_hub(false).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, "ping", serde_json::json!(null)).await?;
    let reply = ws_recv(&mut rx, RECV_TIMEOUT).await?;
    assert_eq!(reply["type"], "pong");

    Ok(())
}

#[tokio::test]
async fn shutdown_closes_live_inbound_connections_instead_of_hanging() -> anyhow::Result<()> {
    let (addr, _commands, shutdown) = spawn_hub_with_shutdown(false).await?;
    let (_tx, mut rx) = ws_connect(&addr).await?;

    shutdown.cancel();

    // The inbound receive loop observes cancellation, sends a close frame,
    // and exits — the stream ends instead of waiting forever for graceful
    // shutdown to notice a connection that never goes away on its own (§5).
    let closed = tokio::time::timeout(RECV_TIMEOUT, rx.next()).await?;
    assert!(matches!(closed, Some(Ok(tokio_tungstenite::tungstenite::Message::Close(_))) | None));

    Ok(())
}
