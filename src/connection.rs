// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection handles tracked by the dispatcher (§3 "Connection").

use std::sync::Arc;

use tokio::sync::mpsc;

/// Identifies a connection for the lifetime of the process. Assigned
/// sequentially by the dispatcher on accept/dial.
pub type ConnId = u64;

/// Capacity of a connection's outbound queue (§5 "bounded per-peer outbound
/// queue"). A connection that cannot drain this many pending frames is
/// already broken.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Whether a connection was accepted inbound or dialed outbound to a peer
/// hub. Only `OutboundPeer` connections are exempted from echoing their own
/// `updateState` back to themselves (§4.6 "echo prevention").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnKind {
    Inbound,
    OutboundPeer,
}

/// The dispatcher's view of one live connection: where to send outbound
/// frames and enough identity to log and reply with `iseeu`.
pub struct ConnHandle {
    pub id: ConnId,
    pub remote_ip: String,
    pub remote_port: u16,
    pub kind: ConnKind,
    pub tx: mpsc::Sender<Arc<str>>,
}

impl ConnHandle {
    /// Non-blocking enqueue of a frame onto this connection's outbound
    /// queue. `Err` means the queue is full or the connection's send loop
    /// has already exited — the caller treats this exactly like a failed
    /// socket write (§4.5 fan-out policy) and disconnects the connection.
    pub fn try_send(&self, frame: Arc<str>) -> Result<(), ()> {
        self.tx.try_send(frame).map_err(|_| ())
    }
}
