// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The envelope wire format shared by every websocket connection, inbound or
//! outbound: `{"type": <string>, "data": <any?>}`.
//!
//! Per-type validation lives in the dispatcher, not here — this module only
//! knows about envelope shape.

use serde::Deserialize;
use serde_json::Value;

/// A decoded inbound frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

/// Parse a raw text frame into an envelope.
///
/// Malformed JSON or a missing/invalid `type` field is a protocol error —
/// callers log and drop the frame rather than closing the connection.
pub fn parse_envelope(text: &str) -> Result<InboundEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

/// Build an outbound envelope as wire text: `{"type": kind, "data": data}`.
pub fn encode(kind: &str, data: Value) -> String {
    // Construction from known-good components; only fails if `data` itself
    // contains non-finite floats, which the store never admits.
    serde_json::to_string(&serde_json::json!({ "type": kind, "data": data }))
        .unwrap_or_else(|_| format!(r#"{{"type":"{kind}","data":null}}"#))
}
