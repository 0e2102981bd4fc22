// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup-time error taxonomy.
//!
//! The hub's only externally facing surface is the websocket connection loop,
//! where protocol errors are logged and the offending frame is dropped (see
//! `dispatcher`) — they never become a `HubError`. This type covers only the
//! failures that can occur before that loop takes over: bad configuration,
//! an unreadable peer token file, or a port already in use.

use std::fmt;

/// Errors that can abort startup. Each variant maps to a non-zero exit code.
#[derive(Debug)]
pub enum HubError {
    InvalidConfig(String),
    BindFailed { addr: String, source: std::io::Error },
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::BindFailed { addr, source } => {
                write!(f, "failed to bind {addr}: {source}")
            }
        }
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BindFailed { source, .. } => Some(source),
            Self::InvalidConfig(_) => None,
        }
    }
}
