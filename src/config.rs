// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration (§10.3): process config via `clap` + env, and the bot
//! config YAML file describing outbound peers.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HubError;

/// Default listen port for development/production environments.
pub const DEFAULT_PORT: u16 = 5100;
/// Distinct port used when `--env test` and `--port` was not given
/// explicitly, so a dev hub and a test hub can run side by side.
pub const TEST_PORT: u16 = 5150;

/// Deployment environment tag (§6 "Recognized environment options").
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Process-level configuration for the hub binary.
#[derive(Debug, Clone, clap::Parser)]
#[command(author, version, about = "Fleet pub/sub coordination hub")]
pub struct HubConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "BB_HUB_HOST")]
    pub host: String,

    /// Port to listen on. Defaults to 5100 (5150 in the test environment).
    #[arg(long, env = "BB_HUB_PORT")]
    pub port: Option<u16>,

    /// Deployment environment tag.
    #[arg(long, value_enum, default_value = "development", env = "BB_ENV")]
    pub env: Environment,

    /// Log every frame in and out, not just lifecycle events.
    #[arg(long, env = "BB_LOG_ALL_MESSAGES")]
    pub verbose_messages: bool,

    /// Path to the bot config YAML file (enumerates outbound peers).
    #[arg(long, env = "BB_CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `fleethub=debug,tower_http=warn`.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl HubConfig {
    /// The port to actually bind: the explicit `--port`/env value if given,
    /// else the environment-tag default (§11 "environment-tag port
    /// override").
    pub fn resolved_port(&self) -> u16 {
        self.port.unwrap_or(match self.env {
            Environment::Test => TEST_PORT,
            Environment::Development | Environment::Production => DEFAULT_PORT,
        })
    }

    /// Whether per-frame message logging is on: the explicit flag, forced on
    /// in the test environment regardless of the flag's value, matching the
    /// original's unconditional `BB_LOG_ALL_MESSAGES = True` under
    /// `BB_ENV=test` (§11).
    pub fn resolved_verbose_messages(&self) -> bool {
        self.verbose_messages || self.env == Environment::Test
    }
}

/// One configured outbound peer (§3 "Outbound peer descriptor").
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundPeerConfig {
    pub name: String,
    pub uri: String,
    pub identity: String,
    #[serde(default)]
    pub shared_token_file: Option<PathBuf>,
}

/// The bot config YAML file (§10.3). Only `outbound_clients` drives
/// behavior here; the rest is accepted so the same file used by the wider
/// fleet doesn't fail to parse against this hub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubFileConfig {
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    /// Process supervisor entries. Parsed for schema compatibility, never
    /// acted on (service supervision is out of scope, §1).
    #[serde(default)]
    pub services: serde_yaml::Value,
    #[serde(default)]
    pub outbound_clients: Vec<OutboundPeerConfig>,
}

impl HubFileConfig {
    /// Load and parse the bot config file. A missing path is not an error —
    /// outbound federation is simply disabled; malformed YAML at a path that
    /// does exist is a startup failure (§7 "Configuration invalid at
    /// startup").
    pub fn load(path: Option<&Path>) -> Result<Self, HubError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            HubError::InvalidConfig(format!("reading {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&text)
            .map_err(|e| HubError::InvalidConfig(format!("parsing {}: {e}", path.display())))
    }
}
