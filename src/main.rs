// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use fleethub::config::{HubConfig, LogFormat};

#[tokio::main]
async fn main() {
    let config = HubConfig::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
        }
    }

    if let Err(e) = fleethub::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
