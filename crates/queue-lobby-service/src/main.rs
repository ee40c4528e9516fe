//! # Queue-Lobby Service
//!
//! Binary entry point for the Queue-Lobby HTTP service.
//!
//! This executable:
//! - Parses command line flags
//! - Loads layered configuration from files and environment
//! - Initializes logging
//! - Opens the configured store and starts the HTTP server from queue-lobby-api

mod cli;
mod settings;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use queue_lobby_api::{open_store, shutdown_signal, start_server, AppState};
use settings::{init_logging, ConfigLoader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config
        .validate()
        .context("Service configuration is invalid")?;

    init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.storage.backend,
        allocation = ?config.queues.allocation,
        "Starting Queue-Lobby Service"
    );

    let store = open_store(&config)
        .await
        .context("Failed to open queue store")?;
    let state = AppState::new(config, store);

    start_server(state, shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Queue-Lobby Service stopped");
    Ok(())
}
