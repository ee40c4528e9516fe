//! Command line interface.

use clap::Parser;
use queue_lobby_api::ServiceConfig;
use std::path::PathBuf;

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;

/// Queue-Lobby HTTP service
#[derive(Debug, Parser)]
#[command(name = "queue-lobby")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Shared main and waiting-room queues over HTTP")]
pub struct Cli {
    /// Configuration file, loaded after the system and local files
    #[arg(short, long, env = "QUEUE_LOBBY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level or filter directive, overrides the configured level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Apply flag overrides on top of loaded configuration
    pub fn apply(&self, config: &mut ServiceConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
    }
}
