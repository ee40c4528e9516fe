//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use queue_lobby_core::QueueSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Queue behaviour
    pub queues: QueueSettings,

    /// Backing store
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.queues.validate()?;
        self.storage.validate()?;
        self.logging.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl ServerConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "server.host".to_string(),
            });
        }
        if self.shutdown_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "server.shutdown_timeout_seconds must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Which store implementation backs the queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local, lost on restart
    #[default]
    Memory,
    /// JSON document on local disk
    JsonFile,
}

/// Store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Data file, required by the `json_file` backend
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.backend, &self.path) {
            (StorageBackend::JsonFile, None) => Err(ConfigError::Missing {
                key: "storage.path".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level or filter directive
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.level.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "logging.level".to_string(),
            });
        }
        Ok(())
    }
}
