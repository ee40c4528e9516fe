//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use queue_lobby_core::{ConfigurationError, QueueError, ValidationError};
use tracing::{error, warn};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Seconds a client should wait before retrying after a store failure
pub const RETRY_AFTER_SECONDS: u64 = 5;

/// Queue handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: malformed input, not retryable
/// - `404 Not Found`: the entry does not exist
/// - `503 Service Unavailable`: the store failed; retry after a delay
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Queue operation failure; status depends on the underlying error
    #[error("{0}")]
    Queue(#[from] QueueError),

    /// Invalid path segment or field
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// Body could not be decoded
    #[error("Malformed request body: {message}")]
    MalformedBody { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retry_after) = match &self {
            Self::Queue(QueueError::NotFound { id }) => {
                warn!(entry_id = %id, "Queue entry not found");
                (StatusCode::NOT_FOUND, None)
            }
            Self::Queue(e) if e.is_transient() => {
                error!(error = %e, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, Some(RETRY_AFTER_SECONDS))
            }
            Self::Queue(_) | Self::InvalidRequest(_) | Self::MalformedBody { .. } => {
                (StatusCode::BAD_REQUEST, None)
            }
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Failed to open store: {0}")]
    Storage(#[from] queue_lobby_core::StoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("{0}")]
    Queue(#[from] ConfigurationError),
}
