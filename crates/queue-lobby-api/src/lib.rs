//! # Queue-Lobby HTTP Service
//!
//! HTTP surface over the shared main and waiting-room queues.
//!
//! This service provides:
//! - Listing of both partitions, with display annotations per entry
//! - Push, pop, remove and move endpoints
//! - A health endpoint that checks the store is readable

pub mod config;
pub mod errors;
pub mod responses;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig, StorageBackend, StorageConfig};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use responses::{EntryView, ExpiryView, HealthResponse, PushRequest, QueueView};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use queue_lobby_core::{
    BothQueues, Clock, EntryId, InMemoryQueueStore, JsonFileQueueStore, PopOutcome, QueueEntry,
    QueueService, QueueStore, QueueType, RemoveOutcome, SystemClock, Timestamp,
};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Queue operations over the configured store
    pub service: QueueService,

    /// Time source for expiry annotations
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, store: Arc<dyn QueueStore>) -> Self {
        let service = QueueService::new(store, config.queues.allocation);
        Self {
            config: Arc::new(config),
            service,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn queue_view(&self, queue_type: QueueType, entries: Vec<QueueEntry>) -> QueueView {
        QueueView::build(
            queue_type,
            entries,
            self.clock.now(),
            self.config.queues.expiry_duration(),
        )
    }
}

/// Open the store selected by `config`
pub async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn QueueStore>, ServiceError> {
    let capacity = config.queues.change_feed_capacity;
    match (config.storage.backend, &config.storage.path) {
        (StorageBackend::Memory, _) => {
            info!("Using in-memory queue store");
            Ok(Arc::new(InMemoryQueueStore::new(capacity)))
        }
        (StorageBackend::JsonFile, Some(path)) => {
            let store = JsonFileQueueStore::open(path.clone(), capacity).await?;
            Ok(Arc::new(store))
        }
        (StorageBackend::JsonFile, None) => Err(ServiceError::Configuration(ConfigError::Missing {
            key: "storage.path".to_string(),
        })),
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new().route("/health", get(handle_health_check));

    let queue_routes = Router::new()
        .route("/api/queues", get(list_queues))
        .route("/api/queues/{queue_type}", get(list_queue))
        .route("/api/queues/{queue_type}/entries", post(push_entry))
        .route("/api/queues/{queue_type}/pop", post(pop_entry))
        .route("/api/entries/{id}", delete(remove_entry))
        .route("/api/entries/{id}/move", post(move_entry));

    Router::new()
        .merge(health_routes)
        .merge(queue_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server and run until `shutdown` resolves
///
/// In-flight requests get `server.shutdown_timeout_seconds` to finish once
/// the shutdown future completes.
pub async fn start_server<F>(state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let server_config = state.config.server.clone();
    let address = format!("{}:{}", server_config.host, server_config.port);
    let listener = tokio::net::TcpListener::bind((server_config.host.as_str(), server_config.port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let app = create_router(state);
    let signalled = CancellationToken::new();
    let trigger = signalled.clone();
    let shutdown_timeout = server_config.shutdown_timeout();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            trigger.cancel();
        })
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = async {
            signalled.cancelled().await;
            tokio::time::sleep(shutdown_timeout).await;
        } => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping in-flight requests"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn parse_queue_type(raw: &str) -> Result<QueueType, ApiError> {
    Ok(raw.parse::<QueueType>()?)
}

fn parse_entry_id(raw: &str) -> Result<EntryId, ApiError> {
    Ok(raw.parse::<EntryId>()?)
}

/// Liveness plus a store read
#[instrument(skip(state))]
async fn handle_health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let store_ok = state.service.list(QueueType::Main).await.is_ok();
    let (status, store) = if store_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };

    let response = HealthResponse {
        status: if store_ok { "healthy" } else { "unhealthy" }.to_string(),
        store: store.to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status, Json(response))
}

#[instrument(skip(state))]
async fn list_queues(State(state): State<AppState>) -> Result<Json<BothQueues>, ApiError> {
    Ok(Json(state.service.list_all().await?))
}

#[instrument(skip(state))]
async fn list_queue(
    State(state): State<AppState>,
    Path(queue_type): Path<String>,
) -> Result<Json<QueueView>, ApiError> {
    let queue_type = parse_queue_type(&queue_type)?;
    let entries = state.service.list(queue_type).await?;
    Ok(Json(state.queue_view(queue_type, entries)))
}

#[instrument(skip(state, body))]
async fn push_entry(
    State(state): State<AppState>,
    Path(queue_type): Path<String>,
    body: Result<Json<PushRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueueView>), ApiError> {
    let queue_type = parse_queue_type(&queue_type)?;
    let Json(request) = body.map_err(|e| ApiError::MalformedBody {
        message: e.body_text(),
    })?;

    let entries = state
        .service
        .push(queue_type, request.value1, request.value2)
        .await?;
    Ok((StatusCode::CREATED, Json(state.queue_view(queue_type, entries))))
}

#[instrument(skip(state))]
async fn pop_entry(
    State(state): State<AppState>,
    Path(queue_type): Path<String>,
) -> Result<Json<PopOutcome>, ApiError> {
    let queue_type = parse_queue_type(&queue_type)?;
    Ok(Json(state.service.pop(queue_type).await?))
}

#[instrument(skip(state))]
async fn remove_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemoveOutcome>, ApiError> {
    let id = parse_entry_id(&id)?;
    Ok(Json(state.service.remove_by_id(&id).await?))
}

#[instrument(skip(state))]
async fn move_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BothQueues>, ApiError> {
    let id = parse_entry_id(&id)?;
    Ok(Json(state.service.move_to_waiting_room(&id).await?))
}
