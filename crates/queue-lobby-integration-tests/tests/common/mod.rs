//! Common test utilities for queue-lobby integration tests
//!
//! This module provides:
//! - A store double whose every call fails
//! - Helpers for building apps and issuing JSON requests

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use queue_lobby_api::{create_router, AppState, ServiceConfig};
use queue_lobby_core::{
    EntryId, EntryPatch, InMemoryQueueStore, NewEntry, QueueEntry, QueueStore, QueueType,
    StoreError, Timestamp,
};
use std::sync::Arc;
use tower::ServiceExt;

// ============================================================================
// Failing Store
// ============================================================================

/// Store whose backend is unreachable
pub struct UnavailableStore;

#[async_trait]
impl QueueStore for UnavailableStore {
    async fn list(&self, _queue_type: QueueType) -> Result<Vec<QueueEntry>, StoreError> {
        Err(StoreError::read("list", "backend unreachable"))
    }

    async fn get(&self, _id: &EntryId) -> Result<Option<QueueEntry>, StoreError> {
        Err(StoreError::read("get", "backend unreachable"))
    }

    async fn first(&self, _queue_type: QueueType) -> Result<Option<QueueEntry>, StoreError> {
        Err(StoreError::read("first", "backend unreachable"))
    }

    async fn max_position(&self, _queue_type: QueueType) -> Result<Option<i64>, StoreError> {
        Err(StoreError::read("max_position", "backend unreachable"))
    }

    async fn insert(&self, _entry: NewEntry) -> Result<QueueEntry, StoreError> {
        Err(StoreError::write("insert", "backend unreachable"))
    }

    async fn delete(&self, _id: &EntryId) -> Result<bool, StoreError> {
        Err(StoreError::write("delete", "backend unreachable"))
    }

    async fn update(
        &self,
        _id: &EntryId,
        _patch: EntryPatch,
    ) -> Result<Option<QueueEntry>, StoreError> {
        Err(StoreError::write("update", "backend unreachable"))
    }

    async fn append(
        &self,
        _queue_type: QueueType,
        _value1: String,
        _value2: String,
    ) -> Result<QueueEntry, StoreError> {
        Err(StoreError::write("append", "backend unreachable"))
    }

    async fn relocate_to_tail(
        &self,
        _id: &EntryId,
        _queue_type: QueueType,
        _moved_at: Option<Timestamp>,
    ) -> Result<Option<QueueEntry>, StoreError> {
        Err(StoreError::write("relocate_to_tail", "backend unreachable"))
    }
}

// ============================================================================
// App Helpers
// ============================================================================

/// Router over a fresh in-memory store, plus the store itself
#[allow(dead_code)]
pub fn memory_app() -> (Arc<InMemoryQueueStore>, Router) {
    let store = Arc::new(InMemoryQueueStore::default());
    let app = app_over(store.clone());
    (store, app)
}

/// Router over any store with default configuration
pub fn app_over(store: Arc<dyn QueueStore>) -> Router {
    create_router(AppState::new(ServiceConfig::default(), store))
}

/// Issue a request, with a JSON body when given
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

/// Decode a JSON response body
pub async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
