//! Tests for the HTTP routes.

use super::*;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
};
use queue_lobby_core::{EntryMarker, QueueSettings};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

/// Clock pinned to one instant
struct FixedClock(Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

fn test_state() -> (Arc<InMemoryQueueStore>, AppState) {
    let store = Arc::new(InMemoryQueueStore::default());
    let state = AppState::new(ServiceConfig::default(), store.clone());
    (store, state)
}

async fn send(app: Router, method: Method, uri: &str, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_reports_healthy_store() {
    let (_store, state) = test_state();

    let response = send(create_router(state), Method::GET, "/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = json(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.store, "ok");
}

// ============================================================================
// Listing
// ============================================================================

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_list_queues_returns_both_partitions() {
        // Arrange
        let (store, state) = test_state();
        store
            .append(QueueType::Main, "A".into(), "B".into())
            .await
            .unwrap();
        store
            .append(QueueType::WaitingRoom, "C".into(), "D".into())
            .await
            .unwrap();

        // Act
        let response = send(create_router(state), Method::GET, "/api/queues", None).await;

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let both: BothQueues = json(response).await;
        assert_eq!(both.main.len(), 1);
        assert_eq!(both.waiting_room.len(), 1);
        assert_eq!(both.waiting_room[0].value1, "C");
    }

    #[tokio::test]
    async fn test_list_queue_annotates_markers_and_labels() {
        let (store, state) = test_state();
        for value in ["a", "b", "c"] {
            store
                .append(QueueType::Main, value.into(), "x".into())
                .await
                .unwrap();
        }

        let response = send(create_router(state), Method::GET, "/api/queues/main", None).await;

        let view: QueueView = json(response).await;
        assert_eq!(view.queue_type, QueueType::Main);
        let markers: Vec<_> = view.entries.iter().map(|e| e.markers.clone()).collect();
        assert_eq!(
            markers,
            vec![vec![EntryMarker::First], vec![], vec![EntryMarker::Last]]
        );
        assert_eq!(view.entries[1].label, "[b] v/s [x]");
        assert!(view.entries.iter().all(|e| e.expiry.is_none()));
    }

    #[tokio::test]
    async fn test_list_waiting_room_includes_countdown() {
        let (store, state) = test_state();
        let entry = store
            .append(QueueType::Main, "X".into(), "Y".into())
            .await
            .unwrap();
        let moved_at = Timestamp::from_rfc3339("2024-05-01T12:00:00Z").unwrap();
        store
            .relocate_to_tail(&entry.id, QueueType::WaitingRoom, Some(moved_at))
            .await
            .unwrap();
        let clock = Arc::new(FixedClock(
            moved_at.add_duration(std::time::Duration::from_secs(90)),
        ));

        let app = create_router(state.with_clock(clock));
        let response = send(app, Method::GET, "/api/queues/waitingRoom", None).await;

        let view: QueueView = json(response).await;
        let expiry = view.entries[0].expiry.clone().unwrap();
        assert!(!expiry.expired);
        assert_eq!(expiry.remaining_ms, Some(210_000));
        assert_eq!(expiry.display, "03:30");
    }

    #[tokio::test]
    async fn test_expired_entry_is_still_listed() {
        let (store, state) = test_state();
        let entry = store
            .append(QueueType::Main, "X".into(), "Y".into())
            .await
            .unwrap();
        let moved_at = Timestamp::from_rfc3339("2024-05-01T12:00:00Z").unwrap();
        store
            .relocate_to_tail(&entry.id, QueueType::WaitingRoom, Some(moved_at))
            .await
            .unwrap();
        let clock = Arc::new(FixedClock(
            moved_at.add_duration(std::time::Duration::from_secs(3600)),
        ));

        let app = create_router(state.with_clock(clock));
        let response = send(app, Method::GET, "/api/queues/waitingRoom", None).await;

        let view: QueueView = json(response).await;
        assert_eq!(view.entries.len(), 1);
        let expiry = view.entries[0].expiry.clone().unwrap();
        assert!(expiry.expired);
        assert_eq!(expiry.display, "EXPIRED");
    }

    #[tokio::test]
    async fn test_unknown_queue_type_is_bad_request() {
        let (_store, state) = test_state();

        let response = send(create_router(state), Method::GET, "/api/queues/side", None).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// ============================================================================
// Mutations
// ============================================================================

mod mutations {
    use super::*;

    #[tokio::test]
    async fn test_push_returns_created_with_refreshed_list() {
        let (_store, state) = test_state();
        let app = create_router(state);

        let response = send(
            app.clone(),
            Method::POST,
            "/api/queues/main/entries",
            Some(r#"{"value1":"A","value2":"B"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            app,
            Method::POST,
            "/api/queues/main/entries",
            Some(r#"{"value1":"C","value2":"D"}"#),
        )
        .await;
        let view: QueueView = json(response).await;
        let positions: Vec<_> = view.entries.iter().map(|e| e.entry.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_push_blank_value_is_bad_request() {
        let (store, state) = test_state();

        let response = send(
            create_router(state),
            Method::POST,
            "/api/queues/main/entries",
            Some(r#"{"value1":"","value2":"B"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_push_malformed_body_is_bad_request() {
        let (_store, state) = test_state();

        let response = send(
            create_router(state),
            Method::POST,
            "/api/queues/main/entries",
            Some(r#"{"value1":"A"}"#),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json(response).await;
        assert!(body["error"].as_str().unwrap().contains("Malformed"));
    }

    #[tokio::test]
    async fn test_pop_empty_partition_is_ok() {
        let (_store, state) = test_state();

        let response = send(
            create_router(state),
            Method::POST,
            "/api/queues/waitingRoom/pop",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let outcome: PopOutcome = json(response).await;
        assert!(outcome.removed.is_none());
        assert!(outcome.entries.is_empty());
    }

    #[tokio::test]
    async fn test_pop_removes_front() {
        let (store, state) = test_state();
        let front = store
            .append(QueueType::Main, "A".into(), "B".into())
            .await
            .unwrap();
        store
            .append(QueueType::Main, "C".into(), "D".into())
            .await
            .unwrap();

        let response = send(create_router(state), Method::POST, "/api/queues/main/pop", None).await;

        let outcome: PopOutcome = json(response).await;
        assert_eq!(outcome.removed.unwrap().id, front.id);
        assert_eq!(outcome.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_entry_reports_partition() {
        let (store, state) = test_state();
        let entry = store
            .append(QueueType::WaitingRoom, "W".into(), "R".into())
            .await
            .unwrap();

        let uri = format!("/api/entries/{}", entry.id);
        let response = send(create_router(state), Method::DELETE, &uri, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let outcome: RemoveOutcome = json(response).await;
        assert_eq!(outcome.queue_type, QueueType::WaitingRoom);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_not_found() {
        let (_store, state) = test_state();

        let uri = format!("/api/entries/{}", EntryId::new());
        let response = send(create_router(state), Method::DELETE, &uri, None).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_entry_id_is_bad_request() {
        let (_store, state) = test_state();

        let response = send(
            create_router(state),
            Method::POST,
            "/api/entries/not-a-uuid/move",
            None,
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_move_returns_both_partitions() {
        let (store, state) = test_state();
        let entry = store
            .append(QueueType::Main, "X".into(), "Y".into())
            .await
            .unwrap();

        let uri = format!("/api/entries/{}/move", entry.id);
        let response = send(create_router(state), Method::POST, &uri, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let both: BothQueues = json(response).await;
        assert!(both.main.is_empty());
        assert_eq!(both.waiting_room[0].id, entry.id);
        assert!(both.waiting_room[0].moved_at.is_some());
    }
}

// ============================================================================
// Store selection
// ============================================================================

mod store_selection {
    use super::*;

    #[tokio::test]
    async fn test_open_store_memory_backend() {
        let store = open_store(&ServiceConfig::default()).await.unwrap();

        assert!(store.list(QueueType::Main).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_store_json_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.storage.backend = StorageBackend::JsonFile;
        config.storage.path = Some(dir.path().join("queues.json"));

        let store = open_store(&config).await.unwrap();
        store
            .append(QueueType::Main, "A".into(), "B".into())
            .await
            .unwrap();

        assert!(dir.path().join("queues.json").exists());
    }

    #[tokio::test]
    async fn test_open_store_json_file_without_path_fails() {
        let config = ServiceConfig {
            storage: StorageConfig {
                backend: StorageBackend::JsonFile,
                path: None,
            },
            queues: QueueSettings::default(),
            ..ServiceConfig::default()
        };

        let result = open_store(&config).await;

        assert!(matches!(
            result,
            Err(ServiceError::Configuration(ConfigError::Missing { .. }))
        ));
    }
}
