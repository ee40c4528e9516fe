//! Tests for HTTP error handling and status code mapping

use super::*;
use queue_lobby_core::EntryId;

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Verify that a missing entry returns 404 Not Found
#[tokio::test]
async fn test_not_found_returns_404() {
    let error = ApiError::Queue(QueueError::NotFound { id: EntryId::new() });

    let response = error.into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get("Retry-After").is_none());
}

/// Verify that store failures return 503 with a Retry-After header
#[tokio::test]
async fn test_store_failures_return_503_with_retry_after() {
    let errors = [
        QueueError::StoreRead {
            operation: "list".to_string(),
            message: "connection reset".to_string(),
        },
        QueueError::StoreWrite {
            operation: "append".to_string(),
            message: "disk full".to_string(),
        },
    ];

    for error in errors {
        let response = ApiError::Queue(error).into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok());
        assert_eq!(retry_after, Some("5"));
    }
}

/// Verify that validation failures return 400 Bad Request
#[tokio::test]
async fn test_validation_errors_return_400() {
    let errors = [
        ApiError::Queue(QueueError::Validation(ValidationError::Required {
            field: "value1".to_string(),
        })),
        ApiError::InvalidRequest(ValidationError::InvalidFormat {
            field: "queue_type".to_string(),
            message: "expected 'main' or 'waitingRoom', got 'side'".to_string(),
        }),
        ApiError::MalformedBody {
            message: "missing field `value2`".to_string(),
        },
    ];

    for error in errors {
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

/// Verify error response body contains error details
#[tokio::test]
async fn test_error_response_contains_details() {
    let error = ApiError::Queue(QueueError::Validation(ValidationError::TooLong {
        field: "value2".to_string(),
        max_length: 200,
    }));

    let body = body_json(error.into_response()).await;

    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("value2"));
    assert!(body["timestamp"].is_string());
}

/// Verify error responses include proper content-type
#[tokio::test]
async fn test_error_response_has_json_content_type() {
    let error = ApiError::MalformedBody {
        message: "expected value".to_string(),
    };

    let response = error.into_response();

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());
    assert_eq!(content_type, Some("application/json"));
}
