//! Request and response types for the API.

use queue_lobby_core::expiry::evaluate;
use queue_lobby_core::{markers_for, EntryMarker, ExpiryStatus, QueueEntry, QueueType, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Requests
// ============================================================================

/// Body of a push request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub value1: String,
    pub value2: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Countdown shown next to a waiting-room entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryView {
    pub expired: bool,
    pub remaining_ms: Option<u64>,
    pub display: String,
}

impl ExpiryView {
    /// `None` when there is nothing to show
    pub fn from_status(status: ExpiryStatus) -> Option<Self> {
        match status {
            ExpiryStatus::Hidden => None,
            other => Some(Self {
                expired: other.is_expired(),
                remaining_ms: other.remaining().map(|r| r.as_millis() as u64),
                display: other.to_string(),
            }),
        }
    }
}

/// Queue entry annotated for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub label: String,
    pub markers: Vec<EntryMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<ExpiryView>,
}

/// One partition, annotated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueView {
    pub queue_type: QueueType,
    pub entries: Vec<EntryView>,
}

impl QueueView {
    /// Annotate `entries` with front/back markers and expiry as of `now`
    pub fn build(
        queue_type: QueueType,
        entries: Vec<QueueEntry>,
        now: Timestamp,
        expiry_duration: Duration,
    ) -> Self {
        let len = entries.len();
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| EntryView {
                label: entry.label(),
                markers: markers_for(index, len),
                expiry: ExpiryView::from_status(evaluate(entry.moved_at, now, expiry_duration)),
                entry,
            })
            .collect();

        Self {
            queue_type,
            entries,
        }
    }
}
