//! # Queue-Lobby Core
//!
//! Core logic for two shared FIFO queues ("main" and "waiting room") that many
//! client sessions observe and mutate concurrently through a persistent store.
//!
//! ## Architecture
//!
//! - Store access sits behind the [`store::QueueStore`] and [`store::ChangeFeed`] traits
//! - [`operations::QueueService`] composes push, pop, remove and move on top of a store
//! - [`notifier::ChangeNotifier`] and [`poller::PollReconciler`] both drive the same
//!   idempotent [`reconcile::Reconciler::refresh`]
//! - [`session::QueueSession`] is one client's cache, fed by both channels
//! - [`expiry`] derives the display-only countdown for waiting-room entries
//!
//! ## Usage
//!
//! ```rust
//! use queue_lobby_core::{QueueType, Timestamp};
//!
//! let queue_type: QueueType = "waitingRoom".parse().unwrap();
//! assert_eq!(queue_type, QueueType::WaitingRoom);
//! let _now = Timestamp::now();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use uuid::Uuid;

/// Standard result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Maximum length of either payload value
pub const MAX_VALUE_LENGTH: usize = 200;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identity of a persisted queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a new random entry ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<Uuid>().map_err(|_| ValidationError::InvalidFormat {
            field: "id".to_string(),
            message: format!("'{}' is not a UUID", s),
        })?;
        Ok(Self(id))
    }
}

/// The partition an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueType {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "waitingRoom")]
    WaitingRoom,
}

impl QueueType {
    /// Both partitions, main first
    pub const ALL: [QueueType; 2] = [QueueType::Main, QueueType::WaitingRoom];

    /// Wire name used by the store discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::WaitingRoom => "waitingRoom",
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "waitingRoom" => Ok(Self::WaitingRoom),
            other => Err(ValidationError::InvalidFormat {
                field: "queue_type".to_string(),
                message: format!("expected 'main' or 'waitingRoom', got '{}'", other),
            }),
        }
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("expected RFC3339 datetime, got '{}'", s),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Timestamp shifted forward by `duration`
    pub fn add_duration(&self, duration: Duration) -> Self {
        chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| self.0.checked_add_signed(d))
            .map(Self)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future
    pub fn duration_since(&self, earlier: Self) -> Duration {
        self.0
            .signed_duration_since(earlier.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Queue Entry
// ============================================================================

/// A persisted queue entry
///
/// `position` orders entries within one `queue_type`; gaps are normal after
/// removals. `moved_at` is set while the entry sits in the waiting room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub value1: String,
    pub value2: String,
    pub created_at: Timestamp,
    pub position: i64,
    pub queue_type: QueueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_at: Option<Timestamp>,
}

impl QueueEntry {
    /// Human-readable pairing of the two values
    pub fn label(&self) -> String {
        format!("[{}] v/s [{}]", self.value1, self.value2)
    }

    /// Ordering key used for every partition read
    ///
    /// Position first; `created_at` and id only break ties left behind by
    /// the read-then-write allocator.
    pub fn sort_key(&self) -> (i64, Timestamp, EntryId) {
        (self.position, self.created_at, self.id)
    }
}

/// Front/back marker for an entry in a partition listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMarker {
    First,
    Last,
}

/// Markers for the entry at `index` of a list of `len` entries
///
/// A single-entry list is both first and last.
pub fn markers_for(index: usize, len: usize) -> Vec<EntryMarker> {
    let mut markers = Vec::new();
    if len == 0 || index >= len {
        return markers;
    }
    if index == 0 {
        markers.push(EntryMarker::First);
    }
    if index == len - 1 {
        markers.push(EntryMarker::Last);
    }
    markers
}

/// Validate one payload value of a new entry
pub fn validate_value(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_VALUE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_VALUE_LENGTH,
        });
    }

    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },
}

/// Invalid settings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Top-level error type for queue operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Store read failed during {operation}: {message}")]
    StoreRead { operation: String, message: String },

    #[error("Store write failed during {operation}: {message}")]
    StoreWrite { operation: String, message: String },

    #[error("Queue entry not found: {id}")]
    NotFound { id: EntryId },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and a later attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StoreRead { .. } => true,
            Self::StoreWrite { .. } => true,
            Self::NotFound { .. } => false,
            Self::Validation(_) => false,
        }
    }
}

impl From<store::StoreError> for QueueError {
    fn from(error: store::StoreError) -> Self {
        match error {
            store::StoreError::Read { operation, message } => Self::StoreRead { operation, message },
            store::StoreError::Write { operation, message } => {
                Self::StoreWrite { operation, message }
            }
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Tunable queue settings
pub mod config;

/// Store and change-feed abstractions
pub mod store;

/// Store implementations
pub mod adapters;

/// Tail position allocation
pub mod positions;

/// Push, pop, remove and move
pub mod operations;

/// Idempotent partition refresh shared by both reconciliation channels
pub mod reconcile;

/// Push channel subscriptions
pub mod notifier;

/// Polling fallback
pub mod poller;

/// Per-session cache fed by the notifier and the poller
pub mod session;

/// Display-only countdown for waiting-room entries
pub mod expiry;

pub use adapters::{InMemoryQueueStore, JsonFileQueueStore};
pub use config::{AllocationStrategy, QueueSettings};
pub use expiry::{Clock, ExpiryStatus, ExpiryTicker, SystemClock};
pub use notifier::{ChangeNotifier, Subscription};
pub use operations::{BothQueues, PopOutcome, QueueService, RemoveOutcome};
pub use poller::{PollHandle, PollReconciler};
pub use positions::PositionAllocator;
pub use reconcile::{OnChange, PartitionUpdate, Reconciler, RefreshSource};
pub use session::{PartitionState, QueueSession};
pub use store::{
    ChangeBroadcaster, ChangeEvent, ChangeFeed, ChangeKind, ChangeSignal, ChangeSubscription,
    EntryPatch, NewEntry, QueueStore, StoreError,
};

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
