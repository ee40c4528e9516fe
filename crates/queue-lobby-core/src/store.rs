//! # Store Interface
//!
//! Abstraction over the persistent store holding queue entries and over its
//! change feed.
//!
//! Reads are always filtered on one partition and ordered by `position`
//! ascending. Besides plain single-row writes, stores expose two atomic
//! primitives ([`QueueStore::append`] and [`QueueStore::relocate_to_tail`])
//! that allocate a tail position and write in one step.

use crate::{EntryId, QueueEntry, QueueType, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a store adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("read failed during {operation}: {message}")]
    Read { operation: String, message: String },

    #[error("write failed during {operation}: {message}")]
    Write { operation: String, message: String },
}

impl StoreError {
    pub fn read(operation: &str, message: impl Into<String>) -> Self {
        Self::Read {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    pub fn write(operation: &str, message: impl Into<String>) -> Self {
        Self::Write {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Write Models
// ============================================================================

/// Entry to insert at an explicit position
///
/// The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub value1: String,
    pub value2: String,
    pub queue_type: QueueType,
    pub position: i64,
    pub moved_at: Option<Timestamp>,
}

/// Partial update of a single entry
///
/// `None` leaves a field untouched. `moved_at: Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub queue_type: Option<QueueType>,
    pub position: Option<i64>,
    pub moved_at: Option<Option<Timestamp>>,
}

impl EntryPatch {
    /// Apply the patch to an entry in place
    pub fn apply_to(&self, entry: &mut QueueEntry) {
        if let Some(queue_type) = self.queue_type {
            entry.queue_type = queue_type;
        }
        if let Some(position) = self.position {
            entry.position = position;
        }
        if let Some(moved_at) = self.moved_at {
            entry.moved_at = moved_at;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue_type.is_none() && self.position.is_none() && self.moved_at.is_none()
    }
}

// ============================================================================
// Core Traits
// ============================================================================

/// CRUD access to persisted queue entries
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// All entries of a partition, ordered by position ascending
    async fn list(&self, queue_type: QueueType) -> Result<Vec<QueueEntry>, StoreError>;

    /// Single entry by id, in any partition
    async fn get(&self, id: &EntryId) -> Result<Option<QueueEntry>, StoreError>;

    /// Minimum-position entry of a partition
    async fn first(&self, queue_type: QueueType) -> Result<Option<QueueEntry>, StoreError>;

    /// Maximum position currently used in a partition
    async fn max_position(&self, queue_type: QueueType) -> Result<Option<i64>, StoreError>;

    /// Insert a single entry at the position it carries
    async fn insert(&self, entry: NewEntry) -> Result<QueueEntry, StoreError>;

    /// Delete a single entry, returning whether it existed
    async fn delete(&self, id: &EntryId) -> Result<bool, StoreError>;

    /// Update a subset of fields of a single entry
    async fn update(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> Result<Option<QueueEntry>, StoreError>;

    /// Insert at `max + 1` (or 0) of the partition in one atomic step
    async fn append(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> Result<QueueEntry, StoreError>;

    /// Move an entry to the tail of `queue_type` in one atomic step
    ///
    /// `moved_at` is written as given, so moving back to main clears it.
    async fn relocate_to_tail(
        &self,
        id: &EntryId,
        queue_type: QueueType,
        moved_at: Option<Timestamp>,
    ) -> Result<Option<QueueEntry>, StoreError>;
}

/// Change-feed capability scoped by partition
pub trait ChangeFeed: Send + Sync {
    /// Receiver for events touching `queue_type`
    fn subscribe(&self, queue_type: QueueType) -> ChangeSubscription;
}

// ============================================================================
// Change Events
// ============================================================================

/// Kind of mutating event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single store mutation as seen by the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub entry_id: EntryId,
    /// Partition before the mutation (absent for inserts)
    pub old_queue_type: Option<QueueType>,
    /// Partition after the mutation (absent for deletes)
    pub new_queue_type: Option<QueueType>,
}

impl ChangeEvent {
    pub fn inserted(entry: &QueueEntry) -> Self {
        Self {
            kind: ChangeKind::Insert,
            entry_id: entry.id,
            old_queue_type: None,
            new_queue_type: Some(entry.queue_type),
        }
    }

    pub fn updated(before: &QueueEntry, after: &QueueEntry) -> Self {
        Self {
            kind: ChangeKind::Update,
            entry_id: after.id,
            old_queue_type: Some(before.queue_type),
            new_queue_type: Some(after.queue_type),
        }
    }

    pub fn deleted(entry: &QueueEntry) -> Self {
        Self {
            kind: ChangeKind::Delete,
            entry_id: entry.id,
            old_queue_type: Some(entry.queue_type),
            new_queue_type: None,
        }
    }

    /// Whether the event changed the contents of `queue_type`
    pub fn touches(&self, queue_type: QueueType) -> bool {
        self.old_queue_type == Some(queue_type) || self.new_queue_type == Some(queue_type)
    }
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    /// An event touching the subscribed partition
    Changed(ChangeEvent),
    /// The receiver fell behind and skipped `n` events; treat as a change
    Lagged(u64),
}

/// Change-feed receiver filtered on one partition
pub struct ChangeSubscription {
    queue_type: QueueType,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl ChangeSubscription {
    pub fn new(queue_type: QueueType, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            queue_type,
            receiver,
        }
    }

    pub fn queue_type(&self) -> QueueType {
        self.queue_type
    }

    /// Wait for the next signal for this partition
    ///
    /// Returns `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<ChangeSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.touches(self.queue_type) => {
                    return Some(ChangeSignal::Changed(event))
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => return Some(ChangeSignal::Lagged(skipped)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Broadcast fan-out used by the bundled adapters
///
/// Publishing never blocks and is fire-and-forget: events sent while nobody
/// listens are dropped.
#[derive(Debug, Clone)]
pub struct ChangeBroadcaster {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBroadcaster {
    /// Capacity is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ChangeFeed for ChangeBroadcaster {
    fn subscribe(&self, queue_type: QueueType) -> ChangeSubscription {
        ChangeSubscription::new(queue_type, self.tx.subscribe())
    }
}
