//! # Queue Operations
//!
//! Push, pop, remove and move, composed from the store and the position
//! allocator. Every mutation returns a fresh read of the partition(s) it
//! touched so the calling session can update its view immediately.
//!
//! Operations never retry. A store failure surfaces as a failed operation
//! and nothing is assumed about partial progress.

use crate::config::AllocationStrategy;
use crate::positions::PositionAllocator;
use crate::store::QueueStore;
use crate::{validate_value, EntryId, QueueEntry, QueueError, QueueResult, QueueType, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
#[path = "operations_tests.rs"]
mod tests;

/// Both partitions read back to back
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BothQueues {
    pub main: Vec<QueueEntry>,
    #[serde(rename = "waitingRoom")]
    pub waiting_room: Vec<QueueEntry>,
}

impl BothQueues {
    pub fn get(&self, queue_type: QueueType) -> &[QueueEntry] {
        match queue_type {
            QueueType::Main => &self.main,
            QueueType::WaitingRoom => &self.waiting_room,
        }
    }
}

/// Result of a pop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopOutcome {
    /// The former front, absent when the partition was already empty
    pub removed: Option<QueueEntry>,
    pub entries: Vec<QueueEntry>,
}

/// Result of a remove-by-id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOutcome {
    /// Partition the entry belonged to
    pub queue_type: QueueType,
    pub removed: QueueEntry,
    pub entries: Vec<QueueEntry>,
}

/// Queue operations over a shared store
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn QueueStore>,
    allocator: PositionAllocator,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, strategy: AllocationStrategy) -> Self {
        let allocator = PositionAllocator::new(store.clone(), strategy);
        Self { store, allocator }
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn allocator(&self) -> &PositionAllocator {
        &self.allocator
    }

    /// Ordered entries of one partition
    pub async fn list(&self, queue_type: QueueType) -> QueueResult<Vec<QueueEntry>> {
        Ok(self.store.list(queue_type).await?)
    }

    /// Ordered entries of both partitions
    pub async fn list_all(&self) -> QueueResult<BothQueues> {
        let main = self.list(QueueType::Main).await?;
        let waiting_room = self.list(QueueType::WaitingRoom).await?;
        Ok(BothQueues { main, waiting_room })
    }

    /// Append a new entry to the back of `queue_type`
    #[instrument(skip(self, value1, value2), fields(queue_type = %queue_type))]
    pub async fn push(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> QueueResult<Vec<QueueEntry>> {
        validate_value("value1", &value1)?;
        validate_value("value2", &value2)?;

        let entry = self
            .allocator
            .append(queue_type, value1, value2)
            .await
            .inspect_err(|e| error!(error = %e, "Push failed"))?;

        info!(entry_id = %entry.id, position = entry.position, "Pushed entry");
        self.list(queue_type).await
    }

    pub async fn push_main(&self, value1: String, value2: String) -> QueueResult<Vec<QueueEntry>> {
        self.push(QueueType::Main, value1, value2).await
    }

    pub async fn push_waiting_room(
        &self,
        value1: String,
        value2: String,
    ) -> QueueResult<Vec<QueueEntry>> {
        self.push(QueueType::WaitingRoom, value1, value2).await
    }

    /// Remove the front of `queue_type`
    ///
    /// Popping an empty partition is not an error.
    #[instrument(skip(self), fields(queue_type = %queue_type))]
    pub async fn pop(&self, queue_type: QueueType) -> QueueResult<PopOutcome> {
        let Some(front) = self.store.first(queue_type).await? else {
            return Ok(PopOutcome {
                removed: None,
                entries: self.list(queue_type).await?,
            });
        };

        let deleted = self
            .store
            .delete(&front.id)
            .await
            .inspect_err(|e| error!(entry_id = %front.id, error = %e, "Pop failed"))?;

        let removed = if deleted {
            info!(entry_id = %front.id, position = front.position, "Popped entry");
            Some(front)
        } else {
            // Another session removed it between our read and delete
            warn!(entry_id = %front.id, "Front entry vanished before pop");
            None
        };

        Ok(PopOutcome {
            removed,
            entries: self.list(queue_type).await?,
        })
    }

    pub async fn pop_main(&self) -> QueueResult<PopOutcome> {
        self.pop(QueueType::Main).await
    }

    pub async fn pop_waiting_room(&self) -> QueueResult<PopOutcome> {
        self.pop(QueueType::WaitingRoom).await
    }

    /// Delete one entry from whichever partition holds it
    ///
    /// Remaining entries keep their positions.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn remove_by_id(&self, id: &EntryId) -> QueueResult<RemoveOutcome> {
        let entry = self
            .store
            .get(id)
            .await?
            .ok_or(QueueError::NotFound { id: *id })?;

        let deleted = self
            .store
            .delete(id)
            .await
            .inspect_err(|e| error!(error = %e, "Remove failed"))?;
        if !deleted {
            return Err(QueueError::NotFound { id: *id });
        }

        info!(queue_type = %entry.queue_type, position = entry.position, "Removed entry");
        let queue_type = entry.queue_type;
        Ok(RemoveOutcome {
            queue_type,
            removed: entry,
            entries: self.list(queue_type).await?,
        })
    }

    /// Move an entry to the back of the waiting room
    ///
    /// Stamps `moved_at` with the current time. An entry that is already in
    /// the waiting room goes to the back again with a fresh `moved_at`.
    #[instrument(skip(self), fields(entry_id = %id))]
    pub async fn move_to_waiting_room(&self, id: &EntryId) -> QueueResult<BothQueues> {
        let entry = self
            .store
            .get(id)
            .await?
            .ok_or(QueueError::NotFound { id: *id })?;

        debug!(from = %entry.queue_type, "Moving entry to waiting room");

        let moved_at = Timestamp::now();
        let moved = self
            .allocator
            .relocate(id, QueueType::WaitingRoom, Some(moved_at))
            .await
            .inspect_err(|e| error!(error = %e, "Move failed"))?
            .ok_or(QueueError::NotFound { id: *id })?;

        info!(position = moved.position, moved_at = %moved_at, "Moved entry to waiting room");
        self.list_all().await
    }
}
