//! # Position Allocation
//!
//! Computes tail positions for a partition and writes entries there.
//!
//! With [`AllocationStrategy::Atomic`] the computation and the write happen in
//! one store call. With [`AllocationStrategy::ReadThenWrite`] the maximum is
//! read first and the write follows in a separate call, so two sessions
//! appending to the same partition at the same time can both land on the
//! same position.

use crate::config::AllocationStrategy;
use crate::store::{EntryPatch, NewEntry, QueueStore};
use crate::{EntryId, QueueEntry, QueueResult, QueueType, Timestamp};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "positions_tests.rs"]
mod tests;

/// Tail allocator for queue partitions
#[derive(Clone)]
pub struct PositionAllocator {
    store: Arc<dyn QueueStore>,
    strategy: AllocationStrategy,
}

impl PositionAllocator {
    pub fn new(store: Arc<dyn QueueStore>, strategy: AllocationStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// `max(position) + 1` for the partition, or 0 when it is empty
    pub async fn next_position(&self, queue_type: QueueType) -> QueueResult<i64> {
        let max = self.store.max_position(queue_type).await?;
        Ok(max.map_or(0, |max| max + 1))
    }

    /// Write a new entry at the tail of `queue_type`
    pub async fn append(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> QueueResult<QueueEntry> {
        match self.strategy {
            AllocationStrategy::Atomic => {
                Ok(self.store.append(queue_type, value1, value2).await?)
            }
            AllocationStrategy::ReadThenWrite => {
                let position = self.next_position(queue_type).await?;
                debug!(queue_type = %queue_type, position = position, "Allocated tail position");
                let entry = self
                    .store
                    .insert(NewEntry {
                        value1,
                        value2,
                        queue_type,
                        position,
                        moved_at: None,
                    })
                    .await?;
                Ok(entry)
            }
        }
    }

    /// Move an existing entry to the tail of `queue_type`
    ///
    /// Returns `None` when the entry no longer exists.
    pub async fn relocate(
        &self,
        id: &EntryId,
        queue_type: QueueType,
        moved_at: Option<Timestamp>,
    ) -> QueueResult<Option<QueueEntry>> {
        match self.strategy {
            AllocationStrategy::Atomic => Ok(self
                .store
                .relocate_to_tail(id, queue_type, moved_at)
                .await?),
            AllocationStrategy::ReadThenWrite => {
                let position = self.next_position(queue_type).await?;
                debug!(entry_id = %id, queue_type = %queue_type, position = position, "Allocated tail position for move");
                let patch = EntryPatch {
                    queue_type: Some(queue_type),
                    position: Some(position),
                    moved_at: Some(moved_at),
                };
                Ok(self.store.update(id, patch).await?)
            }
        }
    }
}
