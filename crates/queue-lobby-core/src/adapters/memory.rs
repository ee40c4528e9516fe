//! In-memory queue store for testing and single-process deployments.
//!
//! Provides:
//! - Both partitions in one lock-guarded table
//! - Atomic allocate-and-append and relocate primitives
//! - A broadcast change feed fired after every successful mutation

use super::table::QueueTable;
use crate::store::{
    ChangeBroadcaster, ChangeEvent, ChangeFeed, ChangeSubscription, EntryPatch, NewEntry,
    QueueStore, StoreError,
};
use crate::{EntryId, QueueEntry, QueueType, Timestamp};
use async_trait::async_trait;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Default buffered events per change-feed receiver
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// In-memory queue store
///
/// Cloning yields another handle onto the same table and feed.
#[derive(Debug, Clone)]
pub struct InMemoryQueueStore {
    table: Arc<RwLock<QueueTable>>,
    feed: ChangeBroadcaster,
}

impl InMemoryQueueStore {
    /// Create an empty store whose feed buffers `feed_capacity` events
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            table: Arc::new(RwLock::new(QueueTable::default())),
            feed: ChangeBroadcaster::new(feed_capacity),
        }
    }

    /// Number of entries across both partitions
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read("len")?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, QueueTable>, StoreError> {
        self.table
            .read()
            .map_err(|_| StoreError::read(operation, "table lock poisoned"))
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, QueueTable>, StoreError> {
        self.table
            .write()
            .map_err(|_| StoreError::write(operation, "table lock poisoned"))
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn list(&self, queue_type: QueueType) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.read("list")?.list(queue_type))
    }

    async fn get(&self, id: &EntryId) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.read("get")?.get(id))
    }

    async fn first(&self, queue_type: QueueType) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.read("first")?.first(queue_type))
    }

    async fn max_position(&self, queue_type: QueueType) -> Result<Option<i64>, StoreError> {
        Ok(self.read("max_position")?.max_position(queue_type))
    }

    async fn insert(&self, entry: NewEntry) -> Result<QueueEntry, StoreError> {
        let inserted = self.write("insert")?.insert(entry, Timestamp::now());
        debug!(entry_id = %inserted.id, queue_type = %inserted.queue_type, position = inserted.position, "Inserted entry");
        self.feed.publish(ChangeEvent::inserted(&inserted));
        Ok(inserted)
    }

    async fn delete(&self, id: &EntryId) -> Result<bool, StoreError> {
        let deleted = self.write("delete")?.delete(id);
        match deleted {
            Some(entry) => {
                self.feed.publish(ChangeEvent::deleted(&entry));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> Result<Option<QueueEntry>, StoreError> {
        let updated = self.write("update")?.update(id, &patch);
        Ok(updated.map(|(before, after)| {
            self.feed.publish(ChangeEvent::updated(&before, &after));
            after
        }))
    }

    async fn append(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> Result<QueueEntry, StoreError> {
        let appended = self
            .write("append")?
            .append(queue_type, value1, value2, Timestamp::now());
        self.feed.publish(ChangeEvent::inserted(&appended));
        Ok(appended)
    }

    async fn relocate_to_tail(
        &self,
        id: &EntryId,
        queue_type: QueueType,
        moved_at: Option<Timestamp>,
    ) -> Result<Option<QueueEntry>, StoreError> {
        let relocated = self
            .write("relocate_to_tail")?
            .relocate_to_tail(id, queue_type, moved_at);
        Ok(relocated.map(|(before, after)| {
            self.feed.publish(ChangeEvent::updated(&before, &after));
            after
        }))
    }
}

impl ChangeFeed for InMemoryQueueStore {
    fn subscribe(&self, queue_type: QueueType) -> ChangeSubscription {
        self.feed.subscribe(queue_type)
    }
}
