//! Test doubles shared by the unit tests.

use crate::adapters::InMemoryQueueStore;
use crate::store::{
    ChangeFeed, ChangeSubscription, EntryPatch, NewEntry, QueueStore, StoreError,
};
use crate::{EntryId, QueueEntry, QueueType, Timestamp};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

/// Store wrapper that can fail on demand and count reads
pub(crate) struct FlakyStore {
    pub(crate) inner: InMemoryQueueStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    list_calls: AtomicUsize,
    lists_in_flight: AtomicUsize,
    max_lists_in_flight: AtomicUsize,
    list_delay: Option<Duration>,
    max_position_barrier: Option<Arc<Barrier>>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: InMemoryQueueStore::default(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            lists_in_flight: AtomicUsize::new(0),
            max_lists_in_flight: AtomicUsize::new(0),
            list_delay: None,
            max_position_barrier: None,
        }
    }

    /// Make every `list` call take `delay`
    pub(crate) fn with_list_delay(delay: Duration) -> Self {
        Self {
            list_delay: Some(delay),
            ..Self::new()
        }
    }

    /// Hold every `max_position` read until `parties` readers have arrived
    pub(crate) fn with_max_position_barrier(parties: usize) -> Self {
        Self {
            max_position_barrier: Some(Arc::new(Barrier::new(parties))),
            ..Self::new()
        }
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of `list` calls observed running at once
    pub(crate) fn max_lists_in_flight(&self) -> usize {
        self.max_lists_in_flight.load(Ordering::SeqCst)
    }

    fn check_read(&self, operation: &str) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::read(operation, "injected read failure"));
        }
        Ok(())
    }

    fn check_write(&self, operation: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::write(operation, "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FlakyStore {
    async fn list(&self, queue_type: QueueType) -> Result<Vec<QueueEntry>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.lists_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_lists_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        self.lists_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_read("list")?;
        self.inner.list(queue_type).await
    }

    async fn get(&self, id: &EntryId) -> Result<Option<QueueEntry>, StoreError> {
        self.check_read("get")?;
        self.inner.get(id).await
    }

    async fn first(&self, queue_type: QueueType) -> Result<Option<QueueEntry>, StoreError> {
        self.check_read("first")?;
        self.inner.first(queue_type).await
    }

    async fn max_position(&self, queue_type: QueueType) -> Result<Option<i64>, StoreError> {
        self.check_read("max_position")?;
        let max = self.inner.max_position(queue_type).await?;
        if let Some(barrier) = &self.max_position_barrier {
            barrier.wait().await;
        }
        Ok(max)
    }

    async fn insert(&self, entry: NewEntry) -> Result<QueueEntry, StoreError> {
        self.check_write("insert")?;
        self.inner.insert(entry).await
    }

    async fn delete(&self, id: &EntryId) -> Result<bool, StoreError> {
        self.check_write("delete")?;
        self.inner.delete(id).await
    }

    async fn update(
        &self,
        id: &EntryId,
        patch: EntryPatch,
    ) -> Result<Option<QueueEntry>, StoreError> {
        self.check_write("update")?;
        self.inner.update(id, patch).await
    }

    async fn append(
        &self,
        queue_type: QueueType,
        value1: String,
        value2: String,
    ) -> Result<QueueEntry, StoreError> {
        self.check_write("append")?;
        self.inner.append(queue_type, value1, value2).await
    }

    async fn relocate_to_tail(
        &self,
        id: &EntryId,
        queue_type: QueueType,
        moved_at: Option<Timestamp>,
    ) -> Result<Option<QueueEntry>, StoreError> {
        self.check_write("relocate_to_tail")?;
        self.inner.relocate_to_tail(id, queue_type, moved_at).await
    }
}

impl ChangeFeed for FlakyStore {
    fn subscribe(&self, queue_type: QueueType) -> ChangeSubscription {
        self.inner.subscribe(queue_type)
    }
}
