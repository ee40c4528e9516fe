//! # JSON File Queue Store
//!
//! Local filesystem implementation of [`QueueStore`] that keeps the table in
//! memory and persists it as a single JSON document after every mutation.

use super::table::QueueTable;
use crate::store::{
    ChangeBroadcaster, ChangeEvent, ChangeFeed, ChangeSubscription, EntryPatch, NewEntry,
    QueueStore, StoreError,
};
use crate::{EntryId, QueueEntry, QueueType, Timestamp};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[cfg(test)]
#[path = "json_file_tests.rs"]
mod tests;

/// File-backed queue store
///
/// Writes go to a temporary file that is renamed over the previous
/// document. The in-memory table only changes once that rename succeeds, so
/// a failed write leaves both the file and the visible state untouched.
///
/// # Examples
///
/// ```no_run
/// use queue_lobby_core::adapters::JsonFileQueueStore;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = JsonFileQueueStore::open(PathBuf::from("./data/queues.json"), 256).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct JsonFileQueueStore {
    path: PathBuf,
    table: Mutex<QueueTable>,
    feed: ChangeBroadcaster,
}

impl JsonFileQueueStore {
    /// Open the store at `path`, loading existing contents if present
    ///
    /// # Errors
    ///
    /// Returns a read error if the parent directory cannot be created or an
    /// existing file cannot be parsed.
    pub async fn open(path: PathBuf, feed_capacity: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::read("open", format!("Failed to create directory: {}", e))
            })?;
        }

        let table = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<QueueTable>(&bytes).map_err(|e| {
                StoreError::read("open", format!("Failed to parse {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => QueueTable::default(),
            Err(e) => {
                return Err(StoreError::read(
                    "open",
                    format!("Failed to read {}: {}", path.display(), e),
                ))
            }
        };

        info!(path = %path.display(), entries = table.len(), "Opened JSON queue store");

        Ok(Self {
            path,
            table: Mutex::new(table),
            feed: ChangeBroadcaster::new(feed_capacity),
        })
    }

    /// Location of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutation` to a copy of the table, persist it, then commit
    async fn mutate<R>(
        &self,
        operation: &str,
        mutation: impl FnOnce(&mut QueueTable) -> R,
    ) -> Result<R, StoreError> {
        let mut guard = self.table.lock().await;
        let mut next = guard.clone();
        let result = mutation(&mut next);

        if let Err(e) = self.persist(&next).await {
            error!(operation = operation, path = %self.path.display(), error = %e, "Failed to persist queue table");
            return Err(StoreError::write(operation, e.to_string()));
        }

        *guard = next;
        Ok(result)
    }

    async fn persist(&self, table: &QueueTable) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(table)?;

        // Write to temporary file first (atomic write pattern)
        let temp_path = self.temp_path();
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&json).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, &self.path).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if written.is_err() {
            if let Err(e) = fs::remove_file(&temp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %e, "Failed to remove temporary file");
                }
            }
        }

        written
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl QueueStore for JsonFileQueueStore {
    async fn list(&self, queue_type: QueueType) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.table.lock().await.list(queue_type))
    }

    async fn get(&self, id: &EntryId) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.table.lock().await.get(id))
    }

    async fn first(&self, queue_type: QueueType) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.table.lock().await.first(queue_type))
    }

    async fn max_position(&self, queue_type: QueueType) -> Result<Option<i64>, StoreError> {
        Ok(self.table.lock().await.max_position(queue_type))
    }

    async fn insert(&self, entry: NewEntry) -> Result<QueueEntry, StoreError> {
        let now = Timestamp::now();
        let inserted = self
            .mutate("insert", move |table| table.insert(entry, now))
            .await?;
        self.feed.publish(ChangeEvent::inserted(&inserted));
        Ok(inserted)
    }

    async fn delete(&self, id: &EntryId) -> Result<bool, StoreError> {
        let deleted = self.mutate("delete", |table| table.delete(id)).await?;
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
        let updated = self
            .mutate("update", |table| table.update(id, &patch))
            .await?;
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
        let now = Timestamp::now();
        let appended = self
            .mutate("append", move |table| {
                table.append(queue_type, value1, value2, now)
            })
            .await?;
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
            .mutate("relocate_to_tail", |table| {
                table.relocate_to_tail(id, queue_type, moved_at)
            })
            .await?;
        Ok(relocated.map(|(before, after)| {
            self.feed.publish(ChangeEvent::updated(&before, &after));
            after
        }))
    }
}

impl ChangeFeed for JsonFileQueueStore {
    fn subscribe(&self, queue_type: QueueType) -> ChangeSubscription {
        self.feed.subscribe(queue_type)
    }
}
