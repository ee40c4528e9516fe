//! Row storage shared by the bundled adapters.

use crate::store::{EntryPatch, NewEntry};
use crate::{EntryId, QueueEntry, QueueType, Timestamp};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;

/// All entries of both partitions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QueueTable {
    entries: Vec<QueueEntry>,
}

impl QueueTable {
    pub(crate) fn list(&self, queue_type: QueueType) -> Vec<QueueEntry> {
        let mut entries: Vec<QueueEntry> = self
            .entries
            .iter()
            .filter(|e| e.queue_type == queue_type)
            .cloned()
            .collect();
        entries.sort_by_key(QueueEntry::sort_key);
        entries
    }

    pub(crate) fn get(&self, id: &EntryId) -> Option<QueueEntry> {
        self.entries.iter().find(|e| e.id == *id).cloned()
    }

    pub(crate) fn first(&self, queue_type: QueueType) -> Option<QueueEntry> {
        self.entries
            .iter()
            .filter(|e| e.queue_type == queue_type)
            .min_by_key(|e| e.sort_key())
            .cloned()
    }

    pub(crate) fn max_position(&self, queue_type: QueueType) -> Option<i64> {
        self.entries
            .iter()
            .filter(|e| e.queue_type == queue_type)
            .map(|e| e.position)
            .max()
    }

    pub(crate) fn tail_position(&self, queue_type: QueueType) -> i64 {
        self.max_position(queue_type).map_or(0, |max| max + 1)
    }

    pub(crate) fn insert(&mut self, new_entry: NewEntry, created_at: Timestamp) -> QueueEntry {
        let entry = QueueEntry {
            id: EntryId::new(),
            value1: new_entry.value1,
            value2: new_entry.value2,
            created_at,
            position: new_entry.position,
            queue_type: new_entry.queue_type,
            moved_at: new_entry.moved_at,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub(crate) fn append(
        &mut self,
        queue_type: QueueType,
        value1: String,
        value2: String,
        created_at: Timestamp,
    ) -> QueueEntry {
        let position = self.tail_position(queue_type);
        self.insert(
            NewEntry {
                value1,
                value2,
                queue_type,
                position,
                moved_at: None,
            },
            created_at,
        )
    }

    pub(crate) fn delete(&mut self, id: &EntryId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.id == *id)?;
        Some(self.entries.remove(index))
    }

    /// Returns the entry before and after the patch
    pub(crate) fn update(
        &mut self,
        id: &EntryId,
        patch: &EntryPatch,
    ) -> Option<(QueueEntry, QueueEntry)> {
        let entry = self.entries.iter_mut().find(|e| e.id == *id)?;
        let before = entry.clone();
        patch.apply_to(entry);
        Some((before, entry.clone()))
    }

    pub(crate) fn relocate_to_tail(
        &mut self,
        id: &EntryId,
        queue_type: QueueType,
        moved_at: Option<Timestamp>,
    ) -> Option<(QueueEntry, QueueEntry)> {
        self.get(id)?;
        let patch = EntryPatch {
            queue_type: Some(queue_type),
            position: Some(self.tail_position(queue_type)),
            moved_at: Some(moved_at),
        };
        self.update(id, &patch)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
