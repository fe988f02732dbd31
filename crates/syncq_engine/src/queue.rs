//! Durable, ordered queue of sync items.
//!
//! The queue is write-through: every mutating call builds the next state on a
//! copy, saves the encoded snapshot, and only then publishes the copy as the
//! in-memory view. A failed save returns the error and leaves the in-memory
//! queue exactly as durable storage has it.

use crate::clock::Clock;
use crate::codec::{decode_snapshot, encode_snapshot};
use crate::error::{SyncError, SyncResult};
use crate::item::{ItemId, Operation, Payload, SyncItem, SyncStatus};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use syncq_storage::SnapshotStore;

/// Per-status item counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Items waiting for an attempt.
    pub pending: usize,
    /// Items with an attempt in flight.
    pub syncing: usize,
    /// Acknowledged items not yet compacted.
    pub synced: usize,
    /// Items out of attempts.
    pub failed: usize,
    /// Items awaiting conflict resolution.
    pub conflict: usize,
}

impl StatusCounts {
    /// Total number of items.
    pub fn total(&self) -> usize {
        self.pending + self.syncing + self.synced + self.failed + self.conflict
    }

    fn add(&mut self, status: SyncStatus) {
        match status {
            SyncStatus::Pending => self.pending += 1,
            SyncStatus::Syncing => self.syncing += 1,
            SyncStatus::Synced => self.synced += 1,
            SyncStatus::Failed => self.failed += 1,
            SyncStatus::Conflict => self.conflict += 1,
        }
    }
}

/// Durable queue of pending mutations.
///
/// Pure data access: ordering and persistence, no retry or conflict policy.
pub struct QueueStore<S: SnapshotStore> {
    store: S,
    items: RwLock<Vec<SyncItem>>,
    clock: Arc<dyn Clock>,
}

impl<S: SnapshotStore> QueueStore<S> {
    /// Opens the queue, loading the last persisted snapshot.
    ///
    /// Items left in `syncing` by an interrupted pass are moved back to
    /// `pending`; their attempt counts are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or decoded, or if the
    /// recovered queue cannot be saved.
    pub fn open(store: S, clock: Arc<dyn Clock>) -> SyncResult<Self> {
        let items = match store.load()? {
            Some(bytes) => decode_snapshot(&bytes)?,
            None => Vec::new(),
        };

        let queue = Self {
            store,
            items: RwLock::new(items),
            clock,
        };

        queue.reset_interrupted()?;
        tracing::debug!(items = queue.len(), "queue opened");
        Ok(queue)
    }

    /// Moves items stuck in `syncing` back to `pending`.
    ///
    /// Only valid while no pass is running.
    pub(crate) fn reset_interrupted(&self) -> SyncResult<usize> {
        let recovered = self.write_through(|items| {
            let mut recovered = 0;
            for item in items.iter_mut().filter(|i| i.status == SyncStatus::Syncing) {
                item.transition(SyncStatus::Pending)?;
                recovered += 1;
            }
            Ok(recovered)
        })?;
        if recovered > 0 {
            tracing::info!(recovered, "reset interrupted items to pending");
        }
        Ok(recovered)
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs `f` on a copy of the queue and commits the copy after a
    /// successful save. Unchanged queues are not saved.
    fn write_through<R>(
        &self,
        f: impl FnOnce(&mut Vec<SyncItem>) -> SyncResult<R>,
    ) -> SyncResult<R> {
        let mut guard = self.items.write();
        let mut next = guard.clone();
        let result = f(&mut next)?;

        if next != *guard {
            let bytes = encode_snapshot(&next)?;
            if let Err(e) = self.store.save(&bytes) {
                tracing::warn!(error = %e, "queue persist failed; in-memory state unchanged");
                return Err(e.into());
            }
            *guard = next;
        }

        Ok(result)
    }

    /// Appends a new pending item and returns its id.
    pub fn enqueue(
        &self,
        operation: Operation,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Option<Payload>,
    ) -> SyncResult<ItemId> {
        let item = SyncItem::new(
            operation,
            resource_type,
            resource_id,
            payload,
            self.clock.now_millis(),
        );
        self.push(item)
    }

    /// Appends a new pending item carrying a local version marker.
    pub fn enqueue_versioned(
        &self,
        operation: Operation,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Option<Payload>,
        local_version: u64,
    ) -> SyncResult<ItemId> {
        let item = SyncItem::new(
            operation,
            resource_type,
            resource_id,
            payload,
            self.clock.now_millis(),
        )
        .with_local_version(local_version);
        self.push(item)
    }

    fn push(&self, item: SyncItem) -> SyncResult<ItemId> {
        let id = item.id;
        tracing::debug!(
            %id,
            operation = %item.operation,
            resource_type = %item.resource_type,
            resource_id = %item.resource_id,
            "enqueue"
        );
        self.write_through(|items| {
            items.push(item);
            Ok(())
        })?;
        Ok(id)
    }

    /// Deletes an item. Returns false if it was not present.
    pub fn remove(&self, id: ItemId) -> SyncResult<bool> {
        self.write_through(|items| {
            let before = items.len();
            items.retain(|item| item.id != id);
            Ok(items.len() != before)
        })
    }

    /// Returns a copy of an item.
    pub fn get(&self, id: ItemId) -> Option<SyncItem> {
        self.items.read().iter().find(|item| item.id == id).cloned()
    }

    /// Items in `pending` or `failed` status, in enqueue order.
    pub fn list_pending(&self) -> Vec<SyncItem> {
        self.items
            .read()
            .iter()
            .filter(|item| matches!(item.status, SyncStatus::Pending | SyncStatus::Failed))
            .cloned()
            .collect()
    }

    /// Items with the given status, in enqueue order.
    pub fn list_by_status(&self, status: SyncStatus) -> Vec<SyncItem> {
        self.items
            .read()
            .iter()
            .filter(|item| item.status == status)
            .cloned()
            .collect()
    }

    /// All items, in enqueue order.
    pub fn list_all(&self) -> Vec<SyncItem> {
        self.items.read().clone()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns true if the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Per-status counts.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in self.items.read().iter() {
            counts.add(item.status);
        }
        counts
    }

    /// Removes all `synced` items. Returns how many were removed.
    pub fn compact_synced(&self) -> SyncResult<usize> {
        self.write_through(|items| {
            let before = items.len();
            items.retain(|item| item.status != SyncStatus::Synced);
            Ok(before - items.len())
        })
    }

    /// Removes every item. Returns how many were removed.
    pub fn clear(&self) -> SyncResult<usize> {
        self.write_through(|items| {
            let removed = items.len();
            items.clear();
            Ok(removed)
        })
    }

    /// Moves every `failed` item back to `pending` with its attempts reset.
    pub fn retry_failed(&self) -> SyncResult<usize> {
        self.write_through(|items| {
            let mut reset = 0;
            for item in items.iter_mut().filter(|i| i.status == SyncStatus::Failed) {
                item.transition(SyncStatus::Pending)?;
                item.attempts = 0;
                item.last_error = None;
                item.next_attempt_at = None;
                reset += 1;
            }
            Ok(reset)
        })
    }

    /// Applies `f` to one item and persists. Returns the updated item.
    pub(crate) fn update(
        &self,
        id: ItemId,
        f: impl FnOnce(&mut SyncItem) -> SyncResult<()>,
    ) -> SyncResult<SyncItem> {
        self.write_through(|items| {
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or_else(|| SyncError::ItemNotFound(id.to_string()))?;
            f(item)?;
            Ok(item.clone())
        })
    }
}

impl<S: SnapshotStore> std::fmt::Debug for QueueStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}
