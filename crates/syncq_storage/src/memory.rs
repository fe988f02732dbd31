//! In-memory snapshot store for testing.

use crate::backend::SnapshotStore;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory snapshot store.
///
/// This store keeps the snapshot in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral queues that don't need persistence
///
/// It can be switched to read-only mode to simulate an unavailable medium,
/// which makes every `save` fail with [`StorageError::ReadOnly`].
///
/// # Example
///
/// ```rust
/// use syncq_storage::{InMemoryStore, SnapshotStore};
///
/// let store = InMemoryStore::new();
/// store.save(b"v1").unwrap();
/// store.set_read_only(true);
/// assert!(store.save(b"v2").is_err());
/// assert_eq!(store.load().unwrap().unwrap(), b"v1");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    snapshot: RwLock<Option<Vec<u8>>>,
    read_only: AtomicBool,
    saves: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a pre-existing snapshot.
    ///
    /// Useful for testing recovery and corrupt-snapshot scenarios.
    #[must_use]
    pub fn with_snapshot(data: Vec<u8>) -> Self {
        Self {
            snapshot: RwLock::new(Some(data)),
            ..Self::default()
        }
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Returns the number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.snapshot.read().clone()
    }
}

impl SnapshotStore for InMemoryStore {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.snapshot.read().clone())
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::ReadOnly);
        }
        *self.snapshot.write() = Some(data.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_empty_load() {
        let store = InMemoryStore::new();
        assert!(store.load().unwrap().is_none());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn memory_save_replaces() {
        let store = InMemoryStore::new();
        store.save(b"first").unwrap();
        store.save(b"second").unwrap();

        assert_eq!(store.load().unwrap().unwrap(), b"second");
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn memory_read_only_keeps_previous() {
        let store = InMemoryStore::with_snapshot(b"old".to_vec());
        store.set_read_only(true);

        let result = store.save(b"new");
        assert!(matches!(result, Err(StorageError::ReadOnly)));
        assert_eq!(store.snapshot().unwrap(), b"old");

        store.set_read_only(false);
        store.save(b"new").unwrap();
        assert_eq!(store.snapshot().unwrap(), b"new");
    }

    #[test]
    fn memory_empty_snapshot_is_not_none() {
        let store = InMemoryStore::new();
        store.save(b"").unwrap();
        assert_eq!(store.load().unwrap(), Some(Vec::new()));
    }
}
