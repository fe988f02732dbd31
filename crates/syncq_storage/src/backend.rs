//! Storage port definition.

use crate::error::StorageResult;
use std::sync::Arc;

/// A durable home for the queue snapshot.
///
/// Snapshot stores are **opaque byte stores**. The engine encodes the whole
/// queue into one snapshot and hands it over on every mutation; the store
/// only has to keep the latest snapshot it accepted.
///
/// # Invariants
///
/// - `load` returns exactly the bytes of the last successful `save`
/// - `load` returns `None` when nothing was ever saved
/// - A failed `save` leaves the previous snapshot readable
/// - Stores must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait SnapshotStore: Send + Sync {
    /// Loads the last saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the stored snapshot with `data`.
    ///
    /// After this returns successfully the snapshot is guaranteed to
    /// survive process termination (for durable backends).
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be made durable. In that
    /// case the previous snapshot is still the one `load` returns.
    fn save(&self, data: &[u8]) -> StorageResult<()>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        (**self).load()
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        (**self).save(data)
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        (**self).load()
    }

    fn save(&self, data: &[u8]) -> StorageResult<()> {
        (**self).save(data)
    }
}
