//! Error types for the sync engine.

use crate::item::SyncStatus;
use syncq_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can escape the sync engine.
///
/// Per-item remote failures are never reported through this type; they are
/// recorded on the item (`last_error`). Only environment and programmer
/// errors reach the caller.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The durable store rejected a read or write.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The queue snapshot could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An unknown conflict strategy name was supplied.
    #[error("invalid conflict strategy: {0:?}")]
    InvalidStrategy(String),

    /// An unknown operation name was supplied.
    #[error("invalid operation: {0:?}")]
    InvalidOperation(String),

    /// Invalid item state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current status.
        from: SyncStatus,
        /// Attempted target status.
        to: SyncStatus,
    },

    /// A string is not a valid item id.
    #[error("invalid item id: {0:?}")]
    InvalidItemId(String),

    /// No item with the given id exists.
    #[error("sync item not found: {0}")]
    ItemNotFound(String),
}

impl SyncError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Returns true if the error came from the durable store.
    pub fn is_storage(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_convert() {
        let err: SyncError = StorageError::ReadOnly.into();
        assert!(err.is_storage());
        assert_eq!(err.to_string(), "storage error: storage is read-only");
    }

    #[test]
    fn error_display() {
        let err = SyncError::InvalidStrategy("newest".into());
        assert_eq!(err.to_string(), "invalid conflict strategy: \"newest\"");

        let err = SyncError::InvalidStateTransition {
            from: SyncStatus::Synced,
            to: SyncStatus::Syncing,
        };
        assert_eq!(
            err.to_string(),
            "invalid state transition from synced to syncing"
        );
        assert!(!err.is_storage());
    }
}
