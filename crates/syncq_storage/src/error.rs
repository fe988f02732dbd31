//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the queue lock.
    #[error("queue is locked by another process: {0}")]
    Locked(String),

    /// The store refuses writes.
    #[error("storage is read-only")]
    ReadOnly,
}
