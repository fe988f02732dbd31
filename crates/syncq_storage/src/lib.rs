//! # SyncQ Storage
//!
//! Storage port and backend implementations for the SyncQ mutation queue.
//!
//! Backends are **opaque snapshot stores**: they hold exactly one byte
//! snapshot of the queue and replace it wholesale on every save. They do not
//! interpret the bytes; the engine owns the snapshot format.
//!
//! ## Design Principles
//!
//! - A backend stores one snapshot (load, save)
//! - `save` either fully replaces the snapshot or leaves the old one intact
//! - Must be `Send + Sync` for shared access
//! - No knowledge of queue items, statuses, or encoding
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For testing and ephemeral queues
//! - [`FileStore`] - Persistent storage using atomic write-then-rename
//!
//! ## Example
//!
//! ```rust
//! use syncq_storage::{InMemoryStore, SnapshotStore};
//!
//! let store = InMemoryStore::new();
//! assert!(store.load().unwrap().is_none());
//! store.save(b"snapshot").unwrap();
//! assert_eq!(store.load().unwrap().as_deref(), Some(&b"snapshot"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::SnapshotStore;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
