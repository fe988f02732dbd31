//! # SyncQ Engine
//!
//! Offline-first mutation queue and sync engine.
//!
//! This crate provides:
//! - Durable, write-through queue of create/update/delete mutations
//! - Per-item state machine (pending → syncing → synced / failed / conflict)
//! - Retry with exponential backoff and jitter
//! - Conflict detection and resolution strategies
//! - Status and conflict notifications
//!
//! ## Architecture
//!
//! The host owns one [`SyncEngine`] and drives it:
//! 1. Local mutations are enqueued and persisted immediately
//! 2. A pass ([`SyncEngine::process_queue`]) hands each eligible item to the
//!    host's [`RemoteApplier`]
//! 3. Outcomes advance the item; failures are retried after a backoff delay,
//!    conflicts go through the configured [`ConflictStrategy`]
//! 4. Status and manual conflicts are published through the [`StatusNotifier`]
//!
//! ## Key Invariants
//!
//! - The in-memory queue never runs ahead of durable storage
//! - Items for the same resource are applied in enqueue order
//! - At most one pass runs at a time
//! - A synced item is never modified again
//! - Remote failures are recorded on the item; they never abort a pass

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod clock;
mod codec;
mod config;
mod conflict;
mod connectivity;
mod engine;
mod error;
mod item;
mod notifier;
mod processor;
mod queue;

pub use backoff::BackoffScheduler;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode_snapshot, encode_snapshot, SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
pub use config::{EngineConfig, RetryConfig, RetryPacing};
pub use conflict::{content_hash, has_conflict, resolve, Conflict, ConflictStrategy};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use engine::{StatusSummary, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use item::{ItemId, Operation, Payload, SyncItem, SyncStatus};
pub use notifier::{StatusNotifier, Subscription};
pub use processor::{ApplyOutcome, PassReport, ProcessorStats, RemoteApplier, SyncProcessor};
pub use queue::{QueueStore, StatusCounts};
