//! # SyncQ Testkit
//!
//! Test utilities for SyncQ.
//!
//! This crate provides:
//! - Engine fixtures on a manual clock (in-memory or temp-file backed)
//! - Scripted and recording apply functions
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use syncq_testkit::prelude::*;
//! use syncq_engine::{ApplyOutcome, Operation, SyncStatus};
//!
//! let engine = TestEngine::memory();
//! let id = engine.enqueue(Operation::Create, "product", "p1", None).unwrap();
//!
//! let mut remote = ScriptedApplier::succeeding();
//! remote.script("p1", [ApplyOutcome::failure("offline")]);
//! engine.process_queue(&mut remote).unwrap();
//! assert_eq!(engine.get(id).unwrap().status, SyncStatus::Pending);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
