//! Status and conflict notifications.
//!
//! Two delivery styles are supported:
//! - callbacks registered with [`StatusNotifier::subscribe`] and
//!   [`StatusNotifier::subscribe_conflict`]
//! - channels returned by [`StatusNotifier::watch`] and
//!   [`StatusNotifier::watch_conflicts`]
//!
//! Events are delivered to current subscribers only; nothing is replayed.
//! A panicking callback is logged and skipped, it never reaches the publisher
//! or other subscribers.

use crate::conflict::Conflict;
use crate::item::SyncStatus;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};

type StatusCallback = Arc<dyn Fn(SyncStatus) + Send + Sync>;
type ConflictCallback = Arc<dyn Fn(&Conflict) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    status: RwLock<Vec<(u64, StatusCallback)>>,
    conflict: RwLock<Vec<(u64, ConflictCallback)>>,
    status_senders: RwLock<Vec<Sender<SyncStatus>>>,
    conflict_senders: RwLock<Vec<Sender<Conflict>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topic {
    Status,
    Conflict,
}

/// Publishes queue status and conflict events to subscribers.
///
/// Cloning yields a handle to the same subscriber set.
#[derive(Clone, Default)]
pub struct StatusNotifier {
    inner: Arc<Subscribers>,
}

impl std::fmt::Debug for StatusNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by a subscription; call [`Subscription::unsubscribe`] to stop delivery.
///
/// Dropping the handle keeps the callback registered.
#[derive(Debug)]
#[must_use = "dropping a Subscription leaves the callback registered forever"]
pub struct Subscription {
    inner: Weak<Subscribers>,
    id: u64,
    topic: Topic,
}

impl Subscription {
    /// Removes the callback. No-op if the notifier is gone.
    pub fn unsubscribe(self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        match self.topic {
            Topic::Status => inner.status.write().retain(|(id, _)| *id != self.id),
            Topic::Conflict => inner.conflict.write().retain(|(id, _)| *id != self.id),
        }
    }
}

impl StatusNotifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a status callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner.status.write().push((id, Arc::new(callback)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
            topic: Topic::Status,
        }
    }

    /// Registers a conflict callback.
    pub fn subscribe_conflict<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Conflict) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner.conflict.write().push((id, Arc::new(callback)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
            topic: Topic::Conflict,
        }
    }

    /// Returns a receiver of all future status events.
    pub fn watch(&self) -> Receiver<SyncStatus> {
        let (tx, rx) = mpsc::channel();
        self.inner.status_senders.write().push(tx);
        rx
    }

    /// Returns a receiver of all future conflict events.
    pub fn watch_conflicts(&self) -> Receiver<Conflict> {
        let (tx, rx) = mpsc::channel();
        self.inner.conflict_senders.write().push(tx);
        rx
    }

    /// Delivers `status` to every current subscriber.
    pub fn publish(&self, status: SyncStatus) {
        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<StatusCallback> = self
            .inner
            .status
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
                tracing::warn!(%status, "status subscriber panicked");
            }
        }

        self.inner
            .status_senders
            .write()
            .retain(|tx| tx.send(status).is_ok());
    }

    /// Delivers `conflict` to every current conflict subscriber.
    pub fn publish_conflict(&self, conflict: &Conflict) {
        let callbacks: Vec<ConflictCallback> = self
            .inner
            .conflict
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(conflict))).is_err() {
                tracing::warn!(
                    resource_type = %conflict.resource_type,
                    resource_id = %conflict.resource_id,
                    "conflict subscriber panicked"
                );
            }
        }

        self.inner
            .conflict_senders
            .write()
            .retain(|tx| tx.send(conflict.clone()).is_ok());
    }

    /// Number of registered callbacks and live channels.
    pub fn subscriber_count(&self) -> usize {
        self.inner.status.read().len()
            + self.inner.conflict.read().len()
            + self.inner.status_senders.read().len()
            + self.inner.conflict_senders.read().len()
    }
}
