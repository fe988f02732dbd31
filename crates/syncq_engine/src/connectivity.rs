//! Connectivity probing.
//!
//! The engine never polls connectivity itself. Hosts consult a
//! [`Connectivity`] before starting a pass, see
//! [`crate::SyncEngine::sync_if_online`].

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Reports whether the remote store is reachable.
pub trait Connectivity: Send + Sync {
    /// Returns true if the host believes it is online.
    fn is_online(&self) -> bool;

    /// Blocks until online or until `timeout` elapses. Returns the final state.
    fn wait_for_online(&self, timeout: Duration) -> bool;
}

/// A connectivity flag driven by the host's network callbacks.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: Mutex<bool>,
    changed: Condvar,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: Mutex::new(online),
            changed: Condvar::new(),
        }
    }

    /// Records a connectivity change and wakes waiters.
    pub fn set_online(&self, online: bool) {
        let mut state = self.online.lock();
        if *state != online {
            tracing::debug!(online, "connectivity changed");
        }
        *state = online;
        self.changed.notify_all();
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.online.lock()
    }

    fn wait_for_online(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut online = self.online.lock();
        while !*online {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut online, deadline).timed_out() {
                        break;
                    }
                }
                // Too far out to represent: wait without a deadline.
                None => self.changed.wait(&mut online),
            }
        }
        *online
    }
}
