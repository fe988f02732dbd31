//! Queue draining.
//!
//! A pass takes one snapshot of the pending items and walks it in enqueue
//! order. Items enqueued during the pass wait for the next one. For every
//! item the processor records the attempt, calls the host's apply function,
//! and classifies the outcome:
//!
//! ```text
//! pending ──► syncing ──► synced
//!                │
//!                ├──► conflict            (remote diverged; strategy applied)
//!                ├──► pending + backoff   (failure, attempts < max)
//!                └──► failed              (failure, attempts >= max)
//! ```
//!
//! Items for the same resource are never attempted out of order: once an item
//! for a resource is left non-terminal (deferred or sent back to `pending`),
//! every later item for that resource is skipped for the rest of the pass.

use crate::backoff::BackoffScheduler;
use crate::clock::{duration_millis, Clock};
use crate::config::{EngineConfig, RetryPacing};
use crate::conflict::Conflict;
use crate::error::{SyncError, SyncResult};
use crate::item::{ItemId, Payload, SyncItem, SyncStatus};
use crate::notifier::StatusNotifier;
use crate::queue::QueueStore;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use syncq_storage::SnapshotStore;

/// Result of applying one item to the remote store.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The remote store accepted the mutation.
    Success,
    /// The remote state diverged from what the mutation expects.
    Conflict {
        /// Both sides of the divergence, if the host knows them.
        details: Option<Conflict>,
    },
    /// A retryable failure.
    Failure {
        /// Failure message, stored as the item's `last_error`.
        error: String,
    },
}

impl ApplyOutcome {
    /// Creates a success outcome.
    pub fn success() -> Self {
        Self::Success
    }

    /// Creates a failure outcome.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    /// Creates a conflict outcome without details.
    pub fn conflict() -> Self {
        Self::Conflict { details: None }
    }

    /// Creates a conflict outcome carrying both sides.
    pub fn conflict_with(conflict: Conflict) -> Self {
        Self::Conflict {
            details: Some(conflict),
        }
    }
}

/// Applies queued mutations to the authoritative store.
///
/// Implementations must be idempotent per item id: a retried `create` must
/// not create a second remote resource. [`SyncItem::idempotency_key`] is
/// provided for that purpose.
pub trait RemoteApplier {
    /// Applies one item.
    fn apply(&mut self, item: &SyncItem) -> ApplyOutcome;
}

impl<F> RemoteApplier for F
where
    F: FnMut(&SyncItem) -> ApplyOutcome,
{
    fn apply(&mut self, item: &SyncItem) -> ApplyOutcome {
        self(item)
    }
}

/// Summary of a single pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// False if another pass was already running and this call did nothing.
    pub ran: bool,
    /// Items attempted.
    pub attempted: usize,
    /// Items that reached `synced`.
    pub synced: usize,
    /// Items sent back to `pending` with a backoff delay.
    pub retried: usize,
    /// Items that reached `failed` in this pass.
    pub failed: usize,
    /// Items that reached `conflict`.
    pub conflicts: usize,
    /// Data chosen by the configured conflict strategy, per conflicted item.
    /// Empty under `Manual`, whose conflicts go to conflict subscribers.
    pub resolutions: Vec<(ItemId, Payload)>,
    /// Items skipped because their backoff delay has not elapsed.
    pub deferred: usize,
    /// Items skipped behind an unfinished item for the same resource.
    pub blocked: usize,
    /// `failed` items skipped because they are out of attempts.
    pub exhausted: usize,
    /// True if the pass stopped early because of [`SyncProcessor::cancel`].
    pub cancelled: bool,
    /// Aggregate status published at the end of the pass.
    pub status: Option<SyncStatus>,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl PassReport {
    /// Report of a call that did not run because a pass was in flight.
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Cumulative processor statistics.
#[derive(Debug, Clone, Default)]
pub struct ProcessorStats {
    /// Passes that ran to completion or cancellation.
    pub passes_completed: u64,
    /// Calls that were no-ops because a pass was running.
    pub passes_skipped: u64,
    /// Total apply calls.
    pub attempts: u64,
    /// Items synced.
    pub synced: u64,
    /// Retries scheduled.
    pub retries: u64,
    /// Items that ran out of attempts.
    pub failed: u64,
    /// Conflicts encountered.
    pub conflicts: u64,
    /// End of the last pass, in epoch millis.
    pub last_pass_at: Option<u64>,
    /// Last apply error seen.
    pub last_error: Option<String>,
}

/// Drains the queue through a host-supplied apply function.
pub struct SyncProcessor {
    config: EngineConfig,
    backoff: BackoffScheduler,
    notifier: StatusNotifier,
    clock: Arc<dyn Clock>,
    pass_lock: Mutex<()>,
    cancelled: AtomicBool,
    stats: RwLock<ProcessorStats>,
}

impl SyncProcessor {
    /// Creates a processor.
    pub fn new(
        config: EngineConfig,
        backoff: BackoffScheduler,
        notifier: StatusNotifier,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            backoff,
            notifier,
            clock,
            pass_lock: Mutex::new(()),
            cancelled: AtomicBool::new(false),
            stats: RwLock::new(ProcessorStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the notifier events are published to.
    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    /// Returns true while a pass is running.
    pub fn is_processing(&self) -> bool {
        self.pass_lock.is_locked()
    }

    /// Gets the cumulative stats.
    pub fn stats(&self) -> ProcessorStats {
        self.stats.read().clone()
    }

    /// Stops the running pass from admitting further items.
    ///
    /// The item currently being applied finishes normally. The flag is
    /// cleared when the next pass starts.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs a single pass over the queue.
    ///
    /// If a pass is already running, returns immediately with
    /// [`PassReport::skipped`] and applies nothing.
    ///
    /// # Errors
    ///
    /// Only persistence failures abort a pass. Apply failures, conflicts and
    /// panics inside `applier` are recorded on the item.
    pub fn process_queue<S, A>(
        &self,
        queue: &QueueStore<S>,
        applier: &mut A,
    ) -> SyncResult<PassReport>
    where
        S: SnapshotStore,
        A: RemoteApplier + ?Sized,
    {
        let Some(_pass) = self.pass_lock.try_lock() else {
            tracing::debug!("sync pass already running; skipping");
            self.stats.write().passes_skipped += 1;
            return Ok(PassReport::skipped());
        };

        let start = Instant::now();
        self.cancelled.store(false, Ordering::SeqCst);
        queue.reset_interrupted()?;
        self.notifier.publish(SyncStatus::Syncing);

        let snapshot = queue.list_pending();
        tracing::debug!(items = snapshot.len(), "sync pass started");

        let mut report = PassReport {
            ran: true,
            ..PassReport::default()
        };
        let mut blocked: HashSet<(String, String)> = HashSet::new();

        for item in snapshot {
            if self.is_cancelled() {
                tracing::info!("sync pass cancelled");
                report.cancelled = true;
                break;
            }

            let key = (item.resource_type.clone(), item.resource_id.clone());
            if blocked.contains(&key) {
                report.blocked += 1;
                continue;
            }

            if item.status == SyncStatus::Failed && self.config.retry.is_exhausted(item.attempts) {
                report.exhausted += 1;
                continue;
            }

            if item.is_deferred(self.clock.now_millis()) {
                report.deferred += 1;
                blocked.insert(key);
                continue;
            }

            if !self.attempt(queue, applier, &item, &mut report)? {
                blocked.insert(key);
            }
        }

        report.status = Some(self.aggregate_status(queue, &report));
        report.duration = start.elapsed();

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.last_pass_at = Some(self.clock.now_millis());
        }

        tracing::info!(
            attempted = report.attempted,
            synced = report.synced,
            retried = report.retried,
            failed = report.failed,
            conflicts = report.conflicts,
            deferred = report.deferred,
            blocked = report.blocked,
            "sync pass finished"
        );

        if let Some(status) = report.status {
            self.notifier.publish(status);
        }
        Ok(report)
    }

    /// Attempts one item. Returns true if the item ended in a terminal state.
    fn attempt<S, A>(
        &self,
        queue: &QueueStore<S>,
        applier: &mut A,
        item: &SyncItem,
        report: &mut PassReport,
    ) -> SyncResult<bool>
    where
        S: SnapshotStore,
        A: RemoteApplier + ?Sized,
    {
        let started = queue.update(item.id, |item| {
            item.transition(SyncStatus::Syncing)?;
            item.attempts += 1;
            item.next_attempt_at = None;
            Ok(())
        });
        let current = match started {
            Ok(current) => current,
            // Removed or changed by the host since the snapshot was taken.
            Err(e @ (SyncError::ItemNotFound(_) | SyncError::InvalidStateTransition { .. })) => {
                tracing::debug!(id = %item.id, error = %e, "item changed during pass; skipping");
                return Ok(true);
            }
            Err(e) => return Err(e),
        };

        report.attempted += 1;
        self.stats.write().attempts += 1;

        let outcome = catch_unwind(AssertUnwindSafe(|| applier.apply(&current)))
            .unwrap_or_else(|panic| ApplyOutcome::failure(panic_message(panic.as_ref())));

        match outcome {
            ApplyOutcome::Success => {
                queue.update(current.id, |item| {
                    item.transition(SyncStatus::Synced)?;
                    item.last_error = None;
                    Ok(())
                })?;
                tracing::debug!(id = %current.id, attempts = current.attempts, "item synced");
                report.synced += 1;
                self.stats.write().synced += 1;
                Ok(true)
            }
            ApplyOutcome::Conflict { details } => {
                queue.update(current.id, |item| {
                    item.transition(SyncStatus::Conflict)?;
                    item.last_error = Some("remote state diverged".to_string());
                    if let Some(conflict) = &details {
                        item.remote_version = Some(conflict.remote_timestamp);
                    }
                    Ok(())
                })?;
                tracing::info!(
                    id = %current.id,
                    resource_type = %current.resource_type,
                    resource_id = %current.resource_id,
                    "item in conflict"
                );
                if let Some(conflict) = &details {
                    match self.config.conflict_strategy.resolve(conflict) {
                        Some(resolved) => {
                            tracing::debug!(
                                id = %current.id,
                                strategy = self.config.conflict_strategy.as_str(),
                                "conflict resolved"
                            );
                            report.resolutions.push((current.id, resolved));
                        }
                        None => self.notifier.publish_conflict(conflict),
                    }
                }
                report.conflicts += 1;
                self.stats.write().conflicts += 1;
                Ok(true)
            }
            ApplyOutcome::Failure { error } => {
                self.stats.write().last_error = Some(error.clone());

                if self.config.retry.is_exhausted(current.attempts) {
                    queue.update(current.id, |item| {
                        item.transition(SyncStatus::Failed)?;
                        item.last_error = Some(error.clone());
                        Ok(())
                    })?;
                    tracing::warn!(
                        id = %current.id,
                        attempts = current.attempts,
                        error = %error,
                        "item failed permanently"
                    );
                    report.failed += 1;
                    self.stats.write().failed += 1;
                    return Ok(true);
                }

                let delay = self.backoff.compute_delay(current.attempts);
                let next_attempt_at = match self.config.pacing {
                    RetryPacing::Deferred => Some(
                        self.clock
                            .now_millis()
                            .saturating_add(duration_millis(delay)),
                    ),
                    RetryPacing::Inline => None,
                };

                queue.update(current.id, |item| {
                    item.transition(SyncStatus::Pending)?;
                    item.last_error = Some(error.clone());
                    item.next_attempt_at = next_attempt_at;
                    Ok(())
                })?;
                tracing::debug!(
                    id = %current.id,
                    attempts = current.attempts,
                    delay_ms = duration_millis(delay),
                    error = %error,
                    "item scheduled for retry"
                );
                report.retried += 1;
                self.stats.write().retries += 1;

                if self.config.pacing == RetryPacing::Inline {
                    self.clock.sleep(delay);
                }
                Ok(false)
            }
        }
    }

    fn aggregate_status<S: SnapshotStore>(
        &self,
        queue: &QueueStore<S>,
        report: &PassReport,
    ) -> SyncStatus {
        if report.failed > 0 || report.exhausted > 0 {
            SyncStatus::Failed
        } else if report.conflicts > 0 {
            SyncStatus::Conflict
        } else if queue.counts().pending > 0 {
            SyncStatus::Pending
        } else {
            SyncStatus::Synced
        }
    }
}

impl std::fmt::Debug for SyncProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProcessor")
            .field("config", &self.config)
            .field("processing", &self.is_processing())
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("apply panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("apply panicked: {message}")
    } else {
        "apply panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RetryConfig;
    use crate::conflict::ConflictStrategy;
    use crate::item::Operation;
    use serde_json::json;
    use syncq_storage::InMemoryStore;

    struct Fixture {
        clock: ManualClock,
        queue: QueueStore<Arc<InMemoryStore>>,
        processor: SyncProcessor,
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let clock = ManualClock::new(10_000);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let queue = QueueStore::open(Arc::new(InMemoryStore::new()), Arc::clone(&shared)).unwrap();
        let backoff = BackoffScheduler::seeded(config.retry.clone(), 9);
        let processor = SyncProcessor::new(config, backoff, StatusNotifier::new(), shared);
        Fixture {
            clock,
            queue,
            processor,
        }
    }

    fn no_jitter() -> EngineConfig {
        EngineConfig::new().with_retry(RetryConfig::default().with_jitter(false))
    }

    #[test]
    fn success_marks_synced() {
        let f = fixture(no_jitter());
        let id = f.queue.enqueue(Operation::Create, "product", "p1", Some(json!({}))).unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::success())
            .unwrap();

        assert!(report.ran);
        assert_eq!(report.synced, 1);
        assert_eq!(report.status, Some(SyncStatus::Synced));
        let item = f.queue.get(id).unwrap();
        assert_eq!(item.status, SyncStatus::Synced);
        assert_eq!(item.attempts, 1);
    }

    #[test]
    fn failure_defers_item() {
        let f = fixture(no_jitter());
        let id = f.queue.enqueue(Operation::Update, "product", "p1", None).unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::failure("offline"))
            .unwrap();
        assert_eq!(report.retried, 1);
        assert_eq!(report.status, Some(SyncStatus::Pending));

        let item = f.queue.get(id).unwrap();
        assert_eq!(item.status, SyncStatus::Pending);
        assert_eq!(item.last_error.as_deref(), Some("offline"));
        assert_eq!(item.next_attempt_at, Some(11_000));

        // Still inside the backoff window: nothing is attempted.
        let mut calls = 0;
        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| {
                calls += 1;
                ApplyOutcome::success()
            })
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(report.deferred, 1);

        f.clock.advance(Duration::from_millis(1_000));
        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::success())
            .unwrap();
        assert_eq!(report.synced, 1);
        let item = f.queue.get(id).unwrap();
        assert_eq!(item.attempts, 2);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn exhaustion_marks_failed() {
        let f = fixture(no_jitter());
        let id = f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();

        for pass in 1..=5 {
            let report = f
                .processor
                .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::failure("500"))
                .unwrap();
            assert_eq!(report.attempted, 1, "pass {pass}");
            f.clock.advance(Duration::from_secs(60));
        }

        let item = f.queue.get(id).unwrap();
        assert_eq!(item.status, SyncStatus::Failed);
        assert_eq!(item.attempts, 5);

        // Exhausted items are left alone until retried explicitly.
        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::success())
            .unwrap();
        assert_eq!(report.attempted, 0);
        assert_eq!(report.exhausted, 1);
        assert_eq!(report.status, Some(SyncStatus::Failed));

        f.queue.retry_failed().unwrap();
        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::success())
            .unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(f.queue.get(id).unwrap().attempts, 1);
    }

    fn price_conflict(_: &SyncItem) -> ApplyOutcome {
        ApplyOutcome::conflict_with(Conflict::new(
            "product",
            "p1",
            json!({"price": 10}),
            json!({"price": 12}),
            100,
            200,
        ))
    }

    #[test]
    fn conflict_does_not_abort_pass() {
        let f = fixture(no_jitter());
        let rx = f.processor.notifier().watch_conflicts();
        let first = f
            .queue
            .enqueue(Operation::Update, "product", "p1", Some(json!({"price": 10})))
            .unwrap();
        let second = f.queue.enqueue(Operation::Update, "product", "p2", None).unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut |item: &SyncItem| {
                if item.resource_id == "p1" {
                    price_conflict(item)
                } else {
                    ApplyOutcome::success()
                }
            })
            .unwrap();

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.synced, 1);
        assert_eq!(report.status, Some(SyncStatus::Conflict));
        let item = f.queue.get(first).unwrap();
        assert_eq!(item.status, SyncStatus::Conflict);
        assert_eq!(item.remote_version, Some(200));
        assert_eq!(f.queue.get(second).unwrap().status, SyncStatus::Synced);

        // Default latest-wins picks the newer remote side without a manual event.
        assert_eq!(report.resolutions, vec![(first, json!({"price": 12}))]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn local_wins_conflict_is_resolved_in_pass() {
        let f = fixture(no_jitter().with_conflict_strategy(ConflictStrategy::LocalWins));
        let rx = f.processor.notifier().watch_conflicts();
        let id = f
            .queue
            .enqueue(Operation::Update, "product", "p1", Some(json!({"price": 10})))
            .unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut price_conflict)
            .unwrap();

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.resolutions, vec![(id, json!({"price": 10}))]);
        assert!(rx.try_recv().is_err());
        assert_eq!(f.queue.get(id).unwrap().status, SyncStatus::Conflict);
    }

    #[test]
    fn manual_conflict_is_published_once() {
        let f = fixture(no_jitter().with_conflict_strategy(ConflictStrategy::Manual));
        let rx = f.processor.notifier().watch_conflicts();
        let id = f
            .queue
            .enqueue(Operation::Update, "product", "p1", Some(json!({"price": 10})))
            .unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut price_conflict)
            .unwrap();
        f.processor
            .process_queue(&f.queue, &mut price_conflict)
            .unwrap();

        assert!(report.resolutions.is_empty());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].remote_data, json!({"price": 12}));
        assert_eq!(f.queue.get(id).unwrap().status, SyncStatus::Conflict);
    }

    #[test]
    fn conflict_without_details_resolves_nothing() {
        let f = fixture(no_jitter().with_conflict_strategy(ConflictStrategy::Manual));
        let rx = f.processor.notifier().watch_conflicts();
        f.queue.enqueue(Operation::Delete, "product", "p1", None).unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::conflict())
            .unwrap();

        assert_eq!(report.conflicts, 1);
        assert!(report.resolutions.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn same_resource_is_fifo() {
        let f = fixture(no_jitter());
        let create = f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();
        let update = f.queue.enqueue(Operation::Update, "product", "p1", None).unwrap();
        let other = f.queue.enqueue(Operation::Create, "product", "p2", None).unwrap();

        let mut seen: Vec<ItemId> = Vec::new();
        let report = f
            .processor
            .process_queue(&f.queue, &mut |item: &SyncItem| {
                seen.push(item.id);
                if item.id == create {
                    ApplyOutcome::failure("timeout")
                } else {
                    ApplyOutcome::success()
                }
            })
            .unwrap();

        assert_eq!(seen, vec![create, other]);
        assert_eq!(report.blocked, 1);
        assert_eq!(f.queue.get(update).unwrap().attempts, 0);

        f.clock.advance(Duration::from_secs(5));
        seen.clear();
        f.processor
            .process_queue(&f.queue, &mut |item: &SyncItem| {
                seen.push(item.id);
                ApplyOutcome::success()
            })
            .unwrap();
        assert_eq!(seen, vec![create, update]);
    }

    #[test]
    fn panicking_apply_counts_as_failure() {
        let f = fixture(no_jitter());
        let id = f.queue.enqueue(Operation::Delete, "order", "o1", None).unwrap();

        let report = f
            .processor
            .process_queue(&f.queue, &mut |_: &SyncItem| -> ApplyOutcome {
                panic!("socket closed")
            })
            .unwrap();

        assert_eq!(report.retried, 1);
        let item = f.queue.get(id).unwrap();
        assert_eq!(item.status, SyncStatus::Pending);
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.unwrap().contains("socket closed"));
    }

    #[test]
    fn inline_pacing_sleeps() {
        let f = fixture(no_jitter().with_pacing(RetryPacing::Inline));
        let id = f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();

        f.processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::failure("busy"))
            .unwrap();

        assert_eq!(f.clock.total_slept(), Duration::from_millis(1_000));
        let item = f.queue.get(id).unwrap();
        assert!(item.next_attempt_at.is_none());
        assert_eq!(item.status, SyncStatus::Pending);
    }

    #[test]
    fn items_enqueued_during_pass_wait() {
        let f = fixture(no_jitter());
        f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();

        let queue = &f.queue;
        let report = f
            .processor
            .process_queue(queue, &mut |_: &SyncItem| {
                queue.enqueue(Operation::Create, "product", "late", None).unwrap();
                ApplyOutcome::success()
            })
            .unwrap();

        assert_eq!(report.attempted, 1);
        assert_eq!(report.status, Some(SyncStatus::Pending));
        assert_eq!(f.queue.list_pending().len(), 1);
    }

    #[test]
    fn nested_pass_is_a_noop() {
        let f = fixture(no_jitter());
        f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();

        let processor = &f.processor;
        let queue = &f.queue;
        let mut inner = None;
        let report = processor
            .process_queue(queue, &mut |_: &SyncItem| {
                assert!(processor.is_processing());
                inner = Some(
                    processor
                        .process_queue(queue, &mut |_: &SyncItem| ApplyOutcome::success())
                        .unwrap(),
                );
                ApplyOutcome::success()
            })
            .unwrap();

        assert!(report.ran);
        assert_eq!(inner, Some(PassReport::skipped()));
        assert_eq!(processor.stats().passes_skipped, 1);
        assert!(!processor.is_processing());
    }

    #[test]
    fn cancel_stops_admission() {
        let f = fixture(no_jitter());
        f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();
        f.queue.enqueue(Operation::Create, "product", "p2", None).unwrap();

        let processor = &f.processor;
        let report = processor
            .process_queue(&f.queue, &mut |_: &SyncItem| {
                processor.cancel();
                ApplyOutcome::success()
            })
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.synced, 1);
        assert_eq!(f.queue.list_pending().len(), 1);
        assert!(f.queue.list_by_status(SyncStatus::Syncing).is_empty());
    }

    #[test]
    fn persist_failure_aborts_pass() {
        let f = fixture(no_jitter());
        let id = f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();
        f.queue.store().set_read_only(true);

        let mut calls = 0;
        let result = f.processor.process_queue(&f.queue, &mut |_: &SyncItem| {
            calls += 1;
            ApplyOutcome::success()
        });

        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert_eq!(calls, 0);
        assert_eq!(f.queue.get(id).unwrap().status, SyncStatus::Pending);
        assert!(!f.processor.is_processing());
    }

    #[test]
    fn status_events_per_pass() {
        let f = fixture(no_jitter());
        let rx = f.processor.notifier().watch();
        f.queue.enqueue(Operation::Create, "product", "p1", None).unwrap();

        f.processor
            .process_queue(&f.queue, &mut |_: &SyncItem| ApplyOutcome::success())
            .unwrap();

        let events: Vec<SyncStatus> = rx.try_iter().collect();
        assert_eq!(events, vec![SyncStatus::Syncing, SyncStatus::Synced]);
    }
}
