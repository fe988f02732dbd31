//! Host-facing sync engine.

use crate::backoff::BackoffScheduler;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::conflict::{Conflict, ConflictStrategy};
use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::item::{ItemId, Operation, Payload, SyncItem, SyncStatus};
use crate::notifier::{StatusNotifier, Subscription};
use crate::processor::{PassReport, ProcessorStats, RemoteApplier, SyncProcessor};
use crate::queue::{QueueStore, StatusCounts};
use serde::Serialize;
use std::sync::Arc;
use syncq_storage::SnapshotStore;

/// Aggregate queue state for display.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    /// Per-status item counts.
    pub counts: StatusCounts,
    /// True while a pass is running.
    pub is_processing: bool,
    /// End of the last pass, in epoch millis.
    pub last_pass_at: Option<u64>,
    /// Last apply error seen by the processor.
    pub last_error: Option<String>,
}

impl StatusSummary {
    /// Returns true if anything needs the user's attention.
    pub fn needs_attention(&self) -> bool {
        self.counts.failed > 0 || self.counts.conflict > 0
    }
}

/// The offline-first mutation sync engine.
///
/// Constructed once by the host and shared by reference. Owns the durable
/// queue, the processor and the notifier; the remote apply function is
/// supplied per pass.
///
/// # Example
///
/// ```rust
/// use syncq_engine::{ApplyOutcome, EngineConfig, Operation, SyncEngine, SyncItem, SyncStatus};
/// use syncq_storage::InMemoryStore;
/// use serde_json::json;
///
/// let engine = SyncEngine::open(InMemoryStore::new(), EngineConfig::default()).unwrap();
/// let id = engine
///     .enqueue(Operation::Create, "product", "p1", Some(json!({"name": "A"})))
///     .unwrap();
///
/// engine
///     .process_queue(&mut |_: &SyncItem| ApplyOutcome::success())
///     .unwrap();
/// assert_eq!(engine.get(id).unwrap().status, SyncStatus::Synced);
/// ```
pub struct SyncEngine<S: SnapshotStore> {
    queue: QueueStore<S>,
    processor: SyncProcessor,
    notifier: StatusNotifier,
}

impl<S: SnapshotStore> SyncEngine<S> {
    /// Opens an engine on `store` with the system clock and entropy-seeded jitter.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored queue cannot be loaded.
    pub fn open(store: S, config: EngineConfig) -> SyncResult<Self> {
        let backoff = BackoffScheduler::new(config.retry.clone());
        Self::with_parts(store, config, Arc::new(SystemClock), backoff)
    }

    /// Opens an engine with an injected clock and backoff scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored queue cannot be loaded.
    pub fn with_parts(
        store: S,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        backoff: BackoffScheduler,
    ) -> SyncResult<Self> {
        let queue = QueueStore::open(store, Arc::clone(&clock))?;
        let notifier = StatusNotifier::new();
        let processor = SyncProcessor::new(config, backoff, notifier.clone(), clock);
        Ok(Self {
            queue,
            processor,
            notifier,
        })
    }

    /// Returns the queue.
    pub fn queue(&self) -> &QueueStore<S> {
        &self.queue
    }

    /// Returns the processor.
    pub fn processor(&self) -> &SyncProcessor {
        &self.processor
    }

    /// Returns the notifier.
    pub fn notifier(&self) -> &StatusNotifier {
        &self.notifier
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        self.processor.config()
    }

    /// Queues a mutation and announces the queue as pending.
    pub fn enqueue(
        &self,
        operation: Operation,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        payload: Option<Payload>,
    ) -> SyncResult<ItemId> {
        let id = self
            .queue
            .enqueue(operation, resource_type, resource_id, payload)?;
        self.notifier.publish(SyncStatus::Pending);
        Ok(id)
    }

    /// Gets a copy of an item.
    pub fn get(&self, id: ItemId) -> Option<SyncItem> {
        self.queue.get(id)
    }

    /// Deletes an item. Returns false if it was not present.
    pub fn remove(&self, id: ItemId) -> SyncResult<bool> {
        self.queue.remove(id)
    }

    /// Moves every failed item back to pending with attempts reset.
    pub fn retry_failed(&self) -> SyncResult<usize> {
        let reset = self.queue.retry_failed()?;
        if reset > 0 {
            tracing::info!(reset, "failed items re-queued");
            self.notifier.publish(SyncStatus::Pending);
        }
        Ok(reset)
    }

    /// Removes all synced items.
    pub fn compact_synced(&self) -> SyncResult<usize> {
        self.queue.compact_synced()
    }

    /// Removes every item.
    pub fn clear(&self) -> SyncResult<usize> {
        self.queue.clear()
    }

    /// Runs one pass. See [`SyncProcessor::process_queue`].
    pub fn process_queue<A>(&self, applier: &mut A) -> SyncResult<PassReport>
    where
        A: RemoteApplier + ?Sized,
    {
        self.processor.process_queue(&self.queue, applier)
    }

    /// Runs one pass if `connectivity` reports online; otherwise returns `None`.
    pub fn sync_if_online<C, A>(
        &self,
        connectivity: &C,
        applier: &mut A,
    ) -> SyncResult<Option<PassReport>>
    where
        C: Connectivity + ?Sized,
        A: RemoteApplier + ?Sized,
    {
        if !connectivity.is_online() {
            tracing::debug!("offline; sync pass not started");
            return Ok(None);
        }
        self.process_queue(applier).map(Some)
    }

    /// Stops the running pass from admitting further items.
    pub fn cancel(&self) {
        self.processor.cancel();
    }

    /// Registers a status callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Registers a conflict callback.
    pub fn subscribe_conflict<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Conflict) + Send + Sync + 'static,
    {
        self.notifier.subscribe_conflict(callback)
    }

    /// Resolves a conflict with `strategy`, or the configured default.
    ///
    /// `Manual` yields `None` and publishes the conflict once for
    /// out-of-band handling. The queued item is never modified; enqueue a
    /// follow-up with the returned data if it should be pushed.
    pub fn resolve_conflict(
        &self,
        conflict: &Conflict,
        strategy: Option<ConflictStrategy>,
    ) -> Option<Payload> {
        let strategy = strategy.unwrap_or(self.config().conflict_strategy);
        let resolved = strategy.resolve(conflict);
        if resolved.is_none() {
            self.notifier.publish_conflict(conflict);
        }
        resolved
    }

    /// Resolves a conflict and, if it produced data, enqueues an update with it.
    pub fn resolve_and_enqueue(
        &self,
        conflict: &Conflict,
        strategy: Option<ConflictStrategy>,
    ) -> SyncResult<Option<ItemId>> {
        match self.resolve_conflict(conflict, strategy) {
            Some(data) => self
                .enqueue(
                    Operation::Update,
                    conflict.resource_type.clone(),
                    conflict.resource_id.clone(),
                    Some(data),
                )
                .map(Some),
            None => Ok(None),
        }
    }

    /// Enqueues an update for every resolution in `report`, carrying the
    /// data the configured strategy chose. Items removed since the pass are
    /// skipped.
    pub fn enqueue_resolutions(&self, report: &PassReport) -> SyncResult<Vec<ItemId>> {
        let mut queued = Vec::with_capacity(report.resolutions.len());
        for (id, data) in &report.resolutions {
            let Some(item) = self.queue.get(*id) else {
                continue;
            };
            queued.push(self.enqueue(
                Operation::Update,
                item.resource_type,
                item.resource_id,
                Some(data.clone()),
            )?);
        }
        Ok(queued)
    }

    /// Processor statistics.
    pub fn stats(&self) -> ProcessorStats {
        self.processor.stats()
    }

    /// Aggregate counters for display.
    pub fn status(&self) -> StatusSummary {
        let stats = self.processor.stats();
        StatusSummary {
            counts: self.queue.counts(),
            is_processing: self.processor.is_processing(),
            last_pass_at: stats.last_pass_at,
            last_error: stats.last_error,
        }
    }
}

impl<S: SnapshotStore> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("queue", &self.queue)
            .field("processor", &self.processor)
            .finish_non_exhaustive()
    }
}
