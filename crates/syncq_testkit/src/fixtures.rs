//! Test fixtures and engine helpers.
//!
//! Provides engines on a manual clock and scripted remote stores.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use syncq_engine::{
    ApplyOutcome, BackoffScheduler, EngineConfig, ItemId, ManualClock, RemoteApplier, SyncEngine,
    SyncItem,
};
use syncq_storage::{FileStore, InMemoryStore, SnapshotStore};
use tempfile::TempDir;

/// Start time of every test clock (2024-01-01T00:00:00Z).
pub const TEST_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Seed used for backoff jitter in fixtures.
pub const TEST_SEED: u64 = 0x5EED;

/// A test engine with a manual clock and automatic cleanup.
pub struct TestEngine<S: SnapshotStore = Arc<InMemoryStore>> {
    /// The engine instance.
    pub engine: SyncEngine<S>,
    /// Clock shared with the engine.
    pub clock: ManualClock,
    _temp_dir: Option<TempDir>,
}

impl TestEngine<Arc<InMemoryStore>> {
    /// Creates an engine on an in-memory store with default config.
    pub fn memory() -> Self {
        Self::memory_with_config(EngineConfig::default())
    }

    /// Creates an engine on an in-memory store.
    pub fn memory_with_config(config: EngineConfig) -> Self {
        let clock = ManualClock::new(TEST_EPOCH_MILLIS);
        let engine = open_engine(Arc::new(InMemoryStore::new()), config, &clock);
        Self {
            engine,
            clock,
            _temp_dir: None,
        }
    }

    /// Returns the in-memory store, e.g. to make it read-only.
    pub fn store(&self) -> &InMemoryStore {
        self.engine.queue().store()
    }
}

impl TestEngine<FileStore> {
    /// Creates an engine on a file in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("queue.syncq");
        let store = FileStore::open(&path).expect("Failed to open file store");

        let clock = ManualClock::new(TEST_EPOCH_MILLIS);
        let engine = open_engine(store, EngineConfig::default(), &clock);
        Self {
            engine,
            clock,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the queue file path.
    pub fn path(&self) -> PathBuf {
        self.engine.queue().store().path().to_path_buf()
    }

    /// Closes and reopens the engine on the same file, keeping the clock.
    pub fn reopen(self) -> Self {
        let Self {
            engine,
            clock,
            _temp_dir,
        } = self;
        let path = engine.queue().store().path().to_path_buf();
        let config = engine.config().clone();
        drop(engine);

        let store = FileStore::open(&path).expect("Failed to reopen file store");
        Self {
            engine: open_engine(store, config, &clock),
            clock,
            _temp_dir,
        }
    }
}

impl<S: SnapshotStore> TestEngine<S> {
    /// Advances the clock past any backoff delay the default config can produce.
    pub fn skip_backoff(&self) {
        let retry = &self.engine.config().retry;
        self.clock.advance(retry.max_delay + retry.initial_delay);
    }

    /// Advances the clock.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

impl<S: SnapshotStore> std::ops::Deref for TestEngine<S> {
    type Target = SyncEngine<S>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

fn open_engine<S: SnapshotStore>(
    store: S,
    config: EngineConfig,
    clock: &ManualClock,
) -> SyncEngine<S> {
    let backoff = BackoffScheduler::seeded(config.retry.clone(), TEST_SEED);
    SyncEngine::with_parts(store, config, Arc::new(clock.clone()), backoff)
        .expect("Failed to open test engine")
}

/// A fake remote store that answers from per-resource scripts.
///
/// Each resource id has a queue of outcomes; when it runs dry the default
/// outcome is used. Every call is recorded.
#[derive(Debug, Clone)]
pub struct ScriptedApplier {
    scripts: HashMap<String, VecDeque<ApplyOutcome>>,
    default: ApplyOutcome,
    calls: Vec<(ItemId, String)>,
}

impl ScriptedApplier {
    /// Creates an applier whose default outcome is `default`.
    pub fn new(default: ApplyOutcome) -> Self {
        Self {
            scripts: HashMap::new(),
            default,
            calls: Vec::new(),
        }
    }

    /// Creates an applier that succeeds unless scripted otherwise.
    pub fn succeeding() -> Self {
        Self::new(ApplyOutcome::success())
    }

    /// Creates an applier that always fails unless scripted otherwise.
    pub fn failing(error: &str) -> Self {
        Self::new(ApplyOutcome::failure(error))
    }

    /// Appends outcomes for `resource_id`.
    pub fn script(
        &mut self,
        resource_id: &str,
        outcomes: impl IntoIterator<Item = ApplyOutcome>,
    ) -> &mut Self {
        self.scripts
            .entry(resource_id.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// All calls as `(item id, resource id)`, in call order.
    pub fn calls(&self) -> &[(ItemId, String)] {
        &self.calls
    }

    /// Item ids in call order.
    pub fn called_ids(&self) -> Vec<ItemId> {
        self.calls.iter().map(|(id, _)| *id).collect()
    }

    /// Number of calls.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

impl RemoteApplier for ScriptedApplier {
    fn apply(&mut self, item: &SyncItem) -> ApplyOutcome {
        self.calls.push((item.id, item.resource_id.clone()));
        self.scripts
            .get_mut(&item.resource_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }
}

/// A remote store that keeps the last applied payload per resource and
/// deduplicates by idempotency key.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    /// Resource state keyed by `(resource_type, resource_id)`.
    pub resources: HashMap<(String, String), serde_json::Value>,
    /// Idempotency keys already applied.
    pub applied_keys: Vec<String>,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteApplier for InMemoryRemote {
    fn apply(&mut self, item: &SyncItem) -> ApplyOutcome {
        let key = item.idempotency_key();
        if self.applied_keys.contains(&key) {
            return ApplyOutcome::success();
        }

        let resource = (item.resource_type.clone(), item.resource_id.clone());
        match item.operation {
            syncq_engine::Operation::Delete => {
                self.resources.remove(&resource);
            }
            _ => {
                let payload = item.payload.clone().unwrap_or(serde_json::Value::Null);
                self.resources.insert(resource, payload);
            }
        }
        self.applied_keys.push(key);
        ApplyOutcome::success()
    }
}
