//! Integration tests for the sync engine on durable storage.

use serde_json::json;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use syncq_engine::{
    ApplyOutcome, BackoffScheduler, Clock, EngineConfig, ManualClock, Operation, RetryConfig,
    SyncEngine, SyncItem, SyncStatus,
};
use syncq_storage::{FileStore, InMemoryStore};
use tempfile::tempdir;

fn open_file_engine(path: &std::path::Path, clock: &ManualClock) -> SyncEngine<FileStore> {
    let config = EngineConfig::default();
    let backoff = BackoffScheduler::seeded(config.retry.clone(), 11);
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    SyncEngine::with_parts(FileStore::open(path).unwrap(), config, clock, backoff).unwrap()
}

#[test]
fn create_succeeds_on_third_attempt() {
    let clock = ManualClock::new(1_000_000);
    let config = EngineConfig::default();
    let backoff = BackoffScheduler::seeded(config.retry.clone(), 5);
    let engine = SyncEngine::with_parts(
        InMemoryStore::new(),
        config,
        Arc::new(clock.clone()),
        backoff,
    )
    .unwrap();

    let id = engine
        .enqueue(Operation::Create, "product", "p1", Some(json!({"name": "A"})))
        .unwrap();

    let mut responses = vec![
        ApplyOutcome::failure("offline"),
        ApplyOutcome::failure("offline"),
        ApplyOutcome::success(),
    ]
    .into_iter();
    let mut apply = |_: &SyncItem| responses.next().unwrap_or_else(ApplyOutcome::success);

    for _ in 0..3 {
        let report = engine.process_queue(&mut apply).unwrap();
        assert_eq!(report.attempted, 1);
        // Past any jittered delay for attempts 1 and 2.
        clock.advance(Duration::from_secs(10));
    }

    let item = engine.get(id).unwrap();
    assert_eq!(item.status, SyncStatus::Synced);
    assert_eq!(item.attempts, 3);
    assert!(item.last_error.is_none());
}

#[test]
fn queue_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queue.syncq");
    let clock = ManualClock::new(0);

    let (failed_id, synced_id) = {
        let engine = open_file_engine(&path, &clock);
        let failed_id = engine
            .enqueue(Operation::Update, "customer", "c1", Some(json!({"tier": "gold"})))
            .unwrap();
        let synced_id = engine.enqueue(Operation::Delete, "order", "o1", None).unwrap();

        engine
            .process_queue(&mut |item: &SyncItem| match item.operation {
                Operation::Delete => ApplyOutcome::success(),
                _ => ApplyOutcome::failure("503"),
            })
            .unwrap();
        (failed_id, synced_id)
    };

    let engine = open_file_engine(&path, &clock);
    let pending = engine.get(failed_id).unwrap();
    assert_eq!(pending.status, SyncStatus::Pending);
    assert_eq!(pending.attempts, 1);
    assert_eq!(pending.last_error.as_deref(), Some("503"));
    assert!(pending.next_attempt_at.is_some());
    assert_eq!(engine.get(synced_id).unwrap().status, SyncStatus::Synced);

    assert_eq!(engine.compact_synced().unwrap(), 1);
    drop(engine);

    let engine = open_file_engine(&path, &clock);
    assert_eq!(engine.queue().len(), 1);
}

#[test]
fn overlapping_pass_is_noop() {
    let engine = SyncEngine::open(InMemoryStore::new(), EngineConfig::default()).unwrap();
    engine.enqueue(Operation::Create, "product", "p1", None).unwrap();

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let shared = &engine;
    std::thread::scope(|scope| {
        let first = scope.spawn(move || {
            shared
                .process_queue(&mut |_: &SyncItem| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    ApplyOutcome::success()
                })
                .unwrap()
        });

        entered_rx.recv().unwrap();
        let mut calls = 0;
        let second = engine
            .process_queue(&mut |_: &SyncItem| {
                calls += 1;
                ApplyOutcome::success()
            })
            .unwrap();
        assert!(!second.ran);
        assert_eq!(calls, 0);

        release_tx.send(()).unwrap();
        let first = first.join().unwrap();
        assert!(first.ran);
        assert_eq!(first.synced, 1);
    });

    assert_eq!(engine.stats().passes_completed, 1);
    assert_eq!(engine.stats().passes_skipped, 1);
}

#[test]
fn synced_items_are_never_touched_again() {
    let engine = SyncEngine::open(
        InMemoryStore::new(),
        EngineConfig::new().with_retry(RetryConfig::default().with_jitter(false)),
    )
    .unwrap();
    let id = engine.enqueue(Operation::Create, "product", "p1", None).unwrap();

    engine
        .process_queue(&mut |_: &SyncItem| ApplyOutcome::success())
        .unwrap();
    let synced = engine.get(id).unwrap();

    let mut calls = 0;
    for _ in 0..3 {
        engine
            .process_queue(&mut |_: &SyncItem| {
                calls += 1;
                ApplyOutcome::failure("should not be called")
            })
            .unwrap();
    }

    assert_eq!(calls, 0);
    assert_eq!(engine.get(id).unwrap(), synced);
    assert_eq!(engine.compact_synced().unwrap(), 1);
    assert!(engine.get(id).is_none());
}
