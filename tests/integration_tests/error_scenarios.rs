//! Error scenario integration tests
//!
//! Tests failure modes of the collaborators:
//! 1. Found handler errors
//! 2. Record store failures
//! 3. Session provider failures
//! 4. Disconnected workers
//! 5. Ambiguous oracle errors

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use sniper::monitor::{
    LookupError, MonitorError, MonitorResult, Pacing, RoundScheduler, SessionProvider,
    StaticSessions, WorkerHandle,
};
use sniper::sim::{Rule, SimulatedOracle, SimulatedWorker};

use crate::common::{id, ids, spawn_scheduler, FlakyStore, Harness, RecordingSink};

// ============================================================================
// Found Handler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_sink_errors_do_not_stop_loop() {
    let h = Harness::new(1, &["a"], Pacing::from_secs(5, 10)).await;
    h.oracle.set_rule(&id("a"), Rule::Available);
    let sink = Arc::new(RecordingSink::failing());

    let scheduler = RoundScheduler::new(h.sessions(), h.store.clone(), h.store.clone(), sink.clone());
    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(25)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(sink.events().await.len(), 3);
    assert_eq!(running.stats.read().await.found, 3);
}

// ============================================================================
// Record Store
// ============================================================================

fn single_worker(oracle: &Arc<SimulatedOracle>) -> Arc<StaticSessions> {
    let worker = Arc::new(SimulatedWorker::with_oracle("w0", oracle.clone()));
    Arc::new(StaticSessions::new(vec![worker as WorkerHandle]))
}

#[tokio::test(start_paused = true)]
async fn test_store_read_failure_backs_off() {
    let oracle = Arc::new(SimulatedOracle::new());
    let store = Arc::new(FlakyStore::default());
    store.inner.set_pacing(Pacing::from_secs(5, 10)).await;
    store.inner.add_all(&ids(&["a"])).await.unwrap();
    store.fail_next_reads(1);
    let start = Instant::now();

    let scheduler = RoundScheduler::new(
        single_worker(&oracle),
        store.clone(),
        store.clone(),
        Arc::new(RecordingSink::default()),
    )
    .with_idle_backoff(Duration::from_secs(30));
    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(35)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let lookups = oracle.lookups();
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].at - start, Duration::from_secs(30));
    assert_eq!(running.stats.read().await.epochs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_mark_checked_failure_is_ignored() {
    let oracle = Arc::new(SimulatedOracle::new());
    let store = Arc::new(FlakyStore::default());
    store.inner.set_pacing(Pacing::from_secs(5, 10)).await;
    store.inner.add_all(&ids(&["a", "b"])).await.unwrap();
    store.fail_marks();

    let scheduler = RoundScheduler::new(
        single_worker(&oracle),
        store.clone(),
        store.clone(),
        Arc::new(RecordingSink::default()),
    );
    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(25)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(oracle.total_lookups(), 4);
    assert!(store.inner.last_checked(&id("a")).await.is_none());
}

// ============================================================================
// Session Provider
// ============================================================================

struct BrokenSessions;

#[async_trait]
impl SessionProvider for BrokenSessions {
    async fn active_workers(&self) -> MonitorResult<Vec<WorkerHandle>> {
        Err(MonitorError::sessions("session database locked"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_failure_keeps_retrying() {
    let h = Harness::new(1, &["a"], Pacing::from_secs(5, 10)).await;
    let scheduler = RoundScheduler::new(
        Arc::new(BrokenSessions),
        h.store.clone(),
        h.store.clone(),
        h.sink.clone(),
    );

    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert!(!running.task.is_finished());

    running.stop.stop();
    running.task.await.unwrap();
    assert_eq!(running.stats.read().await.epochs, 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnected_workers_excluded() {
    let h = Harness::new(2, &["a", "b"], Pacing::from_secs(5, 10)).await;
    h.workers[1].set_connected(false);

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(8)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(h.lookups_by("w0"), vec!["a", "b"]);
    assert!(h.lookups_by("w1").is_empty());
    assert_eq!(running.stats.read().await.workers_in_epoch, 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_workers_disconnected_idles() {
    let h = Harness::new(2, &["a"], Pacing::from_secs(5, 10)).await;
    for worker in &h.workers {
        worker.set_connected(false);
    }

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(65)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(h.oracle.total_lookups(), 0);
    assert_eq!(running.stats.read().await.epochs, 0);
}

// ============================================================================
// Ambiguous Oracle Errors
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unknown_lookup_error_fails_closed() {
    let h = Harness::new(1, &["a"], Pacing::from_secs(5, 10)).await;
    h.oracle
        .script(&id("a"), [Err(LookupError::Other("upstream timeout".into()))]);

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(15)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(h.oracle.lookup_count(&id("a")), 2);
    assert!(h.sink.events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_known_missing_pattern_is_available() {
    let h = Harness::new(1, &["a"], Pacing::from_secs(5, 10)).await;
    h.oracle.script(
        &id("a"),
        [Err(LookupError::InvalidValue(
            "No user has \"a\" as username".into(),
        ))],
    );

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(5)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let events = h.sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].identifier, id("a"));
}
