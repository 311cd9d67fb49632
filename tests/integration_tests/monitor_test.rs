//! Round scheduling integration tests
//!
//! Pacing in these tests is 5s between probes and 10s between rounds,
//! on a paused clock.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use sniper::models::WorkerId;
use sniper::monitor::{
    found_channel, ClaimProcessor, LookupError, MonitorController, MonitorState, Pacing,
    PartitionMode, RecordStore, StaticSessions, WorkerHandle,
};
use sniper::sim::{ClaimBehavior, Rule, SimulatedOracle, SimulatedWorker};
use sniper::storage::MemoryStore;

use crate::common::{id, ids, Harness};

fn pacing() -> Pacing {
    Pacing::from_secs(5, 10)
}

// ============================================================================
// Turn Order and Rounds
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_found_on_second_turn_reported_once() {
    let h = Harness::new(3, &["alpha", "snipe1", "zulu"], pacing()).await;
    h.oracle.script(&id("snipe1"), [Err(LookupError::NotOccupied)]);

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(25)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let events = h.sink.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].identifier, id("snipe1"));
    assert_eq!(events[0].worker, WorkerId::new("w1"));
    assert_eq!(events[0].round, 0);

    // Turn 3 still ran right after the found turn
    let lookups = h.oracle.lookups();
    assert_eq!(lookups[1].identifier, id("snipe1"));
    assert_eq!(lookups[2].identifier, id("zulu"));
    assert_eq!(lookups[2].worker, WorkerId::new("w2"));
    assert_eq!(lookups.len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_visits_each_worker_once_per_round() {
    let h = Harness::new(3, &["a", "b", "c"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(25)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let order: Vec<String> = h
        .oracle
        .lookups()
        .iter()
        .map(|r| r.worker.to_string())
        .collect();
    assert_eq!(order, vec!["w0", "w1", "w2", "w0", "w1", "w2", "w0", "w1", "w2"]);

    let stats = running.stats.read().await;
    assert_eq!(stats.rounds_completed, 3);
    assert_eq!(stats.probes, 9);
    assert_eq!(stats.epochs, 1);
}

#[tokio::test(start_paused = true)]
async fn test_check_interval_between_probes_in_a_turn() {
    let h = Harness::new(1, &["a", "b", "c"], pacing()).await;
    let start = Instant::now();

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(32)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let offsets: Vec<u64> = h
        .oracle
        .lookups()
        .iter()
        .map(|r| (r.at - start).as_secs())
        .collect();

    // No pause after the last probe of a turn, then the pair delay
    assert_eq!(offsets, vec![0, 5, 10, 20, 25, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_alternating_worker_visits_every_identifier() {
    let h = Harness::new(3, &["xyz", "abc"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(35)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(h.lookups_by("w0"), vec!["abc"; 4]);
    assert_eq!(h.lookups_by("w1"), vec!["xyz"; 4]);
    assert_eq!(h.lookups_by("w2"), vec!["abc", "xyz", "abc", "xyz"]);

    let stats = running.stats.read().await;
    assert_eq!(stats.last_mode, Some(PartitionMode::SurplusWorkers));
    assert_eq!(stats.rounds_completed, 4);
}

#[tokio::test(start_paused = true)]
async fn test_last_checked_updated_for_every_probe() {
    let h = Harness::new(2, &["a", "b", "c"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert!(h.store.last_checked(&id("a")).await.is_some());
}

// ============================================================================
// Re-partitioning
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_added_identifier_starts_new_epoch() {
    let h = Harness::new(2, &["a", "b"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.store.add(&id("c")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(17)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let stats = running.stats.read().await;
    assert_eq!(stats.epochs, 2);
    assert_eq!(stats.identifiers_in_epoch, 3);
    assert_eq!(h.oracle.lookup_count(&id("c")), 1);
    assert_eq!(h.lookups_by("w0"), vec!["a", "a", "c"]);
}

#[tokio::test(start_paused = true)]
async fn test_removed_identifier_no_longer_probed() {
    let h = Harness::new(3, &["a", "b", "c"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(5)).await;
    h.store.remove(&id("b")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    running.stop.stop();
    running.task.await.unwrap();

    assert_eq!(h.oracle.lookup_count(&id("b")), 1);

    let stats = running.stats.read().await;
    assert_eq!(stats.epochs, 2);
    assert_eq!(stats.last_mode, Some(PartitionMode::SurplusWorkers));
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_set_keeps_epoch() {
    let h = Harness::new(2, &["a", "b"], pacing()).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(55)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let stats = running.stats.read().await;
    assert_eq!(stats.epochs, 1);
    assert_eq!(stats.rounds_completed, 6);
}

// ============================================================================
// Claim Pipeline
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_found_identifier_claimed_by_next_worker() {
    let oracle = Arc::new(SimulatedOracle::new());
    oracle.set_rule(&id("prize"), Rule::Available);

    let w1 = Arc::new(
        SimulatedWorker::with_oracle("w1", oracle.clone())
            .with_claim_behavior(ClaimBehavior::Taken),
    );
    let w2 = Arc::new(SimulatedWorker::with_oracle("w2", oracle.clone()));
    let sessions = Arc::new(StaticSessions::new(vec![
        w1.clone() as WorkerHandle,
        w2.clone() as WorkerHandle,
    ]));

    let store = Arc::new(MemoryStore::with_pacing(pacing()));
    store.add_all(&ids(&["other", "prize"])).await.unwrap();

    let (sink, rx) = found_channel(8);
    let processor = ClaimProcessor::new(sessions.clone(), store.clone()).spawn(rx);
    let controller = MonitorController::new(store.clone(), store.clone());
    controller
        .start_if_ready(sessions, Arc::new(sink))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    let status = controller.status().await;
    controller.shutdown().await;
    let stats = processor.await.unwrap();

    assert_eq!(stats.claimed, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(w1.claim_count(), 1);
    assert_eq!(oracle.claimed_by(&id("prize")), Some(WorkerId::new("w2")));

    assert_eq!(store.active_identifiers().await.unwrap(), ids(&["other"]));
    let history = store.recent_history(5).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].worker, WorkerId::new("w2"));
    assert_eq!(history[0].locator, "https://t.me/prize");

    assert_eq!(status.state, MonitorState::Running);
    assert_eq!(status.stats.epochs, 2);
    assert_eq!(status.stats.identifiers_in_epoch, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_claim_keeps_monitoring() {
    let oracle = Arc::new(SimulatedOracle::new());
    oracle.set_rule(&id("prize"), Rule::Available);

    let worker = Arc::new(
        SimulatedWorker::with_oracle("w1", oracle.clone())
            .with_claim_behavior(ClaimBehavior::RateLimited(120)),
    );
    let sessions = Arc::new(StaticSessions::new(vec![worker as WorkerHandle]));

    let store = Arc::new(MemoryStore::with_pacing(pacing()));
    store.add(&id("prize")).await.unwrap();

    let (sink, rx) = found_channel(8);
    let processor = ClaimProcessor::new(sessions.clone(), store.clone()).spawn(rx);
    let controller = MonitorController::new(store.clone(), store.clone());
    controller.start(sessions, Arc::new(sink)).await;

    tokio::time::sleep(Duration::from_secs(15)).await;
    controller.shutdown().await;
    let stats = processor.await.unwrap();

    assert_eq!(stats.claimed, 0);
    assert_eq!(stats.failed, 2);
    assert_eq!(store.active_identifiers().await.unwrap(), ids(&["prize"]));
    assert!(store.recent_history(5).await.is_empty());
}
