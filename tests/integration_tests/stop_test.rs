//! Stop latency tests
//!
//! A stop request must end the loop at the next suspension point, never
//! after the pending sleep runs out.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};

use sniper::monitor::{
    found_channel, LookupError, MonitorController, MonitorState, Pacing, RoundScheduler,
};
use sniper::sim::Rule;

use crate::common::{id, spawn_scheduler, Harness};

const PROMPT: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_turn() {
    let h = Harness::new(2, &["a", "b"], Pacing::from_secs(5, 10)).await;

    let running = h.spawn();
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    assert_eq!(h.oracle.total_lookups(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_check_interval() {
    let h = Harness::new(1, &["a", "b", "c"], Pacing::from_secs(5, 10)).await;
    let start = Instant::now();

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(7)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    let lookups = h.oracle.lookups();
    assert_eq!(lookups.len(), 2);
    assert!(lookups.iter().all(|r| r.at - start <= Duration::from_secs(7)));
    assert!(start.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_pair_delay() {
    let h = Harness::new(1, &["a"], Pacing::from_secs(5, 600)).await;
    let start = Instant::now();

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(100)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    assert_eq!(h.oracle.total_lookups(), 1);
    assert!(start.elapsed() < Duration::from_secs(101));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_rate_limit_pause() {
    let h = Harness::new(1, &["a", "b"], Pacing::from_secs(5, 10)).await;
    h.oracle
        .script(&id("a"), [Err(LookupError::RateLimited { seconds: 300 })]);

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(2)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    // The rate-limited probe counts; the next identifier is never probed
    assert_eq!(h.oracle.total_lookups(), 1);
    assert_eq!(running.stats.read().await.probes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_pause_delays_next_probe() {
    let h = Harness::new(1, &["a", "b"], Pacing::from_secs(5, 10)).await;
    h.oracle
        .script(&id("a"), [Err(LookupError::RateLimited { seconds: 40 })]);
    let start = Instant::now();

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(50)).await;
    running.stop.stop();
    running.task.await.unwrap();

    let lookups = h.oracle.lookups();
    assert_eq!(lookups[1].identifier, id("b"));
    assert_eq!(lookups[1].at - start, Duration::from_secs(45));
    assert!(h.sink.events().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_idle_backoff() {
    let h = Harness::new(2, &[], Pacing::from_secs(5, 10)).await;

    let running = h.spawn();
    tokio::time::sleep(Duration::from_secs(3)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    assert_eq!(running.stats.read().await.epochs, 0);
}

#[tokio::test(start_paused = true)]
async fn test_controller_stop_observed_by_polling() {
    let h = Harness::new(1, &["a", "b"], Pacing::from_secs(30, 60)).await;
    let controller = MonitorController::new(h.store.clone(), h.store.clone());

    assert!(controller.start(h.sessions(), h.sink.clone()).await);
    tokio::time::sleep(Duration::from_secs(10)).await;
    controller.stop().await;

    let mut polls = 0;
    while controller.is_running().await {
        polls += 1;
        assert!(polls < 10, "loop did not observe stop");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(controller.state().await, MonitorState::Idle);
    assert_eq!(h.oracle.total_lookups(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_found_queue_full() {
    let h = Harness::new(1, &["a", "b"], Pacing::from_secs(5, 10)).await;
    h.oracle.set_rule(&id("a"), Rule::Available);
    h.oracle.set_rule(&id("b"), Rule::Available);
    let (sink, _rx) = found_channel(1);

    let scheduler = RoundScheduler::new(
        h.sessions(),
        h.store.clone(),
        h.store.clone(),
        Arc::new(sink.clone()),
    );
    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(20)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    // "b" never got a slot in the queue
    assert_eq!(h.oracle.total_lookups(), 2);
    assert!(sink.is_pending(&id("a")).await);
    assert!(!sink.is_pending(&id("b")).await);
}

#[tokio::test(start_paused = true)]
async fn test_unclaimed_identifier_keeps_loop_paced() {
    let h = Harness::new(1, &["prize"], Pacing::from_secs(5, 10)).await;
    h.oracle.set_rule(&id("prize"), Rule::Available);
    let (sink, _rx) = found_channel(1);
    let start = Instant::now();

    let scheduler =
        RoundScheduler::new(h.sessions(), h.store.clone(), h.store.clone(), Arc::new(sink));
    let running = spawn_scheduler(scheduler);
    tokio::time::sleep(Duration::from_secs(25)).await;
    running.stop.stop();
    timeout(PROMPT, running.task).await.unwrap().unwrap();

    let offsets: Vec<Duration> = h.oracle.lookups().iter().map(|r| r.at - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_secs(10),
            Duration::from_secs(20)
        ]
    );
    assert_eq!(running.stats.read().await.found, 3);
}

#[tokio::test(start_paused = true)]
async fn test_controller_shutdown_with_full_found_queue() {
    let h = Harness::new(1, &["a", "b"], Pacing::from_secs(5, 10)).await;
    h.oracle.set_rule(&id("a"), Rule::Available);
    h.oracle.set_rule(&id("b"), Rule::Available);
    let (sink, _rx) = found_channel(1);
    let controller = MonitorController::new(h.store.clone(), h.store.clone());

    assert!(controller.start(h.sessions(), Arc::new(sink)).await);
    tokio::time::sleep(Duration::from_secs(20)).await;
    timeout(PROMPT, controller.shutdown()).await.unwrap();

    assert_eq!(controller.state().await, MonitorState::Idle);
}
