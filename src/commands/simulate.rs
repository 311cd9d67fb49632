use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use sniper::config::Config;
use sniper::metrics;
use sniper::models::Identifier;
use sniper::monitor::{
    found_channel, ClaimProcessor, ClaimReport, FoundSink, MonitorController, MonitorResult,
    Notifier, Pacing, RecordStore, StaticSessions, WorkerHandle,
};
use sniper::sim::{Rule, SimulatedOracle, SimulatedWorker};
use sniper::storage::MemoryStore;

/// Simulation parameters
pub struct SimulateParams {
    pub workers: usize,
    pub identifiers: Vec<String>,
    pub available: Vec<String>,
    pub available_after: u64,
    pub speedup: u32,
    pub timeout_secs: u64,
}

/// Prints claim reports as they arrive
struct PrintNotifier;

#[async_trait]
impl Notifier for PrintNotifier {
    async fn notify(&self, report: &ClaimReport) -> MonitorResult<()> {
        println!("  {report}");
        Ok(())
    }
}

fn parse_all(raw: &[String]) -> Result<Vec<Identifier>> {
    raw.iter()
        .map(|r| Identifier::new(r).with_context(|| format!("Invalid identifier: {r}")))
        .collect()
}

pub async fn simulate(config: Config, params: SimulateParams) -> Result<()> {
    if params.workers == 0 {
        anyhow::bail!("--workers must be at least 1");
    }

    let identifiers = parse_all(&params.identifiers)?;
    let available = parse_all(&params.available)?;

    let speedup = params.speedup.max(1);
    let pacing = config.monitor.pacing();
    let pacing = Pacing {
        check_interval: pacing.check_interval / speedup,
        pair_delay: pacing.pair_delay / speedup,
    };

    println!("Simulated Monitoring");
    println!("====================");
    println!(
        "Workers: {} | Identifiers: {} | Check interval: {:?} | Pair delay: {:?}",
        params.workers,
        identifiers.len(),
        pacing.check_interval,
        pacing.pair_delay
    );

    if config.metrics.enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!(error = %e, "Metrics initialization failed");
        }
    }

    let oracle = Arc::new(SimulatedOracle::new());
    for identifier in &available {
        oracle.set_rule(identifier, Rule::AvailableAfter(params.available_after));
    }

    let workers: Vec<WorkerHandle> = (1..=params.workers)
        .map(|i| {
            let id = format!("+1555000{i:04}");
            Arc::new(SimulatedWorker::with_oracle(id, oracle.clone())) as WorkerHandle
        })
        .collect();
    let sessions = Arc::new(StaticSessions::new(workers));

    let store = Arc::new(MemoryStore::with_pacing(pacing));
    store.add_all(&identifiers).await?;
    store.add_all(&available).await?;

    let (sink, rx) = found_channel(config.monitor.found_queue_capacity);
    let processor = ClaimProcessor::new(sessions.clone(), store.clone())
        .with_notifier(Arc::new(PrintNotifier))
        .spawn(rx);

    let controller = MonitorController::new(store.clone(), store.clone())
        .with_idle_backoff(config.monitor.idle_backoff() / speedup);
    let sink: Arc<dyn FoundSink> = Arc::new(sink);
    controller.start_if_ready(sessions, sink.clone()).await?;
    drop(sink);

    println!("\nClaims:");
    let targets: BTreeSet<Identifier> = available.iter().cloned().collect();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(params.timeout_secs);

    loop {
        let remaining: BTreeSet<Identifier> =
            store.active_identifiers().await?.into_iter().collect();
        if targets.is_disjoint(&remaining) {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            println!("  Timed out with unclaimed targets");
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(200)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("  Interrupted");
                break;
            }
        }
    }

    controller.shutdown().await;
    let stats = processor.await.context("Claim processor task failed")?;

    println!("\n{}", controller.status().await.display());
    println!(
        "Claims: {} succeeded, {} failed, {} skipped",
        stats.claimed, stats.failed, stats.skipped
    );

    let history = store.recent_history(10).await;
    if !history.is_empty() {
        println!("\nHistory:");
        for entry in history {
            println!(
                "  {} by {} at {} ({})",
                entry.identifier.mention(),
                entry.worker,
                entry.claimed_at.format("%H:%M:%S"),
                entry.locator
            );
        }
    }

    if metrics::metrics_initialized() {
        match metrics::encode_metrics() {
            Ok(text) => println!("\nMetrics:\n{text}"),
            Err(e) => tracing::warn!(error = %e, "Failed to encode metrics"),
        }
    }

    Ok(())
}
