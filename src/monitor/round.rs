//! Round scheduler
//!
//! One cooperative loop drives every probe. Work is organised in epochs: an
//! epoch snapshots the workers and identifiers, partitions them once, then
//! runs turns until the identifier set changes. Each turn hands one worker
//! its checklist; a round is complete when the cursor has visited every
//! worker with work.
//!
//! ```text
//!   ┌──────────── epoch ─────────────────────────────────────────┐
//!   │ snapshot ─▶ partition ─▶ turn ─▶ turn ─▶ ... ─▶ wrap        │
//!   │                            ▲                     │          │
//!   │                            └── same set ◀── pair delay      │
//!   └─────────────────────────────────── set changed ─▶ new epoch ┘
//! ```
//!
//! Every sleep is a stop point, and so is the hand-off of a found
//! identifier to the sink. The stop flag is also checked before each probe
//! and at each turn boundary.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::collaborators::{Pacing, PacingSource, RecordStore, SessionProvider, WorkerHandle};
use super::error::MonitorResult;
use super::events::{FoundEvent, FoundSink};
use super::partition::{Assignment, PartitionMode, WorkerRole};
use super::prober::Prober;
use super::signal::StopSignal;
use crate::metrics;
use crate::models::Identifier;

/// Default wait when there is nothing to monitor or a bookkeeping step failed
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// Cursor
// ============================================================================

/// Round-robin position over the active workers of an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    len: usize,
    round: u64,
}

impl Cursor {
    /// Cursor over `len` active workers, at round zero
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len: len.max(1),
            round: 0,
        }
    }

    /// Position within the active indices
    pub fn position(&self) -> usize {
        self.position
    }

    /// Completed rounds in this epoch
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Move to the next worker; returns `true` when a round completed
    pub fn advance(&mut self) -> bool {
        self.position = (self.position + 1) % self.len;
        if self.position == 0 {
            self.round += 1;
            true
        } else {
            false
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters shared between the loop and status queries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Epochs started
    pub epochs: u64,

    /// Rounds completed across all epochs
    pub rounds_completed: u64,

    /// Probes performed
    pub probes: u64,

    /// Probes that found an identifier available
    pub found: u64,

    /// Mode of the most recent epoch
    pub last_mode: Option<PartitionMode>,

    /// Workers in the current epoch
    pub workers_in_epoch: usize,

    /// Identifiers in the current epoch
    pub identifiers_in_epoch: usize,

    /// Pacing read at the start of the current epoch
    pub pacing: Option<Pacing>,
}

/// How an epoch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EpochEnd {
    /// No workers, no identifiers, or no worker with work
    Idle,
    /// The identifier set changed after a round
    Changed,
    /// A stop was requested
    Stopped,
}

// ============================================================================
// Round Scheduler
// ============================================================================

/// Drives the prober over workers and identifiers until stopped
pub struct RoundScheduler {
    sessions: Arc<dyn SessionProvider>,
    store: Arc<dyn RecordStore>,
    pacing: Arc<dyn PacingSource>,
    sink: Arc<dyn FoundSink>,
    prober: Prober,
    idle_backoff: Duration,
    stats: Arc<RwLock<MonitorStats>>,
}

impl RoundScheduler {
    /// Create a scheduler with the default prober and backoff
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        store: Arc<dyn RecordStore>,
        pacing: Arc<dyn PacingSource>,
        sink: Arc<dyn FoundSink>,
    ) -> Self {
        Self {
            sessions,
            store,
            pacing,
            sink,
            prober: Prober::new(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            stats: Arc::new(RwLock::new(MonitorStats::default())),
        }
    }

    /// Use a custom prober
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// Set the idle and error backoff
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Record statistics into a shared handle
    pub fn with_stats(mut self, stats: Arc<RwLock<MonitorStats>>) -> Self {
        self.stats = stats;
        self
    }

    /// Shared statistics handle
    pub fn stats(&self) -> Arc<RwLock<MonitorStats>> {
        self.stats.clone()
    }

    /// Run epochs until `stop` fires
    ///
    /// Never returns for any other reason: failures are logged and followed
    /// by the idle backoff.
    pub async fn run(&self, mut stop: StopSignal) {
        tracing::info!("Monitoring loop started");

        while !stop.is_stopped() {
            match self.run_epoch(&mut stop).await {
                Ok(EpochEnd::Stopped) => break,
                Ok(EpochEnd::Changed) => {
                    tracing::info!("Identifier set changed, re-partitioning");
                }
                Ok(EpochEnd::Idle) => {
                    tracing::info!(
                        backoff_secs = self.idle_backoff.as_secs(),
                        "No identifiers or workers to monitor, waiting"
                    );
                    if !stop.sleep(self.idle_backoff).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_secs = self.idle_backoff.as_secs(),
                        "Error in monitoring loop"
                    );
                    if !stop.sleep(self.idle_backoff).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("Monitoring loop stopped");
    }

    async fn run_epoch(&self, stop: &mut StopSignal) -> MonitorResult<EpochEnd> {
        let workers = self.sessions.active_workers().await?;
        let identifiers = self.store.active_identifiers().await?;

        if workers.is_empty() || identifiers.is_empty() {
            return Ok(EpochEnd::Idle);
        }

        let pacing = self.pacing.pacing().await?;
        let assignment = Assignment::new(&identifiers, workers.len());
        let active = assignment.active_indices();

        if active.is_empty() {
            return Ok(EpochEnd::Idle);
        }

        self.begin_epoch(&assignment, &workers, pacing).await;

        let snapshot: BTreeSet<Identifier> = assignment.identifiers().iter().cloned().collect();
        let mut cursor = Cursor::new(active.len());

        loop {
            if stop.is_stopped() {
                return Ok(EpochEnd::Stopped);
            }

            let index = active[cursor.position()];
            let checklist = assignment.checklist(index, cursor.round());
            tracing::debug!(
                worker = %workers[index].id(),
                alternating = assignment.role(index) == WorkerRole::Alternating,
                round = cursor.round(),
                checklist = ?checklist.iter().map(Identifier::as_str).collect::<Vec<_>>(),
                "Turn"
            );
            self.run_turn(&workers[index], &checklist, cursor.round(), pacing.check_interval, stop)
                .await;

            tokio::task::yield_now().await;

            if !cursor.advance() {
                continue;
            }

            metrics::record_round();
            self.stats.write().await.rounds_completed += 1;
            tracing::debug!(
                round = cursor.round(),
                pair_delay_secs = pacing.pair_delay.as_secs(),
                "Round completed"
            );

            if stop.is_stopped() {
                return Ok(EpochEnd::Stopped);
            }
            if !pacing.pair_delay.is_zero() && !stop.sleep(pacing.pair_delay).await {
                return Ok(EpochEnd::Stopped);
            }

            let current: BTreeSet<Identifier> =
                self.store.active_identifiers().await?.into_iter().collect();
            if current != snapshot {
                return Ok(EpochEnd::Changed);
            }
        }
    }

    async fn begin_epoch(
        &self,
        assignment: &Assignment,
        workers: &[WorkerHandle],
        pacing: Pacing,
    ) {
        let mode = assignment.mode();
        let total = assignment.identifiers().len();

        match mode {
            PartitionMode::SurplusIdentifiers => tracing::info!(
                identifiers = total,
                workers = workers.len(),
                "Distributing identifiers round-robin across workers"
            ),
            PartitionMode::SurplusWorkers => tracing::info!(
                identifiers = total,
                workers = workers.len(),
                primary = assignment.primary_count(),
                alternating = assignment.alternating_count(),
                "More workers than identifiers, assigning primary and alternating workers"
            ),
        }

        let labels: Vec<String> = workers.iter().map(|w| w.id().to_string()).collect();
        tracing::info!("Distribution:\n{}", assignment.describe(&labels));
        tracing::info!(
            "Verification: {}/{} identifiers assigned",
            assignment.covered_count(),
            total
        );

        metrics::record_epoch(mode.id());

        let mut stats = self.stats.write().await;
        stats.epochs += 1;
        stats.last_mode = Some(mode);
        stats.workers_in_epoch = workers.len();
        stats.identifiers_in_epoch = total;
        stats.pacing = Some(pacing);
    }

    async fn run_turn(
        &self,
        worker: &WorkerHandle,
        checklist: &[Identifier],
        round: u64,
        check_interval: Duration,
        stop: &mut StopSignal,
    ) {
        for (i, identifier) in checklist.iter().enumerate() {
            if stop.is_stopped() {
                return;
            }

            let result = self.prober.probe(worker.as_ref(), identifier, stop).await;
            tracing::debug!(worker = %worker.id(), identifier = %identifier, %result, "Probed");

            {
                let mut stats = self.stats.write().await;
                stats.probes += 1;
                if result.is_available() {
                    stats.found += 1;
                }
            }

            if result.is_available() {
                metrics::record_found();
                let event = FoundEvent::new(identifier.clone(), worker.id().clone(), round);
                let delivered = tokio::select! {
                    biased;
                    result = self.sink.found(event) => Some(result),
                    _ = stop.stopped() => None,
                };
                match delivered {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tracing::error!(identifier = %identifier, error = %e, "Found handler failed");
                    }
                    None => {
                        tracing::warn!(identifier = %identifier, "Stopped while handing off found identifier");
                        return;
                    }
                }
            }

            if let Err(e) = self.store.mark_checked(identifier).await {
                tracing::warn!(identifier = %identifier, error = %e, "Failed to update last checked");
            }

            let is_last = i + 1 == checklist.len();
            if !is_last && !check_interval.is_zero() && !stop.sleep(check_interval).await {
                return;
            }
        }
    }
}
