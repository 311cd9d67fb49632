//! Found-identifier events and the claim processing task
//!
//! The scheduler hands every available identifier to a [`FoundSink`].
//! [`ChannelSink`] forwards them over a bounded channel to a
//! [`ClaimProcessor`] running as its own task, so slow claims and
//! notifications never stall probe pacing. An identifier that is still
//! waiting for its claim is not queued again. Sending otherwise waits for
//! channel capacity; the scheduler abandons that wait on stop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::claim::{ClaimDispatcher, ClaimReport};
use super::collaborators::{RecordStore, SessionProvider};
use super::error::{MonitorError, MonitorResult};
use crate::models::{Identifier, WorkerId};

// ============================================================================
// Events
// ============================================================================

/// An identifier found available by a probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundEvent {
    /// Identifier found available
    pub identifier: Identifier,

    /// Worker whose probe found it
    pub worker: WorkerId,

    /// Round counter of the epoch when found
    pub round: u64,

    /// Wall-clock time of the probe
    pub found_at: DateTime<Utc>,
}

impl FoundEvent {
    /// Create an event stamped now
    pub fn new(identifier: Identifier, worker: WorkerId, round: u64) -> Self {
        Self {
            identifier,
            worker,
            round,
            found_at: Utc::now(),
        }
    }
}

/// Receives found identifiers from the scheduler
///
/// Called once per positive probe, in order. The scheduler awaits the
/// returned future before its next probe; errors are logged by the
/// scheduler and never stop it.
#[async_trait]
pub trait FoundSink: Send + Sync {
    /// Handle one found identifier
    async fn found(&self, event: FoundEvent) -> MonitorResult<()>;
}

/// Identifiers queued or being claimed
type Pending = Arc<Mutex<HashSet<Identifier>>>;

/// Sink forwarding events into a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<FoundEvent>,
    pending: Pending,
}

/// Receiving side of [`found_channel`]
#[derive(Debug)]
pub struct FoundReceiver {
    rx: mpsc::Receiver<FoundEvent>,
    pending: Pending,
}

/// Create a channel sink and the receiver a claim processor consumes
pub fn found_channel(capacity: usize) -> (ChannelSink, FoundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Pending::default();
    (
        ChannelSink {
            tx,
            pending: pending.clone(),
        },
        FoundReceiver { rx, pending },
    )
}

impl ChannelSink {
    /// Whether an event for `identifier` is waiting to be processed
    pub async fn is_pending(&self, identifier: &Identifier) -> bool {
        self.pending.lock().await.contains(identifier)
    }
}

#[async_trait]
impl FoundSink for ChannelSink {
    async fn found(&self, event: FoundEvent) -> MonitorResult<()> {
        if self.is_pending(&event.identifier).await {
            tracing::debug!(identifier = %event.identifier, "Claim already queued, skipping event");
            return Ok(());
        }

        // Reserve first: the wait may be abandoned without leaving a stale entry
        let permit = self
            .tx
            .reserve()
            .await
            .map_err(|_| MonitorError::ChannelClosed)?;

        if !self.pending.lock().await.insert(event.identifier.clone()) {
            return Ok(());
        }
        permit.send(event);
        Ok(())
    }
}

impl FoundReceiver {
    /// Next queued event, or `None` once every sink is dropped
    pub async fn recv(&mut self) -> Option<FoundEvent> {
        self.rx.recv().await
    }

    /// Let `identifier` be queued again
    pub async fn complete(&self, identifier: &Identifier) {
        self.pending.lock().await.remove(identifier);
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Delivers claim outcomes to whoever operates the monitor
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one report
    async fn notify(&self, report: &ClaimReport) -> MonitorResult<()>;
}

/// Notifier that writes reports to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, report: &ClaimReport) -> MonitorResult<()> {
        if report.success {
            tracing::info!(identifier = %report.identifier, "{report}");
        } else {
            tracing::warn!(identifier = %report.identifier, "{report}");
        }
        Ok(())
    }
}

// ============================================================================
// Claim Processor
// ============================================================================

/// Totals of one processor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Events received
    pub received: u64,
    /// Events skipped because the identifier is no longer monitored
    pub skipped: u64,
    /// Successful claims
    pub claimed: u64,
    /// Failed claims
    pub failed: u64,
}

/// Consumes found events and claims identifiers
pub struct ClaimProcessor {
    sessions: Arc<dyn SessionProvider>,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    dispatcher: ClaimDispatcher,
}

impl ClaimProcessor {
    /// Create a processor that logs reports
    pub fn new(sessions: Arc<dyn SessionProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            sessions,
            store,
            notifier: Arc::new(LogNotifier),
            dispatcher: ClaimDispatcher::new(),
        }
    }

    /// Use a custom notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Claim one found identifier and record the outcome
    ///
    /// Returns `None` when the identifier is no longer monitored (already
    /// claimed through an earlier event, or removed by the operator).
    pub async fn process(&self, event: &FoundEvent) -> Option<ClaimReport> {
        let identifier = &event.identifier;

        match self.store.active_identifiers().await {
            Ok(active) if !active.contains(identifier) => {
                tracing::debug!(identifier = %identifier, "Identifier no longer monitored, skipping claim");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Could not verify identifier is still monitored");
            }
        }

        tracing::info!(
            identifier = %identifier,
            found_by = %event.worker,
            "Found available identifier {}",
            identifier.mention()
        );

        let workers = match self.sessions.active_workers().await {
            Ok(workers) => workers,
            Err(e) => {
                tracing::error!(error = %e, "Could not load workers for claim");
                Vec::new()
            }
        };

        let report = self.dispatcher.claim(identifier, &workers).await;

        if report.success {
            if let Err(e) = self.store.remove(identifier).await {
                tracing::error!(identifier = %identifier, error = %e, "Failed to remove claimed identifier");
            } else {
                tracing::info!(identifier = %identifier, "Identifier removed from monitoring after claim");
            }

            if let (Some(locator), Some(worker)) = (&report.locator, &report.worker) {
                if let Err(e) = self.store.append_history(identifier, locator, worker).await {
                    tracing::error!(identifier = %identifier, error = %e, "Failed to append claim history");
                }
            }
        }

        if let Err(e) = self.notifier.notify(&report).await {
            tracing::warn!(identifier = %identifier, error = %e, "Notification failed");
        }

        Some(report)
    }

    /// Consume events until every sender is dropped
    pub async fn run(self, mut rx: FoundReceiver) -> ProcessorStats {
        let mut stats = ProcessorStats::default();

        while let Some(event) = rx.recv().await {
            stats.received += 1;

            match self.process(&event).await {
                None => stats.skipped += 1,
                Some(report) if report.success => stats.claimed += 1,
                Some(_) => stats.failed += 1,
            }

            rx.complete(&event.identifier).await;
        }

        tracing::info!(
            received = stats.received,
            claimed = stats.claimed,
            failed = stats.failed,
            skipped = stats.skipped,
            "Claim processor finished"
        );
        stats
    }

    /// Run on a background task
    pub fn spawn(self, rx: FoundReceiver) -> JoinHandle<ProcessorStats> {
        tokio::spawn(self.run(rx))
    }
}
