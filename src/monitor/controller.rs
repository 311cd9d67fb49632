//! Monitoring controller
//!
//! Owns the lifecycle of the round scheduler. State transitions happen
//! under a single async mutex, so two concurrent `start` calls can never
//! spawn two loops.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::collaborators::{PacingSource, RecordStore, SessionProvider};
use super::error::{MonitorError, MonitorResult};
use super::events::FoundSink;
use super::prober::Prober;
use super::round::{MonitorStats, RoundScheduler, DEFAULT_IDLE_BACKOFF};
use super::signal::{stop_channel, StopHandle};
use crate::metrics;

/// Lifecycle state of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// No loop running
    Idle,
    /// Loop running
    Running,
    /// Stop requested, loop not yet exited
    Stopping,
}

impl MonitorState {
    /// Get state id as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Snapshot returned by [`MonitorController::status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Lifecycle state
    pub state: MonitorState,

    /// Statistics of the current or last run
    #[serde(flatten)]
    pub stats: MonitorStats,
}

impl StatusReport {
    /// Multi-line human-readable summary
    pub fn display(&self) -> String {
        let mode = self
            .stats
            .last_mode
            .map(|m| m.id().to_string())
            .unwrap_or_else(|| "-".to_string());
        let (check_interval, pair_delay) = match self.stats.pacing {
            Some(pacing) => (
                format!("{:?}", pacing.check_interval),
                format!("{:?}", pacing.pair_delay),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        format!(
            "Monitoring: {}\n\
             Epochs: {}\n\
             Rounds completed: {}\n\
             Probes: {}\n\
             Found: {}\n\
             Mode: {}\n\
             Workers: {}\n\
             Identifiers: {}\n\
             Check interval: {}\n\
             Pair delay: {}",
            self.state,
            self.stats.epochs,
            self.stats.rounds_completed,
            self.stats.probes,
            self.stats.found,
            mode,
            self.stats.workers_in_epoch,
            self.stats.identifiers_in_epoch,
            check_interval,
            pair_delay,
        )
    }
}

struct RunningLoop {
    stop: StopHandle,
    task: JoinHandle<()>,
}

impl RunningLoop {
    fn state(&self) -> MonitorState {
        if self.task.is_finished() {
            MonitorState::Idle
        } else if self.stop.is_stopped() {
            MonitorState::Stopping
        } else {
            MonitorState::Running
        }
    }
}

/// Starts, stops and reports on the monitoring loop
pub struct MonitorController {
    store: Arc<dyn RecordStore>,
    pacing: Arc<dyn PacingSource>,
    prober: Prober,
    idle_backoff: Duration,
    running: Mutex<Option<RunningLoop>>,
    stats: Arc<RwLock<MonitorStats>>,
}

impl MonitorController {
    /// Create an idle controller
    pub fn new(store: Arc<dyn RecordStore>, pacing: Arc<dyn PacingSource>) -> Self {
        Self {
            store,
            pacing,
            prober: Prober::new(),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            running: Mutex::new(None),
            stats: Arc::new(RwLock::new(MonitorStats::default())),
        }
    }

    /// Use a custom prober for future runs
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// Set the idle and error backoff for future runs
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    /// Start monitoring
    ///
    /// Returns `false` without doing anything if a loop is already running
    /// or still stopping.
    pub async fn start(
        &self,
        sessions: Arc<dyn SessionProvider>,
        sink: Arc<dyn FoundSink>,
    ) -> bool {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref() {
            if current.state() != MonitorState::Idle {
                tracing::info!("Monitoring is already running");
                return false;
            }
        }

        *self.stats.write().await = MonitorStats::default();

        let scheduler = RoundScheduler::new(sessions, self.store.clone(), self.pacing.clone(), sink)
            .with_prober(self.prober.clone())
            .with_idle_backoff(self.idle_backoff)
            .with_stats(self.stats.clone());

        let (stop, signal) = stop_channel();
        let task = tokio::spawn(async move {
            scheduler.run(signal).await;
            metrics::set_monitor_running(false);
        });

        metrics::set_monitor_running(true);
        tracing::info!("Monitoring started");
        *running = Some(RunningLoop { stop, task });
        true
    }

    /// Start monitoring only when there is something to monitor
    ///
    /// Used on startup: fails with [`MonitorError::NotReady`] when there are
    /// no workers or no identifiers, and with [`MonitorError::AlreadyRunning`]
    /// when a loop is active.
    pub async fn start_if_ready(
        &self,
        sessions: Arc<dyn SessionProvider>,
        sink: Arc<dyn FoundSink>,
    ) -> MonitorResult<()> {
        if self.is_running().await {
            return Err(MonitorError::AlreadyRunning);
        }

        let workers = sessions.active_workers().await?;
        if workers.is_empty() {
            return Err(MonitorError::not_ready("no active workers"));
        }

        let identifiers = self.store.active_identifiers().await?;
        if identifiers.is_empty() {
            return Err(MonitorError::not_ready("no identifiers to monitor"));
        }

        tracing::info!(
            workers = workers.len(),
            identifiers = identifiers.len(),
            "Starting monitoring"
        );

        if self.start(sessions, sink).await {
            Ok(())
        } else {
            Err(MonitorError::AlreadyRunning)
        }
    }

    /// Request a stop; does not wait for the loop to exit
    pub async fn stop(&self) {
        match self.running.lock().await.as_ref() {
            Some(current) if current.state() == MonitorState::Running => {
                current.stop.stop();
                tracing::info!("Monitoring stop requested");
            }
            _ => tracing::debug!("Monitoring is not running"),
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> MonitorState {
        self.running
            .lock()
            .await
            .as_ref()
            .map(RunningLoop::state)
            .unwrap_or(MonitorState::Idle)
    }

    /// Whether the loop is still active (running or stopping)
    pub async fn is_running(&self) -> bool {
        self.state().await != MonitorState::Idle
    }

    /// State and statistics
    pub async fn status(&self) -> StatusReport {
        let state = self.state().await;
        let stats = self.stats.read().await.clone();
        StatusReport { state, stats }
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(&self) {
        let current = self.running.lock().await.take();
        if let Some(current) = current {
            current.stop.stop();
            if let Err(e) = current.task.await {
                tracing::error!(error = %e, "Monitoring task failed");
            }
            metrics::set_monitor_running(false);
        }
    }
}
