//! Common test utilities

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use sniper::models::{Identifier, WorkerId};
use sniper::monitor::{
    stop_channel, FoundEvent, FoundSink, MonitorError, MonitorResult, MonitorStats, Pacing,
    PacingSource, RecordStore, RoundScheduler, StaticSessions, StopHandle, WorkerHandle,
};
use sniper::sim::{SimulatedOracle, SimulatedWorker};
use sniper::storage::MemoryStore;

/// Parse one identifier
#[allow(dead_code)]
pub fn id(name: &str) -> Identifier {
    Identifier::new(name).unwrap()
}

/// Parse several identifiers
#[allow(dead_code)]
pub fn ids(names: &[&str]) -> Vec<Identifier> {
    names.iter().map(|n| id(n)).collect()
}

/// Sink that records events, optionally failing every call
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FoundEvent>>,
    fail: bool,
}

#[allow(dead_code)]
impl RecordingSink {
    /// Sink that records and then reports an error
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Events received so far
    pub async fn events(&self) -> Vec<FoundEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl FoundSink for RecordingSink {
    async fn found(&self, event: FoundEvent) -> MonitorResult<()> {
        self.events.lock().await.push(event);
        if self.fail {
            return Err(MonitorError::sink("claim backend unavailable"));
        }
        Ok(())
    }
}

/// Store wrapper that fails on demand
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_reads: AtomicU32,
    failing_marks: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    /// Fail the next `n` reads of the active identifiers
    pub fn fail_next_reads(&self, n: u32) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    /// Make every `mark_checked` call fail
    pub fn fail_marks(&self) {
        self.failing_marks.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn active_identifiers(&self) -> MonitorResult<Vec<Identifier>> {
        let pending = self.failing_reads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_reads.store(pending - 1, Ordering::SeqCst);
            return Err(MonitorError::store("active_identifiers", "connection reset"));
        }
        self.inner.active_identifiers().await
    }

    async fn mark_checked(&self, identifier: &Identifier) -> MonitorResult<()> {
        if self.failing_marks.load(Ordering::SeqCst) {
            return Err(MonitorError::store("mark_checked", "read-only"));
        }
        self.inner.mark_checked(identifier).await
    }

    async fn remove(&self, identifier: &Identifier) -> MonitorResult<bool> {
        self.inner.remove(identifier).await
    }

    async fn append_history(
        &self,
        identifier: &Identifier,
        locator: &str,
        worker: &WorkerId,
    ) -> MonitorResult<()> {
        self.inner.append_history(identifier, locator, worker).await
    }
}

#[async_trait]
impl PacingSource for FlakyStore {
    async fn pacing(&self) -> MonitorResult<Pacing> {
        self.inner.pacing().await
    }
}

/// A pool of simulated workers `w0..wN` sharing one oracle
#[allow(dead_code)]
pub struct Harness {
    pub oracle: Arc<SimulatedOracle>,
    pub workers: Vec<Arc<SimulatedWorker>>,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
}

/// A scheduler running on its own task
#[allow(dead_code)]
pub struct RunningScheduler {
    pub stop: StopHandle,
    pub task: JoinHandle<()>,
    pub stats: Arc<RwLock<MonitorStats>>,
}

#[allow(dead_code)]
impl Harness {
    /// Build a harness with `workers` workers monitoring `names`
    pub async fn new(workers: usize, names: &[&str], pacing: Pacing) -> Self {
        let oracle = Arc::new(SimulatedOracle::new());
        let workers = (0..workers)
            .map(|i| Arc::new(SimulatedWorker::with_oracle(format!("w{i}"), oracle.clone())))
            .collect();

        let store = Arc::new(MemoryStore::with_pacing(pacing));
        store.add_all(&ids(names)).await.unwrap();

        Self {
            oracle,
            workers,
            store,
            sink: Arc::new(RecordingSink::default()),
        }
    }

    /// Session provider over all workers
    pub fn sessions(&self) -> Arc<StaticSessions> {
        let handles: Vec<WorkerHandle> = self
            .workers
            .iter()
            .map(|w| w.clone() as WorkerHandle)
            .collect();
        Arc::new(StaticSessions::new(handles))
    }

    /// Scheduler over this harness
    pub fn scheduler(&self) -> RoundScheduler {
        RoundScheduler::new(
            self.sessions(),
            self.store.clone(),
            self.store.clone(),
            self.sink.clone(),
        )
    }

    /// Spawn the scheduler
    pub fn spawn(&self) -> RunningScheduler {
        spawn_scheduler(self.scheduler())
    }

    /// Identifiers looked up by one worker, in order
    pub fn lookups_by(&self, worker: &str) -> Vec<String> {
        self.oracle
            .lookups()
            .into_iter()
            .filter(|r| r.worker.as_str() == worker)
            .map(|r| r.identifier.to_string())
            .collect()
    }
}

/// Spawn a configured scheduler
#[allow(dead_code)]
pub fn spawn_scheduler(scheduler: RoundScheduler) -> RunningScheduler {
    let stats = scheduler.stats();
    let (stop, signal) = stop_channel();
    let task = tokio::spawn(async move { scheduler.run(signal).await });
    RunningScheduler { stop, task, stats }
}
