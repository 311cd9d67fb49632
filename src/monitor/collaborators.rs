//! Interfaces the monitor consumes
//!
//! The monitor owns scheduling only. Sessions, persistence and pacing
//! settings live behind these traits so they can be swapped for real
//! backends or for in-memory fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::{ClaimError, LookupError, MonitorResult};
use crate::models::{Identifier, WorkerId};

// ============================================================================
// Worker
// ============================================================================

/// Receipt returned by a successful claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Where the claimed identifier can now be found
    pub locator: String,
}

impl ClaimReceipt {
    /// Create a receipt
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }
}

/// A connected session able to look up and claim identifiers
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable label for this worker
    fn id(&self) -> &WorkerId;

    /// Whether the underlying session is currently connected
    fn is_connected(&self) -> bool {
        true
    }

    /// Resolve an identifier through the availability oracle
    ///
    /// `Ok(())` means the identifier is held by an existing entity.
    async fn lookup(&self, identifier: &Identifier) -> Result<(), LookupError>;

    /// Irreversibly acquire an identifier
    ///
    /// Any partial side effect of a failed attempt must be rolled back by
    /// the implementation before returning the error.
    async fn claim(&self, identifier: &Identifier) -> Result<ClaimReceipt, ClaimError>;
}

/// Shared worker handle
pub type WorkerHandle = Arc<dyn Worker>;

// ============================================================================
// Session Provider
// ============================================================================

/// Source of connected worker handles
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connected, ready-to-probe workers in preferred order
    async fn active_workers(&self) -> MonitorResult<Vec<WorkerHandle>>;
}

/// Session provider over a fixed list of workers
///
/// Workers reporting `is_connected() == false` are excluded at every
/// snapshot.
pub struct StaticSessions {
    workers: Vec<WorkerHandle>,
}

impl StaticSessions {
    /// Create a provider from a list of workers
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self { workers }
    }

    /// Total number of workers, connected or not
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the provider holds no workers at all
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn active_workers(&self) -> MonitorResult<Vec<WorkerHandle>> {
        let mut active = Vec::with_capacity(self.workers.len());

        for worker in &self.workers {
            if worker.is_connected() {
                active.push(Arc::clone(worker));
            } else {
                tracing::warn!(worker = %worker.id(), "Worker is disconnected, excluding from monitoring");
            }
        }

        tracing::info!(
            active = active.len(),
            total = self.workers.len(),
            "Using {} active workers out of {} total",
            active.len(),
            self.workers.len()
        );

        Ok(active)
    }
}

// ============================================================================
// Record Store
// ============================================================================

/// Persistent records keyed by identifier
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current monitoring targets, sorted and unique
    async fn active_identifiers(&self) -> MonitorResult<Vec<Identifier>>;

    /// Stamp the identifier as checked now (best effort)
    async fn mark_checked(&self, identifier: &Identifier) -> MonitorResult<()>;

    /// Stop monitoring an identifier
    async fn remove(&self, identifier: &Identifier) -> MonitorResult<bool>;

    /// Append a successful claim to the history
    async fn append_history(
        &self,
        identifier: &Identifier,
        locator: &str,
        worker: &WorkerId,
    ) -> MonitorResult<()>;
}

// ============================================================================
// Pacing
// ============================================================================

/// Delays applied by the round scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    /// Pause between consecutive probes within one worker's turn
    pub check_interval: Duration,

    /// Pause after every completed round
    pub pair_delay: Duration,
}

impl Pacing {
    /// Create pacing from whole seconds
    pub fn from_secs(check_interval: u64, pair_delay: u64) -> Self {
        Self {
            check_interval: Duration::from_secs(check_interval),
            pair_delay: Duration::from_secs(pair_delay),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_secs(30, 60)
    }
}

/// Source of pacing settings, read once per epoch
#[async_trait]
pub trait PacingSource: Send + Sync {
    /// Current pacing
    async fn pacing(&self) -> MonitorResult<Pacing>;
}

#[async_trait]
impl PacingSource for Pacing {
    async fn pacing(&self) -> MonitorResult<Pacing> {
        Ok(*self)
    }
}
