//! Simulated workers
//!
//! A [`SimulatedOracle`] holds the availability state of identifiers and is
//! shared by any number of [`SimulatedWorker`]s. Used by the `simulate`
//! command and by tests to script lookups, rate limits and claim races.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{Identifier, WorkerId};
use crate::monitor::collaborators::{ClaimReceipt, Worker};
use crate::monitor::error::{ClaimError, LookupError};

/// Base of the locator returned by simulated claims
pub const LOCATOR_BASE: &str = "https://t.me/";

// ============================================================================
// Oracle
// ============================================================================

/// Standing availability rule for an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Always resolves to an existing entity
    Taken,
    /// Never resolves
    Available,
    /// Taken for the first `n` lookups, available afterwards
    AvailableAfter(u64),
}

/// A lookup observed by the oracle
#[derive(Debug, Clone)]
pub struct LookupRecord {
    /// Worker that performed the lookup
    pub worker: WorkerId,
    /// Identifier looked up
    pub identifier: Identifier,
    /// Virtual time of the lookup
    pub at: Instant,
}

#[derive(Debug, Default)]
struct OracleState {
    rules: HashMap<Identifier, Rule>,
    scripted: HashMap<Identifier, VecDeque<Result<(), LookupError>>>,
    lookup_counts: HashMap<Identifier, u64>,
    claimed: HashMap<Identifier, WorkerId>,
    log: Vec<LookupRecord>,
}

/// Shared availability state
#[derive(Debug, Default)]
pub struct SimulatedOracle {
    state: Mutex<OracleState>,
}

impl SimulatedOracle {
    /// Create an oracle where every identifier is taken
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, OracleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the standing rule for an identifier
    pub fn set_rule(&self, identifier: &Identifier, rule: Rule) {
        self.state().rules.insert(identifier.clone(), rule);
    }

    /// Queue one-off responses consumed before the standing rule applies
    pub fn script(
        &self,
        identifier: &Identifier,
        responses: impl IntoIterator<Item = Result<(), LookupError>>,
    ) {
        self.state()
            .scripted
            .entry(identifier.clone())
            .or_default()
            .extend(responses);
    }

    fn lookup(&self, worker: &WorkerId, identifier: &Identifier) -> Result<(), LookupError> {
        let mut state = self.state();

        state.log.push(LookupRecord {
            worker: worker.clone(),
            identifier: identifier.clone(),
            at: Instant::now(),
        });
        let count = {
            let entry = state.lookup_counts.entry(identifier.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        if let Some(response) = state
            .scripted
            .get_mut(identifier)
            .and_then(|queue| queue.pop_front())
        {
            return response;
        }

        if state.claimed.contains_key(identifier) {
            return Ok(());
        }

        match state.rules.get(identifier).copied().unwrap_or(Rule::Taken) {
            Rule::Taken => Ok(()),
            Rule::Available => Err(LookupError::NotOccupied),
            Rule::AvailableAfter(n) if count > n => Err(LookupError::NotOccupied),
            Rule::AvailableAfter(_) => Ok(()),
        }
    }

    fn try_claim(&self, worker: &WorkerId, identifier: &Identifier) -> bool {
        let mut state = self.state();
        if state.claimed.contains_key(identifier) {
            return false;
        }
        state.claimed.insert(identifier.clone(), worker.clone());
        true
    }

    /// Every lookup in order
    pub fn lookups(&self) -> Vec<LookupRecord> {
        self.state().log.clone()
    }

    /// Total number of lookups
    pub fn total_lookups(&self) -> usize {
        self.state().log.len()
    }

    /// Number of lookups for one identifier
    pub fn lookup_count(&self, identifier: &Identifier) -> u64 {
        self.state()
            .lookup_counts
            .get(identifier)
            .copied()
            .unwrap_or(0)
    }

    /// Worker that claimed an identifier, if any
    pub fn claimed_by(&self, identifier: &Identifier) -> Option<WorkerId> {
        self.state().claimed.get(identifier).cloned()
    }
}

// ============================================================================
// Worker
// ============================================================================

/// How a simulated worker responds to claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimBehavior {
    /// Claim succeeds unless another worker got there first
    Succeed,
    /// Always loses the race
    Taken,
    /// Rate limited for this many seconds
    RateLimited(u64),
    /// Fails with a message
    Fail(String),
}

/// Scriptable worker backed by a [`SimulatedOracle`]
#[derive(Debug)]
pub struct SimulatedWorker {
    id: WorkerId,
    oracle: Arc<SimulatedOracle>,
    connected: AtomicBool,
    claim_behavior: Mutex<ClaimBehavior>,
    latency: Duration,
    claims: AtomicU64,
}

impl SimulatedWorker {
    /// Create a worker with its own oracle
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_oracle(id, Arc::new(SimulatedOracle::new()))
    }

    /// Create a worker sharing an oracle
    pub fn with_oracle(id: impl Into<String>, oracle: Arc<SimulatedOracle>) -> Self {
        Self {
            id: WorkerId::new(id),
            oracle,
            connected: AtomicBool::new(true),
            claim_behavior: Mutex::new(ClaimBehavior::Succeed),
            latency: Duration::ZERO,
            claims: AtomicU64::new(0),
        }
    }

    /// Set claim behavior
    pub fn with_claim_behavior(self, behavior: ClaimBehavior) -> Self {
        *self
            .claim_behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = behavior;
        self
    }

    /// Add a fixed delay to every lookup
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Mark the session connected or disconnected
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// The oracle this worker talks to
    pub fn oracle(&self) -> &Arc<SimulatedOracle> {
        &self.oracle
    }

    /// Number of claim attempts made through this worker
    pub fn claim_count(&self) -> u64 {
        self.claims.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for SimulatedWorker {
    fn id(&self) -> &WorkerId {
        &self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn lookup(&self, identifier: &Identifier) -> Result<(), LookupError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.oracle.lookup(&self.id, identifier)
    }

    async fn claim(&self, identifier: &Identifier) -> Result<ClaimReceipt, ClaimError> {
        self.claims.fetch_add(1, Ordering::SeqCst);

        let behavior = self
            .claim_behavior
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        match behavior {
            ClaimBehavior::Succeed => {
                if self.oracle.try_claim(&self.id, identifier) {
                    Ok(ClaimReceipt::new(format!("{LOCATOR_BASE}{identifier}")))
                } else {
                    Err(ClaimError::AlreadyTaken)
                }
            }
            ClaimBehavior::Taken => Err(ClaimError::AlreadyTaken),
            ClaimBehavior::RateLimited(seconds) => Err(ClaimError::RateLimited { seconds }),
            ClaimBehavior::Fail(msg) => Err(ClaimError::Failed(msg)),
        }
    }
}
