//! In-memory record store
//!
//! [`MemoryStore`] keeps monitored identifiers, last-checked stamps, claim
//! history and pacing settings behind a `tokio::sync::RwLock`. It
//! implements [`RecordStore`] and [`PacingSource`] and tolerates being
//! mutated while a monitoring round is in flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::models::{HistoryEntry, Identifier, WorkerId};
use crate::monitor::collaborators::{Pacing, PacingSource, RecordStore};
use crate::monitor::error::MonitorResult;

/// Per-identifier record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    /// Whether the identifier is currently monitored
    pub active: bool,

    /// When the identifier was added
    pub added_at: DateTime<Utc>,

    /// Last probe time
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    identifiers: BTreeMap<Identifier, IdentifierRecord>,
    history: Vec<HistoryEntry>,
    pacing: Pacing,
}

/// In-memory implementation of the record store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create an empty store with default pacing
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with the given pacing
    pub fn with_pacing(pacing: Pacing) -> Self {
        Self {
            state: RwLock::new(StoreState {
                pacing,
                ..Default::default()
            }),
        }
    }

    /// Start monitoring an identifier; `false` if already present
    pub async fn add(&self, identifier: &Identifier) -> MonitorResult<bool> {
        let mut state = self.state.write().await;

        if state.identifiers.contains_key(identifier) {
            tracing::warn!(identifier = %identifier, "Identifier already exists");
            return Ok(false);
        }

        state.identifiers.insert(
            identifier.clone(),
            IdentifierRecord {
                active: true,
                added_at: Utc::now(),
                last_checked: None,
            },
        );
        tracing::info!(identifier = %identifier, "Added identifier {}", identifier.mention());
        Ok(true)
    }

    /// Add several identifiers, returning how many were new
    pub async fn add_all(&self, identifiers: &[Identifier]) -> MonitorResult<usize> {
        let mut added = 0;
        for identifier in identifiers {
            if self.add(identifier).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Pause or resume monitoring without removing the record
    pub async fn set_active(&self, identifier: &Identifier, active: bool) -> bool {
        let mut state = self.state.write().await;
        match state.identifiers.get_mut(identifier) {
            Some(record) => {
                record.active = active;
                true
            }
            None => false,
        }
    }

    /// Get the record of an identifier
    pub async fn record(&self, identifier: &Identifier) -> Option<IdentifierRecord> {
        self.state.read().await.identifiers.get(identifier).cloned()
    }

    /// Last probe time of an identifier
    pub async fn last_checked(&self, identifier: &Identifier) -> Option<DateTime<Utc>> {
        self.record(identifier)
            .await
            .and_then(|record| record.last_checked)
    }

    /// Claim history, newest first
    pub async fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        let state = self.state.read().await;
        let mut history = state.history.clone();
        history.sort_by(|a, b| b.claimed_at.cmp(&a.claimed_at));
        history.truncate(limit);
        history
    }

    /// Replace pacing settings
    pub async fn set_pacing(&self, pacing: Pacing) {
        self.state.write().await.pacing = pacing;
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn active_identifiers(&self) -> MonitorResult<Vec<Identifier>> {
        let state = self.state.read().await;
        Ok(state
            .identifiers
            .iter()
            .filter(|(_, record)| record.active)
            .map(|(identifier, _)| identifier.clone())
            .collect())
    }

    async fn mark_checked(&self, identifier: &Identifier) -> MonitorResult<()> {
        let mut state = self.state.write().await;
        if let Some(record) = state.identifiers.get_mut(identifier) {
            record.last_checked = Some(Utc::now());
        }
        Ok(())
    }

    async fn remove(&self, identifier: &Identifier) -> MonitorResult<bool> {
        let removed = self
            .state
            .write()
            .await
            .identifiers
            .remove(identifier)
            .is_some();
        if removed {
            tracing::info!(identifier = %identifier, "Removed identifier {}", identifier.mention());
        }
        Ok(removed)
    }

    async fn append_history(
        &self,
        identifier: &Identifier,
        locator: &str,
        worker: &WorkerId,
    ) -> MonitorResult<()> {
        let entry = HistoryEntry::new(identifier.clone(), locator, worker.clone());
        self.state.write().await.history.push(entry);
        tracing::info!(identifier = %identifier, worker = %worker, "Added claimed identifier to history");
        Ok(())
    }
}

#[async_trait]
impl PacingSource for MemoryStore {
    async fn pacing(&self) -> MonitorResult<Pacing> {
        Ok(self.state.read().await.pacing)
    }
}
