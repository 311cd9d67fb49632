//! Partitioning identifiers across workers
//!
//! Two regimes:
//!
//! - **Surplus identifiers** (`ids >= workers`): round-robin over the sorted
//!   list, identifier `i` goes to worker `i % workers`.
//! - **Surplus workers** (`ids < workers`): the first `ids` workers are
//!   *primary* and each own one identifier; the remaining workers are
//!   *alternating* and receive the full sorted list.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Identifier;

// ============================================================================
// Partition Mode
// ============================================================================

/// Which regime an epoch runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    /// At least as many identifiers as workers
    SurplusIdentifiers,
    /// More workers than identifiers
    SurplusWorkers,
}

impl PartitionMode {
    /// Select the mode for a given set size
    pub fn for_counts(identifiers: usize, workers: usize) -> Self {
        if identifiers >= workers {
            Self::SurplusIdentifiers
        } else {
            Self::SurplusWorkers
        }
    }

    /// Get mode id as string
    pub fn id(&self) -> &'static str {
        match self {
            Self::SurplusIdentifiers => "surplus_identifiers",
            Self::SurplusWorkers => "surplus_workers",
        }
    }
}

impl fmt::Display for PartitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Partition Function
// ============================================================================

/// Split identifiers into `worker_count` assignment lists
///
/// The input is sorted and de-duplicated first, so arrival order never
/// changes the result.
pub fn partition(identifiers: &[Identifier], worker_count: usize) -> Vec<Vec<Identifier>> {
    if worker_count == 0 {
        return Vec::new();
    }

    let mut sorted = identifiers.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut chunks = vec![Vec::new(); worker_count];
    if sorted.is_empty() {
        return chunks;
    }

    match PartitionMode::for_counts(sorted.len(), worker_count) {
        PartitionMode::SurplusIdentifiers => {
            for (i, identifier) in sorted.into_iter().enumerate() {
                chunks[i % worker_count].push(identifier);
            }
        }
        PartitionMode::SurplusWorkers => {
            for (i, identifier) in sorted.iter().enumerate() {
                chunks[i].push(identifier.clone());
            }
            for chunk in chunks.iter_mut().skip(sorted.len()) {
                *chunk = sorted.clone();
            }
        }
    }

    chunks
}

// ============================================================================
// Assignment
// ============================================================================

/// Role of a worker within an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    /// Rechecks its whole shard every turn (surplus identifiers)
    Shard,
    /// Fixed to one identifier (surplus workers)
    Primary,
    /// Cycles through all identifiers, one per turn (surplus workers)
    Alternating,
}

/// Partition of one epoch plus the data needed to derive checklists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    identifiers: Vec<Identifier>,
    chunks: Vec<Vec<Identifier>>,
    mode: PartitionMode,
}

impl Assignment {
    /// Partition identifiers across `worker_count` workers
    pub fn new(identifiers: &[Identifier], worker_count: usize) -> Self {
        let mut sorted = identifiers.to_vec();
        sorted.sort();
        sorted.dedup();

        let chunks = partition(&sorted, worker_count);
        let mode = PartitionMode::for_counts(sorted.len(), worker_count);

        Self {
            identifiers: sorted,
            chunks,
            mode,
        }
    }

    /// Sorted unique identifiers of this epoch
    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Per-worker lists
    pub fn chunks(&self) -> &[Vec<Identifier>] {
        &self.chunks
    }

    /// Epoch regime
    pub fn mode(&self) -> PartitionMode {
        self.mode
    }

    /// Number of workers partitioned over
    pub fn worker_count(&self) -> usize {
        self.chunks.len()
    }

    /// Indices of workers with a non-empty list, ascending
    pub fn active_indices(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of primary workers in surplus-workers mode
    pub fn primary_count(&self) -> usize {
        match self.mode {
            PartitionMode::SurplusIdentifiers => 0,
            PartitionMode::SurplusWorkers => self.identifiers.len(),
        }
    }

    /// Number of alternating workers in surplus-workers mode
    pub fn alternating_count(&self) -> usize {
        match self.mode {
            PartitionMode::SurplusIdentifiers => 0,
            PartitionMode::SurplusWorkers => self.worker_count() - self.identifiers.len(),
        }
    }

    /// Role of the worker at `index`
    pub fn role(&self, index: usize) -> WorkerRole {
        match self.mode {
            PartitionMode::SurplusIdentifiers => WorkerRole::Shard,
            PartitionMode::SurplusWorkers if index < self.identifiers.len() => WorkerRole::Primary,
            PartitionMode::SurplusWorkers => WorkerRole::Alternating,
        }
    }

    /// Identifiers the worker at `index` checks during a turn in `round`
    pub fn checklist(&self, index: usize, round: u64) -> Vec<Identifier> {
        let Some(chunk) = self.chunks.get(index) else {
            return Vec::new();
        };

        match self.role(index) {
            WorkerRole::Shard => chunk.clone(),
            WorkerRole::Primary => chunk.first().cloned().into_iter().collect(),
            WorkerRole::Alternating => {
                if self.identifiers.is_empty() {
                    return Vec::new();
                }
                let pick = (round % self.identifiers.len() as u64) as usize;
                vec![self.identifiers[pick].clone()]
            }
        }
    }

    /// Number of distinct identifiers covered by all lists
    pub fn covered_count(&self) -> usize {
        let mut covered: Vec<&Identifier> = self.chunks.iter().flatten().collect();
        covered.sort();
        covered.dedup();
        covered.len()
    }

    /// Format the partition as one line per worker
    pub fn describe(&self, labels: &[String]) -> String {
        let mut output = String::new();
        for (i, chunk) in self.chunks.iter().enumerate() {
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("worker {}", i + 1));
            let names: Vec<&str> = chunk.iter().map(|id| id.as_str()).collect();
            output.push_str(&format!("  {label}: {} -> {:?}\n", chunk.len(), names));
        }
        output
    }
}
