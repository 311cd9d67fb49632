//! sniper - Identifier availability monitor
//!
//! Watches a set of scarce identifiers through a pool of rate-limited
//! workers and claims each identifier as soon as it becomes free.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`monitor`] - Prober, partitioner, round scheduler, claim dispatcher and controller
//! - [`models`] - Core data structures and types
//! - [`storage`] - In-memory record store
//! - [`sim`] - Simulated workers for dry runs and tests
//! - [`metrics`] - Prometheus metrics
//! - [`error`] - Unified error type
//!
//! # Example
//!
//! ```no_run
//! use sniper::monitor::{found_channel, ClaimProcessor, MonitorController, StaticSessions, WorkerHandle};
//! use sniper::sim::SimulatedWorker;
//! use sniper::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let workers: Vec<WorkerHandle> = vec![Arc::new(SimulatedWorker::new("w1"))];
//!     let sessions = Arc::new(StaticSessions::new(workers));
//!     let store = Arc::new(MemoryStore::new());
//!     store.add(&"target".parse()?).await?;
//!
//!     let (sink, rx) = found_channel(64);
//!     let _processor = ClaimProcessor::new(sessions.clone(), store.clone()).spawn(rx);
//!
//!     let controller = MonitorController::new(store.clone(), store);
//!     controller.start_if_ready(sessions, Arc::new(sink)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod sim;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, SniperErrorTrait};
    pub use crate::models::{HistoryEntry, Identifier, WorkerId};
    pub use crate::monitor::{
        found_channel, ClaimDispatcher, ClaimProcessor, MonitorController, Pacing, Prober,
        RoundScheduler, StaticSessions, Worker, WorkerHandle,
    };
    pub use crate::storage::MemoryStore;
}

// Direct re-exports for convenience
pub use models::{HistoryEntry, Identifier, WorkerId};
