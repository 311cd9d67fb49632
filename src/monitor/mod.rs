//! Identifier availability monitoring
//!
//! This module watches a set of scarce identifiers through a pool of
//! workers and claims each one the moment it becomes free.
//!
//! # Overview
//!
//! Probing the availability oracle is rate limited per worker, so probes
//! are spread across workers and paced. A single cooperative loop drives
//! every probe; found identifiers leave the loop through a bounded
//! channel and are claimed on a separate task, so slow claims never stall
//! probe pacing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MonitorController                        │
//! │        start / stop / status, one loop at a time             │
//! └───────────────────────────┬──────────────────────────────────┘
//!                             │ spawns
//!                      ┌──────▼──────┐      ┌─────────────┐
//!                      │   Round     │─────▶│ Partitioner │  once per epoch
//!                      │  Scheduler  │      └─────────────┘
//!                      └──┬───────┬──┘
//!                 per turn│       │found
//!                  ┌──────▼──┐  ┌─▼───────────┐     ┌─────────────────┐
//!                  │ Prober  │  │ ChannelSink │────▶│ ClaimProcessor  │
//!                  └─────────┘  └─────────────┘     │ ClaimDispatcher │
//!                                                   └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`collaborators`] - Worker, session, store and pacing seams
//! - [`prober`] - One availability check, fail-closed
//! - [`partition`] - Splitting identifiers across workers
//! - [`round`] - The epoch and turn loop
//! - [`claim`] - Claiming across workers, first success wins
//! - [`events`] - Found events and the claim processing task
//! - [`controller`] - Lifecycle and status
//! - [`signal`] - Stop requests and cancellable sleeps
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```ignore
//! use sniper::monitor::{found_channel, ClaimProcessor, MonitorController, StaticSessions};
//! use sniper::storage::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let sessions = Arc::new(StaticSessions::new(workers));
//!
//! let (sink, rx) = found_channel(64);
//! let processor = ClaimProcessor::new(sessions.clone(), store.clone()).spawn(rx);
//!
//! let controller = MonitorController::new(store.clone(), store);
//! controller.start_if_ready(sessions, Arc::new(sink)).await?;
//! ```

pub mod claim;
pub mod collaborators;
pub mod controller;
pub mod error;
pub mod events;
pub mod partition;
pub mod prober;
pub mod round;
pub mod signal;

pub use claim::{ClaimAttempt, ClaimDispatcher, ClaimReport};
pub use collaborators::{
    ClaimReceipt, Pacing, PacingSource, RecordStore, SessionProvider, StaticSessions, Worker,
    WorkerHandle,
};
pub use controller::{MonitorController, MonitorState, StatusReport};
pub use error::{ClaimError, LookupError, MonitorError, MonitorResult};
pub use events::{
    found_channel, ChannelSink, ClaimProcessor, FoundEvent, FoundReceiver, FoundSink, LogNotifier,
    Notifier, ProcessorStats,
};
pub use partition::{partition, Assignment, PartitionMode, WorkerRole};
pub use prober::{ErrorClassifier, PatternClassifier, ProbeResult, Prober};
pub use round::{Cursor, MonitorStats, RoundScheduler, DEFAULT_IDLE_BACKOFF};
pub use signal::{stop_channel, StopHandle, StopSignal};
