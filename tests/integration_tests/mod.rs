//! Integration tests module
//!
//! End-to-end tests of the monitor against simulated workers, run on a
//! paused clock so pacing is exact:
//! - Turn order, round counting and re-partitioning
//! - Found events through the claim processor
//! - Stop requests at every suspension point
//! - Failure handling in collaborators

pub mod error_scenarios;
pub mod monitor_test;
pub mod stop_test;
