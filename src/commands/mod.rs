pub mod plan;
pub mod simulate;

// Re-export command functions for convenience
pub use plan::plan;
pub use simulate::{simulate, SimulateParams};
