//! Error types for the monitor module

use thiserror::Error;

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Monitor-level errors
///
/// These come from collaborators (record store, session provider, found
/// sink) or from invalid input. None of them terminate a running scheduler;
/// the loop logs them and backs off.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// Identifier was empty after normalization
    #[error("Invalid identifier '{raw}'")]
    InvalidIdentifier { raw: String },

    /// Monitoring loop already running
    #[error("Monitoring is already running")]
    AlreadyRunning,

    /// Preconditions for starting are not met
    #[error("Monitoring not started: {reason}")]
    NotReady { reason: String },

    /// Record store operation failed
    #[error("Record store error during '{operation}': {reason}")]
    Store { operation: String, reason: String },

    /// Session provider failed to produce workers
    #[error("Session provider error: {reason}")]
    Sessions { reason: String },

    /// Found-identifier sink failed
    #[error("Found sink error: {reason}")]
    Sink { reason: String },

    /// Event channel closed by the consumer
    #[error("Found-event channel closed")]
    ChannelClosed,

    /// Invalid configuration value
    #[error("Invalid config '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl MonitorError {
    /// Create a record store error
    pub fn store(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a session provider error
    pub fn sessions(reason: impl Into<String>) -> Self {
        Self::Sessions {
            reason: reason.into(),
        }
    }

    /// Create a sink error
    pub fn sink(reason: impl Into<String>) -> Self {
        Self::Sink {
            reason: reason.into(),
        }
    }

    /// Create a not-ready error
    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is transient
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Store { .. } | Self::Sessions { .. } | Self::Sink { .. } | Self::NotReady { .. }
        )
    }
}

/// Signals returned by the availability oracle for a single lookup
///
/// `Ok(())` from a lookup means the identifier resolved to an existing
/// entity. Everything else arrives through this enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Oracle reports no entity holds the identifier
    #[error("Identifier is not occupied")]
    NotOccupied,

    /// Oracle asks the caller to wait before the next request
    #[error("Rate limited, retry after {seconds}s")]
    RateLimited { seconds: u64 },

    /// Oracle rejected the lookup value itself
    #[error("Invalid lookup value: {0}")]
    InvalidValue(String),

    /// Any other failure (transport, timeout, unexpected response)
    #[error("Lookup failed: {0}")]
    Other(String),
}

/// Failure of one claim attempt by one worker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    /// Identifier was taken between probe and claim
    #[error("Identifier was taken before the claim completed")]
    AlreadyTaken,

    /// Worker was rate limited while claiming
    #[error("Rate limited, wait {seconds}s")]
    RateLimited { seconds: u64 },

    /// Any other claim failure
    #[error("Claim failed: {0}")]
    Failed(String),
}
