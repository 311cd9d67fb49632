//! Unified error handling for the sniper crate
//!
//! This module provides a unified error type that consolidates the
//! domain-specific errors into a single `Error` enum, while maintaining the
//! ability to use domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`SniperErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use sniper::error::{Error, SniperErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Retrying: {}", err.user_message());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::monitor::error::{ClaimError, LookupError, MonitorError};

/// Common trait for all sniper error types
pub trait SniperErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;

    /// Message for operators, prefixed with the category
    fn user_message(&self) -> String {
        format!("{}: {}", self.category().description(), self)
    }
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Monitoring loop, workers and claims
    Monitor,
    /// Record store and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Parsing and serialization errors
    Parsing,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get description for the category
    pub fn description(&self) -> &'static str {
        match self {
            Self::Monitor => "Monitor error",
            Self::Storage => "Storage error",
            Self::Config => "Config error",
            Self::Parsing => "Parsing error",
            Self::Other => "Error",
        }
    }
}

impl SniperErrorTrait for MonitorError {
    fn is_recoverable(&self) -> bool {
        MonitorError::is_recoverable(self)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Store { .. } => ErrorCategory::Storage,
            Self::InvalidConfig { .. } => ErrorCategory::Config,
            Self::InvalidIdentifier { .. } => ErrorCategory::Parsing,
            _ => ErrorCategory::Monitor,
        }
    }
}

/// Unified error type for the sniper crate
#[derive(Error, Debug)]
pub enum Error {
    /// Monitoring errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SniperErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Monitor(e) => e.is_recoverable(),
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) | Self::Toml(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Monitor(e) => SniperErrorTrait::category(e),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) | Self::Toml(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
