//! Availability prober
//!
//! Wraps one oracle lookup for a (worker, identifier) pair and folds the
//! oracle's heterogeneous signals into a [`ProbeResult`]. The policy is
//! fail-closed: only an explicit "not occupied" signal, or an error whose
//! text matches a known "does not exist" pattern, yields `Available`.

use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::collaborators::Worker;
use super::error::LookupError;
use super::signal::StopSignal;
use crate::metrics;
use crate::models::Identifier;

// ============================================================================
// Probe Result
// ============================================================================

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// No entity holds the identifier
    Available,
    /// Identifier is held, or the answer was inconclusive
    Taken,
    /// Oracle asked for a pause of this many seconds; inconclusive
    RateLimited(u64),
}

impl ProbeResult {
    /// Whether the identifier may be claimed
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Taken => "taken",
            Self::RateLimited(_) => "rate_limited",
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited(secs) => write!(f, "rate_limited({secs}s)"),
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// Error Classification
// ============================================================================

/// Decides whether an ambiguous oracle error means the identifier is free
pub trait ErrorClassifier: Send + Sync {
    /// `true` only when the error unambiguously signals non-existence
    fn indicates_available(&self, error: &LookupError) -> bool;
}

/// Pattern-based classifier
///
/// Only [`LookupError::InvalidValue`] and [`LookupError::Other`] are
/// inspected; each has its own pattern.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    invalid_value: Regex,
    other: Regex,
}

impl PatternClassifier {
    /// Build a classifier from two regular expressions
    pub fn new(invalid_value: &str, other: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            invalid_value: Regex::new(invalid_value)?,
            other: Regex::new(other)?,
        })
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self {
            invalid_value: Regex::new(r"(?s)No user has.*as username")
                .expect("Invalid regex pattern"),
            other: Regex::new(r"(?i)no user|not found|does not exist")
                .expect("Invalid regex pattern"),
        }
    }
}

impl ErrorClassifier for PatternClassifier {
    fn indicates_available(&self, error: &LookupError) -> bool {
        match error {
            LookupError::InvalidValue(msg) => self.invalid_value.is_match(msg),
            LookupError::Other(msg) => self.other.is_match(msg),
            LookupError::NotOccupied | LookupError::RateLimited { .. } => false,
        }
    }
}

// ============================================================================
// Prober
// ============================================================================

/// Probes identifiers through a worker's oracle
#[derive(Clone)]
pub struct Prober {
    classifier: Arc<dyn ErrorClassifier>,
}

impl Prober {
    /// Create a prober with the default pattern classifier
    pub fn new() -> Self {
        Self::with_classifier(Arc::new(PatternClassifier::default()))
    }

    /// Create a prober with a custom classifier
    pub fn with_classifier(classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self { classifier }
    }

    /// Probe one identifier
    ///
    /// On a rate-limit signal this sleeps for the requested time (or until
    /// stopped) before returning. Never returns an error.
    pub async fn probe(
        &self,
        worker: &dyn Worker,
        identifier: &Identifier,
        stop: &mut StopSignal,
    ) -> ProbeResult {
        let result = match worker.lookup(identifier).await {
            Ok(()) => ProbeResult::Taken,
            Err(LookupError::NotOccupied) => ProbeResult::Available,
            Err(LookupError::RateLimited { seconds }) => {
                tracing::warn!(
                    worker = %worker.id(),
                    identifier = %identifier,
                    seconds,
                    "Rate limited, pausing worker"
                );
                stop.sleep(Duration::from_secs(seconds)).await;
                ProbeResult::RateLimited(seconds)
            }
            Err(err) => {
                if self.classifier.indicates_available(&err) {
                    tracing::info!(
                        identifier = %identifier,
                        error = %err,
                        "Identifier {} appears to be available",
                        identifier.mention()
                    );
                    ProbeResult::Available
                } else {
                    tracing::error!(
                        worker = %worker.id(),
                        identifier = %identifier,
                        error = %err,
                        "Error checking identifier"
                    );
                    ProbeResult::Taken
                }
            }
        };

        metrics::record_probe(result.label());
        result
    }
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Prober {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prober").finish_non_exhaustive()
    }
}
