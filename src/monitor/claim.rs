//! Claim dispatcher
//!
//! Tries the claim action across workers in the order given, stopping at
//! the first success. Each worker is tried at most once per dispatch.

use serde::Serialize;
use std::fmt;

use super::collaborators::WorkerHandle;
use super::error::ClaimError;
use crate::metrics;
use crate::models::{Identifier, WorkerId};

/// One worker's attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimAttempt {
    /// Worker that attempted the claim
    pub worker: WorkerId,

    /// Failure reason, `None` on success
    pub error: Option<String>,
}

impl ClaimAttempt {
    fn succeeded(worker: WorkerId) -> Self {
        Self {
            worker,
            error: None,
        }
    }

    fn failed(worker: WorkerId, error: &ClaimError) -> Self {
        Self {
            worker,
            error: Some(error.to_string()),
        }
    }

    /// Whether this attempt succeeded
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a whole dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReport {
    /// Identifier that was claimed (or not)
    pub identifier: Identifier,

    /// Whether any worker succeeded
    pub success: bool,

    /// Human-readable summary
    pub detail: String,

    /// Locator of the claimed identifier on success
    pub locator: Option<String>,

    /// Worker credited with the claim
    pub worker: Option<WorkerId>,

    /// Every attempt in order
    pub attempts: Vec<ClaimAttempt>,
}

impl fmt::Display for ClaimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "CLAIMED" } else { "FAILED" };
        write!(f, "[{status}] {}: {}", self.identifier.mention(), self.detail)?;
        if let Some(locator) = &self.locator {
            write!(f, " ({locator})")?;
        }
        Ok(())
    }
}

/// Runs the claim action across a worker pool
#[derive(Debug, Clone, Default)]
pub struct ClaimDispatcher;

impl ClaimDispatcher {
    /// Create a dispatcher
    pub fn new() -> Self {
        Self
    }

    /// Claim `identifier` with the first worker that succeeds
    pub async fn claim(&self, identifier: &Identifier, workers: &[WorkerHandle]) -> ClaimReport {
        let _timer = metrics::start_claim_timer();
        let mut attempts = Vec::with_capacity(workers.len());

        for worker in workers {
            let worker_id = worker.id().clone();

            match worker.claim(identifier).await {
                Ok(receipt) => {
                    tracing::info!(
                        identifier = %identifier,
                        worker = %worker_id,
                        locator = %receipt.locator,
                        "Identifier claimed"
                    );
                    metrics::record_claim_attempt("success");
                    metrics::record_claim(true);
                    attempts.push(ClaimAttempt::succeeded(worker_id.clone()));

                    return ClaimReport {
                        identifier: identifier.clone(),
                        success: true,
                        detail: format!("Claimed {} using {worker_id}", identifier.mention()),
                        locator: Some(receipt.locator),
                        worker: Some(worker_id),
                        attempts,
                    };
                }
                Err(err) => {
                    let label = match &err {
                        ClaimError::AlreadyTaken => "taken",
                        ClaimError::RateLimited { .. } => "rate_limited",
                        ClaimError::Failed(_) => "failed",
                    };
                    tracing::warn!(
                        identifier = %identifier,
                        worker = %worker_id,
                        error = %err,
                        "Claim attempt failed, trying next worker"
                    );
                    metrics::record_claim_attempt(label);
                    attempts.push(ClaimAttempt::failed(worker_id, &err));
                }
            }
        }

        metrics::record_claim(false);

        let detail = if workers.is_empty() {
            "No workers available to claim".to_string()
        } else {
            format!(
                "Unable to claim {} with any of the {} available workers",
                identifier.mention(),
                workers.len()
            )
        };
        tracing::error!(identifier = %identifier, attempts = attempts.len(), "{detail}");

        ClaimReport {
            identifier: identifier.clone(),
            success: false,
            detail,
            locator: None,
            worker: None,
            attempts,
        }
    }
}
