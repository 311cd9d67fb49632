//! Core data types shared by the monitor and its collaborators
//!
//! - [`Identifier`] - normalized token being watched for availability
//! - [`WorkerId`] - stable label of a worker session
//! - [`HistoryEntry`] - record of a successful claim

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::monitor::error::MonitorError;

// ============================================================================
// Identifier
// ============================================================================

/// A monitored identifier
///
/// Identifiers are normalized on construction: surrounding whitespace is
/// trimmed, leading `@` characters are stripped, and the result is lowercased.
/// After normalization they are opaque, comparable and sortable keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create a normalized identifier
    pub fn new(raw: impl AsRef<str>) -> Result<Self, MonitorError> {
        let trimmed = raw.as_ref().trim();
        let stripped = trimmed.trim_start_matches('@');
        let normalized = stripped.trim().to_lowercase();

        if normalized.is_empty() {
            return Err(MonitorError::InvalidIdentifier {
                raw: raw.as_ref().to_string(),
            });
        }

        Ok(Self(normalized))
    }

    /// Get the normalized form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as `@name`
    pub fn mention(&self) -> String {
        format!("@{}", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = MonitorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Worker Id
// ============================================================================

/// Stable label of a worker session (e.g. the account it is logged in as)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a worker id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get id as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Claim History
// ============================================================================

/// A successful claim, appended to the record store's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Identifier that was claimed
    pub identifier: Identifier,

    /// Where the claimed identifier now lives (e.g. a public link)
    pub locator: String,

    /// Worker that performed the claim
    pub worker: WorkerId,

    /// When the claim was recorded
    pub claimed_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Create an entry stamped with the current time
    pub fn new(identifier: Identifier, locator: impl Into<String>, worker: WorkerId) -> Self {
        Self {
            identifier,
            locator: locator.into(),
            worker,
            claimed_at: Utc::now(),
        }
    }
}
