//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Unique identifier for an outbox message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboxMessageId(Uuid);

impl OutboxMessageId {
    /// Creates a new random OutboxMessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an OutboxMessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OutboxMessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OutboxMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OutboxMessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identity of a publisher worker, stamped into `locked_by` on claim.
///
/// Diagnostic only: two workers sharing an identity still cannot claim the
/// same row, because exclusivity comes from the claim itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Maximum length accepted by the `locked_by` column.
    pub const MAX_LEN: usize = 200;

    /// Creates a WorkerId from an explicit value.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("worker_id"));
        }
        let len = id.chars().count();
        if len > Self::MAX_LEN {
            return Err(ValidationError::too_long("worker_id", Self::MAX_LEN, len));
        }
        Ok(Self(id))
    }

    /// Generates `{host}:{random}` for this process.
    pub fn generate() -> Self {
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        let host: String = host.chars().take(Self::MAX_LEN - 33).collect();
        Self(format!("{}:{}", host, Uuid::new_v4().simple()))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
