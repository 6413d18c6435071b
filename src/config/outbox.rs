//! Outbox publisher configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::outbox::OutboxPublisherConfig;
use crate::domain::foundation::WorkerId;
use crate::domain::outbox::BackoffPolicy;

const MAX_BATCH_SIZE: u32 = 1000;

/// Outbox publisher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// Maximum rows claimed per iteration
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Claim lock duration in seconds
    #[serde(default = "default_lock_duration")]
    pub lock_duration_secs: u64,

    /// Pause after an empty claim, in milliseconds
    #[serde(default = "default_idle_delay")]
    pub idle_delay_ms: u64,

    /// Pause after a failed iteration, in milliseconds
    #[serde(default = "default_error_delay")]
    pub error_delay_ms: u64,

    /// Backoff step per failed attempt, in seconds
    #[serde(default = "default_base_backoff")]
    pub base_backoff_secs: u64,

    /// Backoff cap, in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Upper bound on a single send, in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Fixed worker identity; generated from the host name when absent
    pub worker_id: Option<String>,
}

impl OutboxConfig {
    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.lock_duration_secs)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.base_backoff_secs),
            Duration::from_secs(self.max_backoff_secs),
        )
    }

    /// Publisher settings derived from this section
    pub fn publisher_config(&self) -> OutboxPublisherConfig {
        OutboxPublisherConfig::default()
            .with_batch_size(self.batch_size)
            .with_lock_duration(self.lock_duration())
            .with_idle_delay(self.idle_delay())
            .with_error_delay(self.error_delay())
            .with_send_timeout(self.send_timeout())
            .with_backoff(self.backoff())
    }

    /// Configured worker id, or a generated `{host}:{uuid}` one
    pub fn worker_id(&self) -> Result<WorkerId, ValidationError> {
        match &self.worker_id {
            Some(id) => WorkerId::new(id.clone())
                .map_err(|e| ValidationError::InvalidWorkerId(e.to_string())),
            None => Ok(WorkerId::generate()),
        }
    }

    /// Validate outbox configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.lock_duration_secs == 0 {
            return Err(ValidationError::InvalidLockDuration);
        }
        if self.send_timeout_secs == 0 || self.send_timeout_secs >= self.lock_duration_secs {
            return Err(ValidationError::InvalidSendTimeout);
        }
        if self.base_backoff_secs == 0 || self.base_backoff_secs > self.max_backoff_secs {
            return Err(ValidationError::InvalidBackoff);
        }
        self.worker_id()?;
        Ok(())
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            lock_duration_secs: default_lock_duration(),
            idle_delay_ms: default_idle_delay(),
            error_delay_ms: default_error_delay(),
            base_backoff_secs: default_base_backoff(),
            max_backoff_secs: default_max_backoff(),
            send_timeout_secs: default_send_timeout(),
            worker_id: None,
        }
    }
}

fn default_batch_size() -> u32 {
    50
}

fn default_lock_duration() -> u64 {
    30
}

fn default_idle_delay() -> u64 {
    300
}

fn default_error_delay() -> u64 {
    2000
}

fn default_base_backoff() -> u64 {
    2
}

fn default_max_backoff() -> u64 {
    60
}

fn default_send_timeout() -> u64 {
    10
}
