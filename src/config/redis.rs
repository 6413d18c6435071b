//! Redis configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Prepended to a topic key to form the stream name
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,

    /// Approximate upper bound on entries kept per stream
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.stream_max_len == 0 {
            return Err(ValidationError::InvalidStreamMaxLen);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout(),
            stream_prefix: default_stream_prefix(),
            stream_max_len: default_stream_max_len(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_stream_prefix() -> String {
    "auth.".to_string()
}

fn default_stream_max_len() -> usize {
    100_000
}
