//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid health probe address: {0}")]
    InvalidHealthAddress(String),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Redis stream max length must be greater than zero")]
    InvalidStreamMaxLen,

    #[error("Outbox batch size must be between 1 and 1000")]
    InvalidBatchSize,

    #[error("Outbox lock duration must be greater than zero")]
    InvalidLockDuration,

    #[error("Outbox send timeout must be greater than zero and shorter than the lock duration")]
    InvalidSendTimeout,

    #[error("Outbox base backoff must be greater than zero and not exceed the max backoff")]
    InvalidBackoff,

    #[error("Invalid worker id: {0}")]
    InvalidWorkerId(String),
}
