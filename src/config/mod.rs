//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `AUTH_OUTBOX` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use auth_outbox::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Claiming {} rows per batch", config.outbox.batch_size);
//! ```

mod database;
mod error;
mod health;
mod logging;
mod outbox;
mod redis;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use health::HealthConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use outbox::OutboxConfig;
pub use redis::RedisConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration (PostgreSQL outbox table)
    pub database: DatabaseConfig,

    /// Redis configuration (stream broker)
    pub redis: RedisConfig,

    /// Publisher loop tuning
    #[serde(default)]
    pub outbox: OutboxConfig,

    /// Health probe listener
    #[serde(default)]
    pub health: HealthConfig,

    /// Log filter and format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Deployment environment
    #[serde(default)]
    pub environment: Environment,
}

/// Application environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `AUTH_OUTBOX` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `AUTH_OUTBOX__OUTBOX__BATCH_SIZE=100` -> `outbox.batch_size = 100`
    /// - `AUTH_OUTBOX__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("AUTH_OUTBOX")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid section.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.outbox.validate()?;
        self.health.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
