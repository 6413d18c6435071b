//! Auth outbox publisher binary.
//!
//! Wires the PostgreSQL outbox store and the Redis stream producer into an
//! `OutboxPublisher` for `UserCreatedMessage`, serves health probes, and
//! drains on Ctrl+C / SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use auth_outbox::adapters::http::serve_health;
use auth_outbox::adapters::outbox::OutboxPublisher;
use auth_outbox::adapters::postgres::{run_migrations, PostgresOutboxStore};
use auth_outbox::adapters::redis::{connect, RedisStreamProducer};
use auth_outbox::config::{AppConfig, ConfigError, LogFormat, LoggingConfig, ValidationError};
use auth_outbox::domain::foundation::DomainError;
use auth_outbox::domain::outbox::UserCreatedMessage;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup failures. Anything after startup is handled by the publisher loop.
#[derive(Debug, Error)]
enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Broker connection failed: {0}")]
    Broker(#[from] DomainError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), BootstrapError> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;
    config.validate()?;

    info!(environment = ?config.environment, "Starting auth outbox publisher");

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;
    info!("Database pool initialized");

    if config.database.run_migrations {
        run_migrations(&pool).await?;
        info!("Database migrations applied");
    }

    let conn = connect(&config.redis.url, config.redis.timeout()).await?;
    let producer = RedisStreamProducer::<UserCreatedMessage>::new(
        conn,
        config.redis.stream_prefix.clone(),
        config.redis.stream_max_len,
    );
    info!(stream_prefix = %config.redis.stream_prefix, "Redis stream producer initialized");

    let publisher = OutboxPublisher::with_config(
        Arc::new(PostgresOutboxStore::new(pool.clone())),
        Arc::new(producer),
        config.outbox.publisher_config(),
    )
    .with_worker_id(config.outbox.worker_id()?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let publisher_handle = {
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { publisher.run(shutdown_rx).await })
    };

    let health_handle = if config.health.enabled {
        let addr = config.health.socket_addr()?;
        let shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = serve_health(addr, shutdown_rx).await {
                error!(error = %e, "Health probe server failed");
            }
        }))
    } else {
        None
    };

    shutdown_signal().await;
    info!("Shutdown signal received, draining...");
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        match publisher_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Outbox publisher exited with error"),
            Err(e) => error!(error = %e, "Outbox publisher task panicked"),
        }
        if let Some(handle) = health_handle {
            let _ = handle.await;
        }
    })
    .await;

    if drained.is_err() {
        warn!(timeout = ?DRAIN_TIMEOUT, "Drain timed out; unfinished claims will expire");
    }

    pool.close().await;
    info!("Auth outbox publisher shutdown complete");
    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> Result<(), BootstrapError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    result.map_err(|e| BootstrapError::Logging(e.to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
