//! Redis adapters - Message broker implementations.
//!
//! - `RedisStreamProducer` - Appends outbox messages to Redis streams

mod stream_producer;

pub use stream_producer::RedisStreamProducer;

use std::time::Duration;

use redis::aio::MultiplexedConnection;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Opens a multiplexed connection, failing after `timeout`.
pub async fn connect(url: &str, timeout: Duration) -> Result<MultiplexedConnection, DomainError> {
    let client = redis::Client::open(url).map_err(|e| {
        DomainError::new(ErrorCode::BrokerError, format!("Invalid Redis URL: {}", e))
    })?;

    match tokio::time::timeout(timeout, client.get_multiplexed_async_connection()).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(DomainError::new(
            ErrorCode::BrokerError,
            format!("Failed to connect to Redis: {}", e),
        )),
        Err(_) => Err(DomainError::new(
            ErrorCode::BrokerError,
            format!("Timed out connecting to Redis after {:?}", timeout),
        )),
    }
}
