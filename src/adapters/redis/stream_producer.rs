//! Redis Streams implementation of MessageProducer.
//!
//! Every topic key maps to one stream, `{prefix}{topic_key}`. Entries carry
//! three fields:
//!
//! | Field | Content |
//! |-------|---------|
//! | `key` | Partition/routing key of the message |
//! | `type` | `OutboxEvent::MESSAGE_TYPE` |
//! | `payload` | JSON body |
//!
//! Streams are trimmed approximately (`MAXLEN ~`) on every append.

use std::marker::PhantomData;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::outbox::OutboxEvent;
use crate::ports::MessageProducer;

/// Appends outbox messages to Redis streams.
pub struct RedisStreamProducer<M> {
    conn: MultiplexedConnection,
    stream_prefix: String,
    max_len: usize,
    _message: PhantomData<fn(&M)>,
}

// Derived Clone would bound `M: Clone`.
impl<M> Clone for RedisStreamProducer<M> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            stream_prefix: self.stream_prefix.clone(),
            max_len: self.max_len,
            _message: PhantomData,
        }
    }
}

impl<M> RedisStreamProducer<M> {
    /// Create a new producer on an established connection.
    pub fn new(conn: MultiplexedConnection, stream_prefix: impl Into<String>, max_len: usize) -> Self {
        Self {
            conn,
            stream_prefix: stream_prefix.into(),
            max_len,
            _message: PhantomData,
        }
    }

    /// Stream a topic key resolves to.
    pub fn stream_name(&self, topic_key: &str) -> String {
        stream_name(&self.stream_prefix, topic_key)
    }
}

#[async_trait]
impl<M: OutboxEvent> MessageProducer<M> for RedisStreamProducer<M> {
    async fn produce(&self, topic_key: &str, key: &str, message: &M) -> Result<(), DomainError> {
        let payload = serde_json::to_string(message)?;
        let stream = self.stream_name(topic_key);

        let mut conn = self.conn.clone();
        let entry_id: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("type")
            .arg(M::MESSAGE_TYPE)
            .arg("payload")
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::BrokerError,
                    format!("Failed to append to stream {}: {}", stream, e),
                )
            })?;

        tracing::trace!(stream = %stream, entry_id = %entry_id, key, "Message appended");
        Ok(())
    }
}

fn stream_name(prefix: &str, topic_key: &str) -> String {
    format!("{}{}", prefix, topic_key)
}
