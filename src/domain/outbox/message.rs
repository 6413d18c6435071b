//! The outbox row and its lifecycle transitions.
//!
//! A row is written by the business transaction that caused the event and is
//! afterwards only touched by two operations: the claim (lock fields) and the
//! outcome write (success or failure fields). Rows are never deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackoffPolicy, OutboxEvent};
use crate::domain::foundation::{
    DomainError, ErrorCode, OutboxMessageId, Timestamp, ValidationError, WorkerId,
};

/// Maximum stored length of `last_error`, in characters.
pub const MAX_ERROR_LEN: usize = 4000;

/// Maximum length of `topic_key`, `message_type` and `key`.
pub const MAX_ROUTING_FIELD_LEN: usize = 200;

/// A validated row ready to be inserted alongside a business write.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxMessage {
    topic_key: String,
    message_type: String,
    key: String,
    payload: Value,
}

impl NewOutboxMessage {
    pub fn new(
        topic_key: impl Into<String>,
        message_type: impl Into<String>,
        key: impl Into<String>,
        payload: Value,
    ) -> Result<Self, ValidationError> {
        let topic_key = routing_field("topic_key", topic_key.into())?;
        let message_type = routing_field("message_type", message_type.into())?;
        let key = routing_field("key", key.into())?;

        Ok(Self {
            topic_key,
            message_type,
            key,
            payload,
        })
    }

    /// Serializes `event` and tags the row with its message type.
    pub fn for_event<E: OutboxEvent>(
        topic_key: impl Into<String>,
        key: impl Into<String>,
        event: &E,
    ) -> Result<Self, DomainError> {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(topic_key, E::MESSAGE_TYPE, key, payload)?)
    }

    pub fn topic_key(&self) -> &str {
        &self.topic_key
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Materializes the row as stored at `now`.
    pub fn into_message(self, id: OutboxMessageId, now: Timestamp) -> OutboxMessage {
        OutboxMessage {
            id,
            topic_key: self.topic_key,
            message_type: self.message_type,
            key: self.key,
            payload: self.payload,
            created_at: now,
            updated_at: now,
            processed_at: None,
            locked_until: None,
            locked_by: None,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }
}

fn routing_field(name: &str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(name));
    }
    let len = value.chars().count();
    if len > MAX_ROUTING_FIELD_LEN {
        return Err(ValidationError::too_long(name, MAX_ROUTING_FIELD_LEN, len));
    }
    Ok(value)
}

/// A durable record of an event pending delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: OutboxMessageId,

    /// Logical destination name.
    pub topic_key: String,

    /// Event kind; one publisher instance serves exactly one.
    pub message_type: String,

    /// Partition/routing key at the destination.
    pub key: String,

    /// Serialized event body.
    pub payload: Value,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Set once the message was delivered. Retired rows are never claimed.
    pub processed_at: Option<Timestamp>,

    /// Exclusive ownership horizon.
    pub locked_until: Option<Timestamp>,

    /// Worker holding (or last holding) the claim.
    pub locked_by: Option<String>,

    /// Failed delivery attempts so far.
    pub attempt_count: u32,

    pub last_attempt_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl OutboxMessage {
    /// Returns true once the message has been delivered.
    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Unprocessed, and either never locked or the lock has lapsed.
    pub fn is_claimable(&self, now: &Timestamp) -> bool {
        if self.is_processed() {
            return false;
        }
        match &self.locked_until {
            None => true,
            Some(until) => until.is_before(now),
        }
    }

    /// Takes exclusive ownership until `locked_until`.
    pub fn claim(&mut self, worker: &WorkerId, now: Timestamp, locked_until: Timestamp) {
        self.locked_until = Some(locked_until);
        self.locked_by = Some(worker.as_str().to_string());
        self.updated_at = now;
    }

    /// Retires the row after a successful send.
    pub fn mark_published(&mut self, now: Timestamp) {
        self.processed_at = Some(now);
        self.last_error = None;
        self.updated_at = now;
    }

    /// Records a failed attempt and pushes the lock out by the backoff delay.
    pub fn record_failure(&mut self, now: Timestamp, error: &str, backoff: &BackoffPolicy) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempt_at = Some(now);
        self.last_error = Some(truncate_error(error));
        self.locked_until = Some(now.plus(backoff.delay_for(self.attempt_count)));
        self.updated_at = now;
    }

    /// Deserializes the payload into the event type this row carries.
    pub fn decode<E: OutboxEvent>(&self) -> Result<E, DomainError> {
        if self.message_type != E::MESSAGE_TYPE {
            return Err(DomainError::new(
                ErrorCode::InvalidFormat,
                format!(
                    "Message type mismatch: row is '{}', expected '{}'",
                    self.message_type,
                    E::MESSAGE_TYPE
                ),
            ));
        }
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to deserialize {} payload: {}", E::MESSAGE_TYPE, e),
            )
        })
    }
}

/// Bounds an error description to [`MAX_ERROR_LEN`] characters.
///
/// Never returns an empty string.
pub fn truncate_error(error: &str) -> String {
    if error.trim().is_empty() {
        return "unknown error".to_string();
    }
    match error.char_indices().nth(MAX_ERROR_LEN) {
        Some((byte_idx, _)) => error[..byte_idx].to_string(),
        None => error.to_string(),
    }
}
