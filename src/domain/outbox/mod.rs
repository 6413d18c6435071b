//! Outbox module - the pending-event row, its retry policy, and payload types.

mod backoff;
mod event;
mod message;

pub use backoff::BackoffPolicy;
pub use event::{OutboxEvent, UserCreatedMessage};
pub use message::{
    truncate_error, NewOutboxMessage, OutboxMessage, MAX_ERROR_LEN, MAX_ROUTING_FIELD_LEN,
};
