//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `outbox` - Publisher engine and in-memory store
//! - `postgres` - PostgreSQL outbox store
//! - `redis` - Redis Streams message producer
//! - `http` - Health probe endpoints

pub mod http;
pub mod outbox;
pub mod postgres;
pub mod redis;

pub use outbox::{BatchReport, InMemoryOutboxStore, OutboxPublisher, OutboxPublisherConfig};
