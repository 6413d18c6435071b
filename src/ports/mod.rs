//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `OutboxStore` - Durable outbox table with atomic batch claims
//! - `MessageProducer` - Delivery of a single message to the broker

mod message_producer;
mod outbox_store;

pub use message_producer::MessageProducer;
pub use outbox_store::{ClaimRequest, OutboxStore};
