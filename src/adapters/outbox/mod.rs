//! Outbox adapters - the publisher engine and an in-memory store.
//!
//! - `OutboxPublisher` - Claim / send / persist loop for one message type
//! - `InMemoryOutboxStore` - Mutex-guarded store for tests and local runs

mod in_memory_store;
mod publisher;

pub use in_memory_store::InMemoryOutboxStore;
pub use publisher::{BatchReport, OutboxPublisher, OutboxPublisherConfig};
