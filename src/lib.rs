//! Auth Outbox - Transactional outbox publisher for the authentication service
//!
//! Events written next to business data in the `outbox_messages` table are
//! claimed in batches, delivered to the message broker and marked processed.
//! Failed deliveries are retried on a linear backoff; crashed workers are
//! recovered through lock expiry.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
