//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `outbox` - Outbox row lifecycle, retry policy and event payloads

pub mod foundation;
pub mod outbox;
