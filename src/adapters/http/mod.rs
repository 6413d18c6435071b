//! HTTP adapters - Operational endpoints.
//!
//! The publisher exposes no business API; only health probes are served.

mod health;

pub use health::{health_router, serve_health};
