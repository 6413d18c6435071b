//! Liveness and readiness endpoints.
//!
//! - `GET /health` - Process is up
//! - `GET /ready` - Process accepts work

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Router serving the probe endpoints.
pub fn health_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}

/// Serves the probe endpoints on `addr` until `shutdown` flips to true.
pub async fn serve_health(addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Health probe listening");

    axum::serve(listener, health_router())
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ready() -> Json<Value> {
    Json(json!({ "status": "READY" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn health_reports_up_and_version() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "UP");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn ready_reports_ready() {
        let Json(body) = ready().await;
        assert_eq!(body, json!({ "status": "READY" }));
    }

    #[tokio::test]
    async fn server_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handle = tokio::spawn(serve_health(addr, rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("health server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
