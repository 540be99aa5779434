//! Test utilities for tally-core
//!
//! Provides a mock document-AI vendor server for development and integration
//! tests against the remote engine adapter.

use axum::{extract::Json, http::StatusCode, routing::post, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::sync::oneshot;

/// Mock vendor server for testing the remote parse engine
pub struct MockVendorServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockVendorServer {
    /// Start the mock server on an available port, answering with a fixed
    /// well-formed receipt
    pub async fn start() -> Self {
        Self::start_with(Router::new().route("/v1/parse", post(handle_parse))).await
    }

    /// Start a mock server whose parse endpoint always fails
    pub async fn start_failing() -> Self {
        Self::start_with(Router::new().route("/v1/parse", post(handle_failure))).await
    }

    async fn start_with(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockVendorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct ParseRequest {
    image: String,
}

/// Vendor parse endpoint, fixed receipt
async fn handle_parse(Json(request): Json<ParseRequest>) -> Json<Value> {
    // An empty image still gets a response; content is ignored by the mock
    let _ = request.image;
    Json(json!({
        "line_items": [
            {"description": "MASALA DOSA", "quantity": 2, "unit_price": 90.00},
            {"description": "FILTER COFFEE", "quantity": 3, "unit_price": 40.00}
        ],
        "tax": 15.00,
        "total": 300.00
    }))
}

async fn handle_failure() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream OCR unavailable")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ParseEngine, RemoteEngine};

    #[tokio::test]
    async fn test_mock_server_parse() {
        let server = MockVendorServer::start().await;
        let engine = RemoteEngine::new("vendor-a", &server.url(), None);

        let result = engine.parse(b"fake image data", &|_| {}).await.unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].description, "MASALA DOSA");
        assert_eq!(result.net_total, Some(300.0));
        assert_eq!(result.charges[0].label, "Tax");
    }

    #[tokio::test]
    async fn test_mock_server_failure_is_engine_error() {
        let server = MockVendorServer::start_failing().await;
        let engine = RemoteEngine::new("vendor-a", &server.url(), None);

        let err = engine.parse(b"fake image data", &|_| {}).await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
