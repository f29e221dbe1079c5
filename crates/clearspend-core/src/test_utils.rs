//! Test utilities for clearspend-core
//!
//! Provides a mock inference server speaking the same wire shapes as the
//! external NLP, receipt, and audio endpoints, for integration tests that
//! exercise the HTTP backend end to end.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::oneshot;

/// Canned responses the mock server hands out
#[derive(Clone)]
pub struct MockResponses {
    pub nlp: serde_json::Value,
    pub receipt: serde_json::Value,
    pub audio: serde_json::Value,
}

impl Default for MockResponses {
    fn default() -> Self {
        Self {
            nlp: serde_json::json!({
                "intent": "add_expense",
                "entities": { "amount": 15.50, "category": "Food/Dining Out", "description": "lunch" }
            }),
            receipt: serde_json::json!({
                "success": true,
                "amount": 42.00,
                "category": "Groceries",
                "description": "Weekly shop"
            }),
            audio: serde_json::json!({
                "intent": "add_expense",
                "entities": {},
                "transcript": "some spoken words"
            }),
        }
    }
}

/// Mock inference server for testing and development
pub struct MockInferenceServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockInferenceServer {
    /// Start the mock server on an available port with default responses
    pub async fn start() -> Self {
        Self::start_with(MockResponses::default()).await
    }

    /// Start the mock server with specific canned responses
    pub async fn start_with(responses: MockResponses) -> Self {
        let state = Arc::new(responses);
        let app = Router::new()
            .route("/nlp", post(handle_nlp))
            .route("/receipt", post(handle_receipt))
            .route("/audio", post(handle_audio))
            .with_state(state);

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

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn nlp_url(&self) -> String {
        format!("{}/nlp", self.url())
    }

    pub fn receipt_url(&self) -> String {
        format!("{}/receipt", self.url())
    }

    pub fn audio_url(&self) -> String {
        format!("{}/audio", self.url())
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockInferenceServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_nlp(State(state): State<Arc<MockResponses>>) -> Json<serde_json::Value> {
    Json(state.nlp.clone())
}

async fn handle_receipt(State(state): State<Arc<MockResponses>>) -> Json<serde_json::Value> {
    Json(state.receipt.clone())
}

async fn handle_audio(State(state): State<Arc<MockResponses>>) -> Json<serde_json::Value> {
    Json(state.audio.clone())
}
