//! External inference gateway
//!
//! A thin abstraction over the three external understanding capabilities:
//! text intent extraction, receipt image extraction, and audio transcription
//! + extraction. Each operation has its own endpoint and failure domain.
//!
//! # Architecture
//!
//! - `InferenceBackend` trait: the interface every backend implements
//! - `InferenceClient` enum: concrete wrapper providing Clone + compile-time
//!   dispatch, plus absorbing `infer_*` methods that degrade every failure
//!   into [`InferenceResult::Error`], so callers never see a hard error from
//!   inference
//! - Backend implementations: `HttpBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `CLEARSPEND_INFERENCE_BACKEND`: Backend to use (http, mock). Default: http
//! - `CLEARSPEND_NLP_URL`: text intent extraction endpoint
//! - `CLEARSPEND_RECEIPT_URL`: receipt image extraction endpoint
//! - `CLEARSPEND_AUDIO_URL`: audio transcription + extraction endpoint

mod http;
mod mock;
pub mod parsing;
pub mod types;

pub use http::HttpBackend;
pub use mock::MockBackend;
pub use types::{ExtractedExpense, InferenceResult, Intent};

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Error, Result};

use parsing::parse_expense_fallback;

/// Trait defining the interface for inference backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Extract intent and monetary entities from a text message
    async fn extract_from_text(&self, text: &str) -> Result<InferenceResult>;

    /// Extract an expense from a receipt image on disk
    async fn extract_from_image(&self, path: &Path) -> Result<InferenceResult>;

    /// Transcribe an audio file and extract an expense from the transcript
    async fn extract_from_audio(&self, path: &Path) -> Result<InferenceResult>;

    /// Check if the backend is usable
    async fn health_check(&self) -> bool;

    /// Describe the configured endpoints (for logging)
    fn describe(&self) -> String;
}

/// Concrete inference client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum InferenceClient {
    /// HTTP backend calling the external endpoints
    Http(HttpBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl InferenceClient {
    /// Create an inference client from environment variables
    ///
    /// Checks `CLEARSPEND_INFERENCE_BACKEND` to determine which backend to
    /// use; anything other than `mock` selects the HTTP backend.
    pub fn from_env() -> Self {
        let backend =
            std::env::var("CLEARSPEND_INFERENCE_BACKEND").unwrap_or_else(|_| "http".to_string());

        match backend.to_lowercase().as_str() {
            "mock" => InferenceClient::Mock(MockBackend::new()),
            "http" => InferenceClient::Http(HttpBackend::from_env()),
            other => {
                warn!(backend = %other, "Unknown CLEARSPEND_INFERENCE_BACKEND, falling back to http");
                InferenceClient::Http(HttpBackend::from_env())
            }
        }
    }

    /// Create a mock client for testing
    pub fn mock() -> Self {
        InferenceClient::Mock(MockBackend::new())
    }

    /// Text inference with failure absorption.
    ///
    /// An unconfigured NLP endpoint degrades to the local pattern fallback so
    /// the bot keeps functioning without the external service; every other
    /// failure degrades to [`InferenceResult::Error`].
    pub async fn infer_text(&self, text: &str) -> InferenceResult {
        match self.extract_from_text(text).await {
            Ok(result) => result,
            Err(Error::Config(reason)) => {
                warn!(reason = %reason, "NLP endpoint unconfigured, using local fallback parser");
                match parse_expense_fallback(text) {
                    Some(extracted) => InferenceResult::ExpenseExtracted(extracted),
                    None => InferenceResult::NoExpenseFound {
                        intent: Intent::Unknown,
                    },
                }
            }
            Err(e) => {
                warn!(error = %e, "Text inference failed");
                InferenceResult::Error {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Image inference with failure absorption
    pub async fn infer_image(&self, path: &Path) -> InferenceResult {
        match self.extract_from_image(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Image inference failed");
                InferenceResult::Error {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Audio inference with failure absorption
    pub async fn infer_audio(&self, path: &Path) -> InferenceResult {
        match self.extract_from_audio(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Audio inference failed");
                InferenceResult::Error {
                    reason: e.to_string(),
                }
            }
        }
    }
}

// Implement InferenceBackend for InferenceClient by delegating to the inner backend
#[async_trait]
impl InferenceBackend for InferenceClient {
    async fn extract_from_text(&self, text: &str) -> Result<InferenceResult> {
        match self {
            InferenceClient::Http(b) => b.extract_from_text(text).await,
            InferenceClient::Mock(b) => b.extract_from_text(text).await,
        }
    }

    async fn extract_from_image(&self, path: &Path) -> Result<InferenceResult> {
        match self {
            InferenceClient::Http(b) => b.extract_from_image(path).await,
            InferenceClient::Mock(b) => b.extract_from_image(path).await,
        }
    }

    async fn extract_from_audio(&self, path: &Path) -> Result<InferenceResult> {
        match self {
            InferenceClient::Http(b) => b.extract_from_audio(path).await,
            InferenceClient::Mock(b) => b.extract_from_audio(path).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            InferenceClient::Http(b) => b.health_check().await,
            InferenceClient::Mock(b) => b.health_check().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            InferenceClient::Http(b) => b.describe(),
            InferenceClient::Mock(b) => b.describe(),
        }
    }
}
