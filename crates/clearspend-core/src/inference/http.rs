//! HTTP backend for the external inference endpoints
//!
//! Each capability has its own endpoint and its own failure domain: text
//! intent extraction (JSON), receipt extraction (multipart image upload),
//! and audio transcription + extraction (multipart audio upload).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};

use super::parsing::{nlp_to_result, receipt_to_result, NlpResponse, ReceiptResponse};
use super::types::InferenceResult;
use super::InferenceBackend;

/// Request timeout for inference calls; receipts and audio can be slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client over the three external inference endpoints
///
/// Any endpoint may be left unconfigured; the matching operation then fails
/// with a configuration error instead of attempting a request.
#[derive(Clone)]
pub struct HttpBackend {
    http_client: Client,
    nlp_url: Option<String>,
    receipt_url: Option<String>,
    audio_url: Option<String>,
}

impl HttpBackend {
    pub fn new(
        nlp_url: Option<String>,
        receipt_url: Option<String>,
        audio_url: Option<String>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            nlp_url: nlp_url.map(|u| u.trim_end_matches('/').to_string()),
            receipt_url: receipt_url.map(|u| u.trim_end_matches('/').to_string()),
            audio_url: audio_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Create from environment variables
    ///
    /// - `CLEARSPEND_NLP_URL`: text intent extraction endpoint
    /// - `CLEARSPEND_RECEIPT_URL`: receipt image extraction endpoint
    /// - `CLEARSPEND_AUDIO_URL`: audio transcription + extraction endpoint
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("CLEARSPEND_NLP_URL").ok(),
            std::env::var("CLEARSPEND_RECEIPT_URL").ok(),
            std::env::var("CLEARSPEND_AUDIO_URL").ok(),
        )
    }

    fn file_part(path: &Path) -> Result<multipart::Part> {
        if !path.exists() {
            return Err(Error::SourceMissing(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(multipart::Part::bytes(bytes).file_name(file_name))
    }

    async fn upload(&self, url: &str, path: &Path) -> Result<reqwest::Response> {
        let form = multipart::Form::new().part("file", Self::file_part(path)?);
        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn extract_from_text(&self, text: &str) -> Result<InferenceResult> {
        let url = self
            .nlp_url
            .as_deref()
            .ok_or_else(|| Error::Config("NLP endpoint is not configured".into()))?;

        debug!(url = %url, "Calling NLP endpoint");
        let response = self
            .http_client
            .post(url)
            .json(&json!({ "message": text }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Gateway(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Gateway(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let parsed: NlpResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        nlp_to_result(parsed)
    }

    async fn extract_from_image(&self, path: &Path) -> Result<InferenceResult> {
        let url = self
            .receipt_url
            .clone()
            .ok_or_else(|| Error::Config("receipt extraction endpoint is not configured".into()))?;

        debug!(url = %url, path = %path.display(), "Uploading receipt image");
        let response = self.upload(&url, path).await?;
        let parsed: ReceiptResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        Ok(receipt_to_result(parsed))
    }

    async fn extract_from_audio(&self, path: &Path) -> Result<InferenceResult> {
        let url = self
            .audio_url
            .clone()
            .ok_or_else(|| Error::Config("audio extraction endpoint is not configured".into()))?;

        debug!(url = %url, path = %path.display(), "Uploading audio");
        let response = self.upload(&url, path).await?;
        let parsed: NlpResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        nlp_to_result(parsed)
    }

    async fn health_check(&self) -> bool {
        // The endpoints expose no health route; configured is as good as we know
        self.nlp_url.is_some() || self.receipt_url.is_some() || self.audio_url.is_some()
    }

    fn describe(&self) -> String {
        format!(
            "nlp={}, receipt={}, audio={}",
            self.nlp_url.as_deref().unwrap_or("unset"),
            self.receipt_url.as_deref().unwrap_or("unset"),
            self.audio_url.as_deref().unwrap_or("unset"),
        )
    }
}
