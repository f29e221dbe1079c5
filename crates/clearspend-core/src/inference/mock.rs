//! Mock backend for testing
//!
//! Provides configurable responses for all inference operations. Useful for
//! unit tests and development without the external endpoints.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::parsing::parse_expense_fallback;
use super::types::{InferenceResult, Intent};
use super::InferenceBackend;

/// Mock inference backend
///
/// By default it emulates the NLP endpoint with keyword heuristics so
/// dispatcher tests read naturally; individual operations can be pinned to a
/// fixed result or forced to fail.
#[derive(Clone, Default)]
pub struct MockBackend {
    text_result: Option<InferenceResult>,
    image_result: Option<InferenceResult>,
    audio_result: Option<InferenceResult>,
    fail_all: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose every operation fails with a gateway error
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }

    /// Pin the text operation to a fixed result
    pub fn with_text(mut self, result: InferenceResult) -> Self {
        self.text_result = Some(result);
        self
    }

    /// Pin the image operation to a fixed result
    pub fn with_image(mut self, result: InferenceResult) -> Self {
        self.image_result = Some(result);
        self
    }

    /// Pin the audio operation to a fixed result
    pub fn with_audio(mut self, result: InferenceResult) -> Self {
        self.audio_result = Some(result);
        self
    }

    fn classify_text(text: &str) -> InferenceResult {
        if let Some(extracted) = parse_expense_fallback(text) {
            return InferenceResult::ExpenseExtracted(extracted);
        }

        let lowered = text.to_lowercase();
        let intent = if lowered.contains("hello") || lowered.contains("hi ") || lowered == "hi" {
            Intent::Greeting
        } else if lowered.contains("report") {
            Intent::GetReport
        } else if lowered.contains("limit") {
            Intent::SetLimit
        } else if lowered.contains("expense") || lowered.contains("add") {
            Intent::AddExpense
        } else {
            Intent::Unknown
        };
        InferenceResult::NoExpenseFound { intent }
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn extract_from_text(&self, text: &str) -> Result<InferenceResult> {
        if self.fail_all {
            return Err(Error::Gateway("mock failure".into()));
        }
        Ok(self
            .text_result
            .clone()
            .unwrap_or_else(|| Self::classify_text(text)))
    }

    async fn extract_from_image(&self, path: &Path) -> Result<InferenceResult> {
        if self.fail_all {
            return Err(Error::Gateway("mock failure".into()));
        }
        if !path.exists() {
            return Err(Error::SourceMissing(path.display().to_string()));
        }
        Ok(self.image_result.clone().unwrap_or(InferenceResult::NoExpenseFound {
            intent: Intent::AddExpense,
        }))
    }

    async fn extract_from_audio(&self, path: &Path) -> Result<InferenceResult> {
        if self.fail_all {
            return Err(Error::Gateway("mock failure".into()));
        }
        if !path.exists() {
            return Err(Error::SourceMissing(path.display().to_string()));
        }
        Ok(self.audio_result.clone().unwrap_or(InferenceResult::TranscriptOnly {
            transcript: "mock transcript".to_string(),
        }))
    }

    async fn health_check(&self) -> bool {
        !self.fail_all
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}
