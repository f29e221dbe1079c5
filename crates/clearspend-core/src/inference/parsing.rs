//! Response parsing for the external inference endpoints
//!
//! The NLP and transcription endpoints return an intent tag plus an entity
//! bag; the receipt endpoint returns a success flag plus extracted fields.
//! Everything normalizes into [`InferenceResult`].

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::types::{ExtractedExpense, InferenceResult, Intent};

/// Wire shape of the NLP / transcription endpoints
#[derive(Debug, Deserialize)]
pub struct NlpResponse {
    pub intent: Option<String>,
    #[serde(default)]
    pub entities: NlpEntities,
    /// Present on transcription responses only
    pub transcript: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NlpEntities {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Wire shape of the receipt extraction endpoint
#[derive(Debug, Deserialize)]
pub struct ReceiptResponse {
    #[serde(default)]
    pub success: bool,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub message: Option<String>,
}

/// Normalize an NLP-shaped response.
///
/// A response without the intent field is malformed; an unrecognized intent
/// tag is merely `unknown`. Negative amounts are discarded as unusable.
pub fn nlp_to_result(response: NlpResponse) -> Result<InferenceResult> {
    let intent_tag = response
        .intent
        .ok_or_else(|| Error::MalformedResponse("response is missing the intent field".into()))?;
    let intent = Intent::parse_lenient(&intent_tag);

    let amount = response.entities.amount.filter(|a| a.is_finite() && *a >= 0.0);
    if let Some(amount) = amount {
        return Ok(InferenceResult::ExpenseExtracted(ExtractedExpense {
            amount,
            category: response.entities.category,
            description: response.entities.description,
        }));
    }

    // Informational intents take precedence over surfacing a transcript
    if matches!(intent, Intent::GetReport | Intent::SetLimit | Intent::Greeting) {
        return Ok(InferenceResult::NoExpenseFound { intent });
    }

    if let Some(transcript) = response.transcript.filter(|t| !t.trim().is_empty()) {
        return Ok(InferenceResult::TranscriptOnly { transcript });
    }

    Ok(InferenceResult::NoExpenseFound { intent })
}

/// Normalize a receipt extraction response.
///
/// An unsuccessful extraction means the media was expense-shaped but
/// unusable, so it maps to `NoExpenseFound` with an add-expense intent and
/// the provider's message is only logged.
pub fn receipt_to_result(response: ReceiptResponse) -> InferenceResult {
    let amount = response.amount.filter(|a| a.is_finite() && *a >= 0.0);
    match (response.success, amount) {
        (true, Some(amount)) => InferenceResult::ExpenseExtracted(ExtractedExpense {
            amount,
            category: response.category,
            description: response.description,
        }),
        _ => {
            if let Some(message) = response.message {
                debug!(message = %message, "Receipt extraction declined");
            }
            InferenceResult::NoExpenseFound {
                intent: Intent::AddExpense,
            }
        }
    }
}

/// Local fallback extraction for text messages when no NLP endpoint is
/// configured. Matches phrasings like "Paid $15.50 for lunch".
pub fn parse_expense_fallback(text: &str) -> Option<ExtractedExpense> {
    let pattern =
        Regex::new(r"(?i)(?:paid|spent|cost|total)\s*[$₹€£]?\s*(\d+(?:\.\d{1,2})?)\s+(?:for|on)\s+(.+)")
            .ok()?;
    let captures = pattern.captures(text)?;

    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let description = captures.get(2)?.as_str().trim().trim_end_matches('.').to_string();

    Some(ExtractedExpense {
        amount,
        category: None,
        description: Some(description),
    })
}
