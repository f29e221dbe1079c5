//! Shared types for inference operations

use serde::{Deserialize, Serialize};

/// Conversational intent reported by the NLP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddExpense,
    GetReport,
    SetLimit,
    Greeting,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddExpense => "add_expense",
            Self::GetReport => "get_report",
            Self::SetLimit => "set_limit",
            Self::Greeting => "greeting",
            Self::Unknown => "unknown",
        }
    }

    /// Parse an intent tag, treating anything unrecognized as `Unknown`
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "add_expense" => Self::AddExpense,
            "get_report" => Self::GetReport,
            "set_limit" => Self::SetLimit,
            "greeting" => Self::Greeting,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Monetary entities extracted from a message
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedExpense {
    pub amount: f64,
    pub category: Option<String>,
    pub description: Option<String>,
}

/// Normalized outcome of any inference operation, regardless of which
/// external capability produced it
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResult {
    /// A usable monetary amount was found
    ExpenseExtracted(ExtractedExpense),
    /// The message was understood but carried no expense
    NoExpenseFound { intent: Intent },
    /// Audio was transcribed but no monetary entity was found; the transcript
    /// is surfaced so the user can verify what was heard
    TranscriptOnly { transcript: String },
    /// The operation failed; reason is logged, never shown to the user
    Error { reason: String },
}
