//! Domain models for ClearSpend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed expense category set, shared with the NLP endpoint
pub const CATEGORIES: &[&str] = &[
    "Groceries",
    "Utilities",
    "Rent/Mortgage",
    "Transportation",
    "Food/Dining Out",
    "Entertainment",
    "Healthcare",
    "Personal Care",
    "Clothing",
    "Education",
    "Gifts/Donations",
    "Insurance",
    "Taxes",
    "Travel",
    "Subscriptions",
    "Other",
];

/// Category assigned when extraction yields no usable category
pub const FALLBACK_CATEGORY: &str = "Uncategorized";

/// Map an extracted category onto the fixed set (case-insensitive),
/// falling back to [`FALLBACK_CATEGORY`] for anything unrecognized.
pub fn normalize_category(raw: Option<&str>) -> String {
    match raw {
        Some(value) => {
            let trimmed = value.trim();
            CATEGORIES
                .iter()
                .find(|c| c.eq_ignore_ascii_case(trimmed))
                .map(|c| c.to_string())
                .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
        }
        None => FALLBACK_CATEGORY.to_string(),
    }
}

/// Check whether a category string is acceptable for a persisted expense
pub fn is_valid_category(category: &str) -> bool {
    category == FALLBACK_CATEGORY || CATEGORIES.iter().any(|c| *c == category)
}

/// A registered user, anchored by a normalized phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// E.164-like phone number with any transport prefix stripped
    pub phone_number: String,
    /// Linked Telegram chat id, if the user connected one
    pub telegram_id: Option<String>,
    pub name: Option<String>,
    pub monthly_limit: Option<f64>,
    /// External spreadsheet reference (set by export tooling, never by the pipeline)
    pub sheet_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl User {
    /// Display name used in conversational replies
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("there")
    }
}

/// Transport an expense originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    #[default]
    Whatsapp,
    Telegram,
    Web,
}

impl MessageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Web => "web",
        }
    }
}

impl std::str::FromStr for MessageSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whatsapp" => Ok(Self::Whatsapp),
            "telegram" => Ok(Self::Telegram),
            "web" => Ok(Self::Web),
            _ => Err(format!("Unknown message source: {}", s)),
        }
    }
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted expense, owned by exactly one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub source: MessageSource,
    /// Provider message id the expense was logged from, for audit correlation
    pub message_sid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting a new expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// Occurrence date; None means processing time
    pub date: Option<DateTime<Utc>>,
    pub source: MessageSource,
    pub message_sid: Option<String>,
}

/// Partial update for an existing expense (None fields are left unchanged)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseUpdate {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Filters for listing expenses
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Per-category spending total
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: i64,
}

/// Aggregated spending statistics for one user
#[derive(Debug, Clone, Serialize)]
pub struct SpendingStats {
    pub total: f64,
    pub count: i64,
    pub by_category: Vec<CategoryTotal>,
}

/// An inbound chat message after transport-level decoding. Never persisted.
#[derive(Debug, Clone)]
pub enum MessageContent {
    Text(String),
    Media { url: String, content_type: String },
}

/// Inbound message envelope handed to the dispatcher
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub content: MessageContent,
    pub source: MessageSource,
    /// Provider message id, used for logging and audit correlation
    pub message_sid: Option<String>,
}
