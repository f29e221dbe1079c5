//! ClearSpend Core Library
//!
//! Shared functionality for the ClearSpend expense tracker:
//! - Database access and migrations (users, expenses)
//! - Webhook signature verification
//! - External inference gateway (text, receipt image, audio endpoints)
//! - Provider media downloads with guaranteed temp-file cleanup
//! - The message dispatcher that turns inbound chat messages into
//!   persisted expenses and replies
//! - Outbound message sending (WhatsApp, Telegram)

pub mod db;
pub mod dispatch;
pub mod error;
pub mod inference;
pub mod media;
pub mod messenger;
pub mod models;
pub mod signature;

/// Test utilities including the mock inference server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use db::{strip_transport_prefix, Database, DEFAULT_USER_NAME};
pub use dispatch::MessageDispatcher;
pub use error::{Error, Result};
pub use inference::{
    ExtractedExpense, HttpBackend, InferenceBackend, InferenceClient, InferenceResult, Intent,
    MockBackend,
};
pub use media::MediaFetcher;
pub use messenger::{OutboundMessenger, TwilioCredentials};
pub use models::{
    Expense, ExpenseFilter, ExpenseUpdate, InboundMessage, MessageContent, MessageSource,
    NewExpense, SpendingStats, User, CATEGORIES, FALLBACK_CATEGORY,
};
pub use signature::{compute_signature, parse_form_body, verify_signature};
