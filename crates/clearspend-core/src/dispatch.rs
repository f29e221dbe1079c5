//! Message dispatcher
//!
//! The orchestrator for inbound chat messages: routes content to the right
//! inference operation, decides whether to persist an expense, and produces
//! exactly one reply string per inbound message.
//!
//! Every message is processed statelessly; a clarification request is not
//! resumed by the next message. Any unexpected failure is caught at this
//! boundary and converted to a generic apology, because the transport expects
//! a well-formed reply on every inbound event.

use tracing::{error, info, warn};

use crate::db::Database;
use crate::error::Result;
use crate::inference::{ExtractedExpense, InferenceClient, InferenceResult, Intent};
use crate::media::MediaFetcher;
use crate::models::{
    normalize_category, InboundMessage, MessageContent, MessageSource, NewExpense, User,
};

const GENERIC_APOLOGY: &str =
    "Sorry, there was an error processing your request. Please try again later.";
const TEXT_ERROR_REPLY: &str = "Sorry, there was an error trying to understand your message.";
const MEDIA_ERROR_REPLY: &str = "Sorry, there was an error processing the media file.";
const CLARIFY_TEXT_REPLY: &str =
    "Okay, I see you want to add an expense, but I couldn't find the amount. Can you please include it?";
const CLARIFY_MEDIA_REPLY: &str =
    "I got your file, but couldn't find an expense amount in it. Can you send the amount as text?";
const UNKNOWN_REPLY: &str = "Sorry, I didn't understand that. You can tell me about expenses like 'Paid $10 for coffee' or ask for a 'report'.";
const REPORT_PLACEHOLDER_REPLY: &str = "Report generation is not implemented yet.";
const LIMIT_PLACEHOLDER_REPLY: &str = "Setting spending limits is not implemented yet.";
const EMPTY_MESSAGE_REPLY: &str = "Received empty message.";

/// Media kinds the pipeline can route to an inference operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Route by declared content-type prefix; the transport reports the type
    /// independently of the filename
    fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.starts_with("image/") {
            Some(Self::Image)
        } else if content_type.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// Orchestrates inference, persistence, and reply construction for one
/// inbound message at a time
#[derive(Clone)]
pub struct MessageDispatcher {
    db: Database,
    gateway: InferenceClient,
    media: MediaFetcher,
}

impl MessageDispatcher {
    pub fn new(db: Database, gateway: InferenceClient) -> Self {
        Self {
            db,
            gateway,
            media: MediaFetcher::new(),
        }
    }

    /// Process one inbound message and produce its reply.
    ///
    /// Never fails: exactly one reply string comes back for every message,
    /// apologetic if necessary.
    pub async fn handle_message(&self, user: &User, message: &InboundMessage) -> String {
        match self.try_handle(user, message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    user_id = user.id,
                    message_sid = message.message_sid.as_deref().unwrap_or("-"),
                    error = %e,
                    "Message handling failed"
                );
                GENERIC_APOLOGY.to_string()
            }
        }
    }

    async fn try_handle(&self, user: &User, message: &InboundMessage) -> Result<String> {
        match &message.content {
            MessageContent::Text(body) if body.trim().is_empty() => {
                info!(user_id = user.id, "Inbound message had no text or media");
                Ok(EMPTY_MESSAGE_REPLY.to_string())
            }
            MessageContent::Text(body) => {
                self.handle_text(user, body, message.source, message.message_sid.as_deref())
                    .await
            }
            MessageContent::Media { url, content_type } => {
                self.handle_media(
                    user,
                    url,
                    content_type,
                    message.source,
                    message.message_sid.as_deref(),
                )
                .await
            }
        }
    }

    async fn handle_text(
        &self,
        user: &User,
        body: &str,
        source: MessageSource,
        message_sid: Option<&str>,
    ) -> Result<String> {
        info!(user_id = user.id, "Processing text message");

        match self.gateway.infer_text(body).await {
            InferenceResult::ExpenseExtracted(extracted) => {
                self.log_expense(user, extracted, Some(body), source, message_sid)
            }
            InferenceResult::NoExpenseFound {
                intent: Intent::AddExpense,
            } => Ok(CLARIFY_TEXT_REPLY.to_string()),
            InferenceResult::NoExpenseFound { intent } => Ok(self.informational_reply(user, intent)),
            InferenceResult::TranscriptOnly { transcript } => Ok(transcript_reply(&transcript)),
            InferenceResult::Error { .. } => Ok(TEXT_ERROR_REPLY.to_string()),
        }
    }

    async fn handle_media(
        &self,
        user: &User,
        url: &str,
        content_type: &str,
        source: MessageSource,
        message_sid: Option<&str>,
    ) -> Result<String> {
        // Unrecognized media types never reach the gateway
        let Some(kind) = MediaKind::from_content_type(content_type) else {
            return Ok(format!(
                "Received media ({}), but I can only process images and audio for now.",
                content_type
            ));
        };

        info!(user_id = user.id, content_type = %content_type, "Processing media message");

        // The temp file is owned by this request and removed when it drops,
        // on every path out of this function
        let file = match self.media.fetch(url).await {
            Ok(file) => file,
            Err(e) => {
                warn!(url = %url, error = %e, "Media download failed");
                return Ok(MEDIA_ERROR_REPLY.to_string());
            }
        };

        let result = match kind {
            MediaKind::Image => self.gateway.infer_image(file.path()).await,
            MediaKind::Audio => self.gateway.infer_audio(file.path()).await,
        };

        match result {
            InferenceResult::ExpenseExtracted(extracted) => {
                let default_description = match kind {
                    MediaKind::Image => "Receipt",
                    MediaKind::Audio => "Voice note",
                };
                self.log_expense(user, extracted, Some(default_description), source, message_sid)
            }
            InferenceResult::NoExpenseFound {
                intent: Intent::AddExpense,
            } => Ok(CLARIFY_MEDIA_REPLY.to_string()),
            InferenceResult::NoExpenseFound { intent } => Ok(self.informational_reply(user, intent)),
            InferenceResult::TranscriptOnly { transcript } => Ok(transcript_reply(&transcript)),
            InferenceResult::Error { .. } => Ok(MEDIA_ERROR_REPLY.to_string()),
        }
    }

    /// Persist an extracted expense and build the confirmation reply
    fn log_expense(
        &self,
        user: &User,
        extracted: ExtractedExpense,
        fallback_description: Option<&str>,
        source: MessageSource,
        message_sid: Option<&str>,
    ) -> Result<String> {
        let category = normalize_category(extracted.category.as_deref());
        let description = extracted
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| fallback_description.unwrap_or("Expense").to_string());

        let expense = self.db.create_expense(
            user.id,
            &NewExpense {
                amount: extracted.amount,
                category: category.clone(),
                description: description.clone(),
                // Occurrence date is processing time: the external systems do
                // not reliably report send time
                date: None,
                source,
                message_sid: message_sid.map(String::from),
            },
        )?;

        info!(
            user_id = user.id,
            expense_id = expense.id,
            amount = expense.amount,
            category = %expense.category,
            "Expense logged"
        );

        Ok(format!(
            "✅ Logged: {:.2} for {} (Category: {}).",
            expense.amount, description, category
        ))
    }

    fn informational_reply(&self, user: &User, intent: Intent) -> String {
        match intent {
            Intent::GetReport => REPORT_PLACEHOLDER_REPLY.to_string(),
            Intent::SetLimit => LIMIT_PLACEHOLDER_REPLY.to_string(),
            Intent::Greeting => format!(
                "Hi {}! How can I help you track your spending today?",
                user.display_name()
            ),
            Intent::AddExpense | Intent::Unknown => UNKNOWN_REPLY.to_string(),
        }
    }
}

fn transcript_reply(transcript: &str) -> String {
    format!(
        "I heard: \"{}\". I couldn't find an expense amount in it, though. Try something like 'Paid $10 for coffee'.",
        transcript.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::MockBackend;
    use crate::models::{ExpenseFilter, FALLBACK_CATEGORY};

    fn dispatcher_with(backend: MockBackend) -> (MessageDispatcher, Database, User) {
        let db = Database::in_memory().unwrap();
        let user = db.resolve_contact("+14155238886").unwrap();
        let dispatcher = MessageDispatcher::new(db.clone(), InferenceClient::Mock(backend));
        (dispatcher, db, user)
    }

    fn text_message(body: &str) -> InboundMessage {
        InboundMessage {
            content: MessageContent::Text(body.to_string()),
            source: MessageSource::Whatsapp,
            message_sid: Some("SM1".to_string()),
        }
    }

    fn media_message(url: &str, content_type: &str) -> InboundMessage {
        InboundMessage {
            content: MessageContent::Media {
                url: url.to_string(),
                content_type: content_type.to_string(),
            },
            source: MessageSource::Whatsapp,
            message_sid: Some("MM1".to_string()),
        }
    }

    /// Serve a fixed byte payload over HTTP for media-download tests
    async fn serve_media(bytes: &'static [u8]) -> String {
        use axum::routing::get;

        let app = axum::Router::new().route("/media", get(move || async move { bytes }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/media", addr)
    }

    #[tokio::test]
    async fn extracted_text_expense_is_persisted_with_exact_reply() {
        let backend = MockBackend::new().with_text(InferenceResult::ExpenseExtracted(
            ExtractedExpense {
                amount: 15.5,
                category: Some("Food/Dining Out".to_string()),
                description: Some("lunch".to_string()),
            },
        ));
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher
            .handle_message(&user, &text_message("Paid $15.50 for lunch"))
            .await;
        assert_eq!(reply, "✅ Logged: 15.50 for lunch (Category: Food/Dining Out).");

        let expenses = db
            .list_expenses(user.id, &ExpenseFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].amount, 15.5);
        assert_eq!(expenses[0].category, "Food/Dining Out");
        assert_eq!(expenses[0].description, "lunch");
        assert_eq!(expenses[0].source, MessageSource::Whatsapp);
        assert_eq!(expenses[0].message_sid.as_deref(), Some("SM1"));
    }

    #[tokio::test]
    async fn missing_category_and_description_fall_back() {
        let backend = MockBackend::new().with_text(InferenceResult::ExpenseExtracted(
            ExtractedExpense {
                amount: 8.0,
                category: None,
                description: None,
            },
        ));
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher
            .handle_message(&user, &text_message("something cost 8"))
            .await;
        assert!(reply.contains(FALLBACK_CATEGORY));

        let expenses = db
            .list_expenses(user.id, &ExpenseFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(expenses[0].category, FALLBACK_CATEGORY);
        // Description falls back to the raw message text
        assert_eq!(expenses[0].description, "something cost 8");
    }

    #[tokio::test]
    async fn add_expense_without_amount_asks_for_clarification() {
        let backend = MockBackend::new().with_text(InferenceResult::NoExpenseFound {
            intent: Intent::AddExpense,
        });
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher
            .handle_message(&user, &text_message("add an expense please"))
            .await;
        assert_eq!(reply, CLARIFY_TEXT_REPLY);
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn informational_intents_use_fixed_templates() {
        let (dispatcher, db, user) = dispatcher_with(MockBackend::new());

        let reply = dispatcher.handle_message(&user, &text_message("report")).await;
        assert_eq!(reply, REPORT_PLACEHOLDER_REPLY);

        let reply = dispatcher.handle_message(&user, &text_message("limit")).await;
        assert_eq!(reply, LIMIT_PLACEHOLDER_REPLY);

        let reply = dispatcher.handle_message(&user, &text_message("hello")).await;
        assert!(reply.starts_with("Hi New User!"));

        let reply = dispatcher
            .handle_message(&user, &text_message("qwertyuiop"))
            .await;
        assert_eq!(reply, UNKNOWN_REPLY);

        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn gateway_failure_yields_error_reply_and_no_write() {
        let (dispatcher, db, user) = dispatcher_with(MockBackend::failing());

        let reply = dispatcher
            .handle_message(&user, &text_message("Paid $5 for coffee"))
            .await;
        assert_eq!(reply, TEXT_ERROR_REPLY);
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn persistence_failure_becomes_generic_apology() {
        // An amount the store rejects, injected past the parse layer
        let backend = MockBackend::new().with_text(InferenceResult::ExpenseExtracted(
            ExtractedExpense {
                amount: -1.0,
                category: None,
                description: None,
            },
        ));
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher.handle_message(&user, &text_message("weird")).await;
        assert_eq!(reply, GENERIC_APOLOGY);
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn empty_text_is_acknowledged() {
        let (dispatcher, _db, user) = dispatcher_with(MockBackend::new());
        let reply = dispatcher.handle_message(&user, &text_message("   ")).await;
        assert_eq!(reply, EMPTY_MESSAGE_REPLY);
    }

    #[tokio::test]
    async fn unsupported_media_type_replies_without_gateway_call() {
        // A failing backend would error if the gateway were consulted
        let (dispatcher, db, user) = dispatcher_with(MockBackend::failing());

        let reply = dispatcher
            .handle_message(
                &user,
                &media_message("http://127.0.0.1:1/media", "application/pdf"),
            )
            .await;
        assert!(reply.contains("application/pdf"));
        assert!(reply.contains("images and audio"));
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn image_media_extraction_persists_expense() {
        let url = serve_media(b"fake-jpeg-bytes").await;
        let backend = MockBackend::new().with_image(InferenceResult::ExpenseExtracted(
            ExtractedExpense {
                amount: 42.0,
                category: Some("Groceries".to_string()),
                description: None,
            },
        ));
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher
            .handle_message(&user, &media_message(&url, "image/jpeg"))
            .await;
        assert_eq!(reply, "✅ Logged: 42.00 for Receipt (Category: Groceries).");

        let expenses = db
            .list_expenses(user.id, &ExpenseFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].description, "Receipt");
        assert_eq!(expenses[0].message_sid.as_deref(), Some("MM1"));
    }

    #[tokio::test]
    async fn unreadable_receipt_asks_for_amount() {
        let url = serve_media(b"blurry").await;
        // Default mock image result is NoExpenseFound { AddExpense }, the
        // same shape an unsuccessful extraction response normalizes to
        let (dispatcher, db, user) = dispatcher_with(MockBackend::new());

        let reply = dispatcher
            .handle_message(&user, &media_message(&url, "image/jpeg"))
            .await;
        assert_eq!(reply, CLARIFY_MEDIA_REPLY);
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn audio_transcript_is_surfaced_when_no_amount_found() {
        let url = serve_media(b"ogg-bytes").await;
        let backend = MockBackend::new().with_audio(InferenceResult::TranscriptOnly {
            transcript: "remind me to buy milk".to_string(),
        });
        let (dispatcher, db, user) = dispatcher_with(backend);

        let reply = dispatcher
            .handle_message(&user, &media_message(&url, "audio/ogg"))
            .await;
        assert!(reply.contains("remind me to buy milk"));
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn media_download_failure_is_absorbed() {
        let (dispatcher, db, user) = dispatcher_with(MockBackend::new());

        let reply = dispatcher
            .handle_message(&user, &media_message("http://127.0.0.1:1/media", "image/png"))
            .await;
        assert_eq!(reply, MEDIA_ERROR_REPLY);
        assert_eq!(
            db.count_expenses(user.id, &ExpenseFilter::default()).unwrap(),
            0
        );
    }
}
