//! Provider webhook handlers
//!
//! The incoming-message route is the head of the ingestion pipeline:
//! signature verification, then user resolution, then dispatch. Rejections
//! happen before any side effect; once the sender is verified, every failure
//! still produces a well-formed TwiML reply, because an unanswered webhook is
//! a worse failure than an apologetic one.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use clearspend_core::models::{InboundMessage, MessageContent, MessageSource};
use clearspend_core::{parse_form_body, strip_transport_prefix, verify_signature};

use crate::twiml::MessagingResponse;
use crate::AppState;

/// Signature header set by the provider
const SIGNATURE_HEADER: &str = "x-twilio-signature";

const GENERIC_APOLOGY: &str =
    "Sorry, there was an error processing your request. Please try again later.";

fn twiml_response(status: StatusCode, text: &str) -> Response {
    (
        status,
        [("content-type", "text/xml")],
        MessagingResponse::new().message(text).to_xml(),
    )
        .into_response()
}

/// Reconstruct the public URL the provider signed.
///
/// Behind a reverse proxy the scheme arrives in `X-Forwarded-Proto`; the
/// host and path are taken from the request itself.
fn reconstruct_url(headers: &HeaderMap, uri: &axum::http::Uri) -> Option<String> {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers.get("host").and_then(|v| v.to_str().ok())?;
    Some(format!("{}://{}{}", proto, host, uri))
}

/// POST /webhooks/twilio/incoming - inbound message webhook
pub async fn twilio_incoming(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Fail closed: a missing secret is a server misconfiguration, not a pass
    let Some(auth_token) = state.config.twilio_auth_token.as_deref() else {
        error!("Webhook received but TWILIO_AUTH_TOKEN is not configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server misconfiguration").into_response();
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if signature.is_empty() || body.is_empty() {
        warn!("Webhook validation failed: missing signature or body");
        return (
            StatusCode::BAD_REQUEST,
            "Bad Request: Missing signature or body.",
        )
            .into_response();
    }

    let Some(url) = reconstruct_url(&headers, &uri) else {
        warn!("Webhook validation failed: missing Host header");
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing host.").into_response();
    };

    // No user lookup, gateway call, or write happens before this check
    if !verify_signature(auth_token, signature, &url, &body) {
        warn!(url = %url, "Webhook signature verification failed");
        return (StatusCode::FORBIDDEN, "Forbidden: Invalid signature.").into_response();
    }

    let fields = parse_form_body(&body);
    let Some(from) = fields.get("From").filter(|f| !f.is_empty()) else {
        warn!("Webhook payload is missing the From field");
        return (StatusCode::BAD_REQUEST, "Bad Request: Missing sender.").into_response();
    };

    let message_sid = fields.get("MessageSid").cloned();
    let num_media: u32 = fields
        .get("NumMedia")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0);

    info!(
        message_sid = message_sid.as_deref().unwrap_or("-"),
        num_media, "Incoming validated message"
    );

    let content = if num_media > 0 {
        match (fields.get("MediaUrl0"), fields.get("MediaContentType0")) {
            (Some(url), Some(content_type)) => MessageContent::Media {
                url: url.clone(),
                content_type: content_type.clone(),
            },
            _ => {
                warn!("Webhook claims media but omitted the media fields");
                return (StatusCode::BAD_REQUEST, "Bad Request: Missing media fields.")
                    .into_response();
            }
        }
    } else {
        MessageContent::Text(fields.get("Body").cloned().unwrap_or_default())
    };

    let source = if from.starts_with("telegram:") {
        MessageSource::Telegram
    } else {
        MessageSource::Whatsapp
    };

    // Past this point the provider always gets a TwiML reply
    let user = match state.db.resolve_contact(strip_transport_prefix(from)) {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "Failed to resolve webhook sender");
            return twiml_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_APOLOGY);
        }
    };

    let inbound = InboundMessage {
        content,
        source,
        message_sid,
    };

    let reply = state.dispatcher.handle_message(&user, &inbound).await;
    twiml_response(StatusCode::OK, &reply)
}

/// POST /webhooks/twilio/status - delivery status callbacks
///
/// The update path is a stub: callbacks are logged and acknowledged.
pub async fn twilio_status(body: Bytes) -> StatusCode {
    let fields = parse_form_body(&body);
    info!(
        message_sid = fields.get("MessageSid").map(String::as_str).unwrap_or("-"),
        status = fields.get("MessageStatus").map(String::as_str).unwrap_or("-"),
        error_code = fields.get("ErrorCode").map(String::as_str).unwrap_or(""),
        "Delivery status callback"
    );
    StatusCode::NO_CONTENT
}

/// POST /webhooks/telegram - acknowledged placeholder
///
/// Telegram ingestion is not wired up yet; updates are logged and accepted so
/// the bot API does not retry them forever.
pub async fn telegram_incoming(body: Bytes) -> StatusCode {
    info!(bytes = body.len(), "Telegram webhook received");
    StatusCode::OK
}
