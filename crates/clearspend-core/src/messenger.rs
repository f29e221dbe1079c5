//! Outbound message sending
//!
//! The webhook pipeline replies synchronously in the HTTP response, so this
//! module only covers proactive, out-of-band sends: WhatsApp via the
//! provider's REST API and Telegram via the Bot API. Delivery failures are
//! reported to the caller as errors and logged; they never propagate back
//! into the dispatcher.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Error, Result};

const SEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Credentials for the WhatsApp/SMS provider's outbound API
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, E.164 without the transport prefix
    pub from_number: String,
}

/// Outbound sender over the configured chat transports
#[derive(Clone, Default)]
pub struct OutboundMessenger {
    http_client: Client,
    twilio: Option<TwilioCredentials>,
    telegram_bot_token: Option<String>,
}

impl OutboundMessenger {
    pub fn new(twilio: Option<TwilioCredentials>, telegram_bot_token: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            twilio,
            telegram_bot_token,
        }
    }

    /// Create from environment variables
    ///
    /// - `TWILIO_ACCOUNT_SID` / `TWILIO_AUTH_TOKEN` / `TWILIO_WHATSAPP_NUMBER`
    /// - `TELEGRAM_BOT_TOKEN`
    pub fn from_env() -> Self {
        let twilio = match (
            std::env::var("TWILIO_ACCOUNT_SID").ok(),
            std::env::var("TWILIO_AUTH_TOKEN").ok(),
            std::env::var("TWILIO_WHATSAPP_NUMBER").ok(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Self::new(twilio, std::env::var("TELEGRAM_BOT_TOKEN").ok())
    }

    /// Send a WhatsApp message through the provider's REST API
    pub async fn send_whatsapp(&self, to: &str, text: &str) -> Result<()> {
        let creds = self
            .twilio
            .as_ref()
            .ok_or_else(|| Error::Config("Twilio credentials are not configured".into()))?;

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            creds.account_sid
        );

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&creds.account_sid, Some(&creds.auth_token))
            .form(&[
                ("From", format!("whatsapp:{}", creds.from_number)),
                ("To", format!("whatsapp:{}", to)),
                ("Body", text.to_string()),
            ])
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("WhatsApp send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(to = %to, status = %status, "WhatsApp send rejected");
            return Err(Error::Delivery(format!(
                "WhatsApp send returned status {}",
                status
            )));
        }

        info!(to = %to, "WhatsApp message sent");
        Ok(())
    }

    /// Send a Telegram message through the Bot API
    pub async fn send_telegram(&self, chat_id: &str, text: &str) -> Result<()> {
        let token = self
            .telegram_bot_token
            .as_ref()
            .ok_or_else(|| Error::Config("Telegram bot token is not configured".into()))?;

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);

        let response = self
            .http_client
            .post(&url)
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("Telegram send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(chat_id = %chat_id, status = %status, "Telegram send rejected");
            return Err(Error::Delivery(format!(
                "Telegram send returned status {}",
                status
            )));
        }

        info!(chat_id = %chat_id, "Telegram message sent");
        Ok(())
    }
}
