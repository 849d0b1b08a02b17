//! Telegram Bot API notifier.

use crate::error::NotifyError;
use crate::services::notifier::Notifier;
use crate::ConsumerId;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Upper bound on one `sendMessage` round trip.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Escape text for Telegram's HTML parse mode. Only `&`, `<` and `>` are
/// significant there.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: ConsumerId,
    text: &'a str,
    parse_mode: &'static str,
}

pub struct TelegramNotifier {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self::with_client(TELEGRAM_API_URL, token, client))
    }

    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    /// Send one message as plain text, surfacing transport and API failures.
    pub async fn send_message(&self, chat_id: ConsumerId, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let text = escape_html(text);
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text: &text,
                parse_mode: "HTML",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(chat_id, "Telegram message delivered");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, consumer_id: ConsumerId, text: &str) {
        if let Err(e) = self.send_message(consumer_id, text).await {
            warn!(consumer_id, error = %e, "Failed to deliver Telegram message");
        }
    }
}
