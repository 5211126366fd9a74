//! Telegram Bot API delivery.
//!
//! API docs: https://core.telegram.org/bots/api#sendmessage
//! Auth: bot token embedded in the URL path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use super::Notifier;

const BASE_URL: &str = "https://api.telegram.org";

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Telegram bot client bound to a single chat.
pub struct TelegramNotifier {
    http: Client,
    base_url: String,
    token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: SecretString, chat_id: String, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            token,
            chat_id,
        })
    }

    /// Point the client at a different API host (local bot API server, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.token.expose_secret()
        )
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.send_url())
            .json(&self.payload(message))
            .send()
            .await
            // reqwest errors include the URL, which carries the token.
            .map_err(|e| anyhow::anyhow!("Telegram request failed: {}", e.without_url()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {status}: {body}");
        }

        debug!(chat_id = %self.chat_id, "Telegram message delivered");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
