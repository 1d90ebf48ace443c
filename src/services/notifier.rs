use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::error::Result;

/// Fire-and-forget delivery of a formatted message to a user's chat.
/// Failures are logged by callers and never retried or escalated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, telegram_id: i64, message: &str) -> Result<()>;
}

/// Hands messages to the bot process over its webhook endpoint; the bot owns
/// the actual Telegram API session.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    target_url: String,
}

impl WebhookNotifier {
    pub fn new(target_url: String) -> Self {
        Self {
            client: Client::new(),
            target_url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn deliver(&self, telegram_id: i64, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.target_url)
            .json(&serde_json::json!({
                "chat_id": telegram_id,
                "text": message,
                "parse_mode": "HTML",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                status = %response.status(),
                "bot webhook rejected notification"
            );
        }
        Ok(())
    }
}
