//! Telegram channel: poll getUpdates and sendMessage via Bot API.

use crate::channels::inbound::InboundMessage;
use crate::channels::source::{FetchError, UpdateSource};
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

impl TelegramUpdate {
    /// Direct message first, then channel post. Updates with neither still advance the cursor.
    pub fn into_inbound(self) -> InboundMessage {
        let post = self.message.or(self.channel_post);
        InboundMessage {
            sequence_id: self.update_id,
            chat_id: post.as_ref().map(|m| m.chat.id.to_string()),
            text: post.and_then(|m| m.text).unwrap_or_default(),
        }
    }
}

/// Telegram channel connector: polls for updates and sends notices via sendMessage.
pub struct TelegramChannel {
    id: String,
    token: String,
    api_base: String,
    long_poll_timeout_secs: u64,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(client: reqwest::Client, token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            id: "telegram".to_string(),
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            long_poll_timeout_secs: 0,
            client,
        }
    }

    /// Ask Telegram to hold each getUpdates call open up to `secs` while waiting for updates.
    pub fn with_long_poll(mut self, secs: u64) -> Self {
        self.long_poll_timeout_secs = secs;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Call Telegram getUpdates starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>, FetchError> {
        let mut url = format!("{}?offset={}", self.method_url("getUpdates"), offset);
        if self.long_poll_timeout_secs > 0 {
            url = format!("{}&timeout={}", url, self.long_poll_timeout_secs);
        }
        // The URL carries the bot token; keep it out of errors.
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.without_url()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }
        let data: GetUpdatesResponse = res
            .json()
            .await
            .map_err(|e| FetchError::Request(e.without_url()))?;
        if !data.ok {
            return Err(FetchError::NotOk(data.description));
        }
        Ok(data.result)
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url().to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_since(&self, cursor: i64) -> Result<Vec<InboundMessage>, FetchError> {
        let updates = self.get_updates(cursor).await?;
        Ok(updates.into_iter().map(TelegramUpdate::into_inbound).collect())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        TelegramChannel::send_message(self, chat_id, text).await
    }
}
