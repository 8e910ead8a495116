//! Update source trait: where the relay fetches messages from and sends notices to.

use crate::channels::inbound::InboundMessage;
use async_trait::async_trait;

/// Why a fetch from an [`UpdateSource`] failed. Messages never include request URLs.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("update fetch request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("update fetch failed: {status} {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("update source rejected the request ({})", .0.as_deref().unwrap_or("no description"))]
    NotOk(Option<String>),
}

/// A chat transport the relay polls. Implemented by [`crate::channels::TelegramChannel`];
/// any backing (raw polling, SDK channel, test fake) satisfies the same contract.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Channel id (e.g. "telegram").
    fn id(&self) -> &str;
    /// Fetch messages with `sequence_id >= cursor`, in order.
    async fn fetch_since(&self, cursor: i64) -> Result<Vec<InboundMessage>, FetchError>;
    /// Send a text message to a chat.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String>;
}
