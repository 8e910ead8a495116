//! Inbound message from a channel: the relay's unit of work.

/// A message fetched from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonically increasing id; the relay cursor resumes after it.
    pub sequence_id: i64,
    /// Originating chat, used to reply with failure notices.
    pub chat_id: Option<String>,
    /// Message text; empty when the update carried none.
    pub text: String,
}
