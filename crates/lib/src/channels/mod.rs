//! Communication channels (e.g. Telegram).
//!
//! The relay polls an [`UpdateSource`] for [`InboundMessage`]s and may reply through it.

mod inbound;
mod source;
mod telegram;

pub use inbound::InboundMessage;
pub use source::{FetchError, UpdateSource};
pub use telegram::{TelegramChannel, TelegramMessage, TelegramUpdate};
