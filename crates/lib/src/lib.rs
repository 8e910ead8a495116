//! linkrelay core library — watches a Telegram chat for links, looks up page titles,
//! and forwards each link as a GitHub repository dispatch event.

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod relay;
pub mod retry;
pub mod title;
