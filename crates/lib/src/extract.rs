//! Pull the link and hashtags out of a chat message.
//!
//! A single left-to-right pass over whitespace-separated tokens: `#tag` tokens are collected
//! (prefix stripped, duplicates kept) until the first `http://` or `https://` token, which ends the scan.

/// Tag sent when a message carries a link but no hashtags.
pub const FALLBACK_TAG: &str = "unsorted";

/// The link and the tags that precede it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub url: Option<String>,
    pub tags: Vec<String>,
}

/// Scan `text` for the first URL and the hashtags before it.
/// Without a URL the result is empty; tags alone are never relayed.
pub fn extract(text: &str) -> Extracted {
    let mut tags = Vec::new();
    for word in text.split_whitespace() {
        if let Some(tag) = word.strip_prefix('#') {
            tags.push(tag.to_string());
        } else if is_url(word) {
            return Extracted {
                url: Some(word.to_string()),
                tags,
            };
        }
    }
    Extracted::default()
}

fn is_url(word: &str) -> bool {
    word.starts_with("http://") || word.starts_with("https://")
}

/// Comma-join tags for the dispatch payload, or [`FALLBACK_TAG`] when there are none.
pub fn join_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        FALLBACK_TAG.to_string()
    } else {
        tags.join(",")
    }
}
