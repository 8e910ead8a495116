//! Page title lookup: GET the link, parse the HTML, return the first `<title>` text.

use async_trait::async_trait;
use scraper::{Html, Selector};

#[derive(Debug, thiserror::Error)]
pub enum TitleError {
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The response body could not be read as a document.
    #[error("parsing {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Resolves a URL to a page title.
#[async_trait]
pub trait TitleSource: Send + Sync {
    async fn title(&self, url: &str) -> Result<String, TitleError>;
}

/// HTTP title resolver on the shared client. Non-2xx responses are still parsed (error pages have titles too).
#[derive(Clone)]
pub struct TitleResolver {
    client: reqwest::Client,
}

impl TitleResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn resolve(&self, url: &str) -> Result<String, TitleError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TitleError::Fetch {
                url: url.to_string(),
                source,
            })?;
        if !res.status().is_success() {
            log::debug!("title: {} returned {}, parsing body anyway", url, res.status());
        }
        let body = res.text().await.map_err(|source| TitleError::Parse {
            url: url.to_string(),
            source,
        })?;
        Ok(find_title(&body))
    }
}

#[async_trait]
impl TitleSource for TitleResolver {
    async fn title(&self, url: &str) -> Result<String, TitleError> {
        self.resolve(url).await
    }
}

/// Text of the first child of the first `<title>` element in document order, trimmed.
/// Empty when the page has no title.
pub fn find_title(html: &str) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .and_then(|el| el.first_child())
        .and_then(|node| node.value().as_text().map(|t| t.trim().to_string()))
        .unwrap_or_default()
}
