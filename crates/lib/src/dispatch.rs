//! Repository dispatch: POST a `webhook` event carrying the link, title and tags.
//!
//! Wire contract: `{"event_type":"webhook","client_payload":{"url":..,"title":..,"tags":"a,b"}}`,
//! tags comma-joined into one string, `Authorization: Bearer <token>`. Success is `204 No Content`.

use crate::extract::join_tags;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

pub const EVENT_TYPE: &str = "webhook";
const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("dispatch returned status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl DispatchError {
    /// HTTP status of a rejected dispatch, if the endpoint answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            DispatchError::Request(e) => e.status(),
        }
    }
}

/// Repository dispatch request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchEvent {
    pub event_type: String,
    pub client_payload: ClientPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientPayload {
    pub url: String,
    pub title: String,
    pub tags: String,
}

impl DispatchEvent {
    /// Build the event; an empty tag list becomes the fallback tag.
    pub fn new(url: impl Into<String>, title: impl Into<String>, tags: &[String]) -> Self {
        Self {
            event_type: EVENT_TYPE.to_string(),
            client_payload: ClientPayload {
                url: url.into(),
                title: title.into(),
                tags: join_tags(tags),
            },
        }
    }
}

/// Receives outbound events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<(), DispatchError>;
}

/// Sends events to a GitHub `repos/{owner}/{repo}/dispatches` endpoint.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl Dispatcher {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            token: token.into(),
        }
    }

    pub async fn send(&self, event: &DispatchEvent) -> Result<(), DispatchError> {
        let res = self
            .client
            .post(&self.api_url)
            .header(reqwest::header::ACCEPT, ACCEPT_GITHUB_V3)
            .bearer_auth(&self.token)
            .json(event)
            .send()
            .await?;
        let status = res.status();
        if status != StatusCode::NO_CONTENT {
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::Status { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for Dispatcher {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<(), DispatchError> {
        self.send(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn event() -> DispatchEvent {
        DispatchEvent::new(
            "https://www.example.com",
            "Example Title",
            &["tag1".to_string(), "tag2".to_string(), "tag3".to_string()],
        )
    }

    #[test]
    fn event_serializes_to_wire_shape() {
        let value = serde_json::to_value(event()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "event_type": "webhook",
                "client_payload": {
                    "url": "https://www.example.com",
                    "title": "Example Title",
                    "tags": "tag1,tag2,tag3"
                }
            })
        );
    }

    #[test]
    fn event_without_tags_is_unsorted() {
        let ev = DispatchEvent::new("https://x.test", "", &[]);
        assert_eq!(ev.client_payload.tags, "unsorted");
    }

    #[tokio::test]
    async fn no_content_is_success() {
        let server = MockServer::start_async().await;
        let hook = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/repos/owner/repo/dispatches")
                    .header("authorization", "Bearer fakeToken")
                    .header("accept", "application/vnd.github.v3+json")
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "event_type": "webhook",
                        "client_payload": {
                            "url": "https://www.example.com",
                            "title": "Example Title",
                            "tags": "tag1,tag2,tag3"
                        }
                    }));
                then.status(204);
            })
            .await;

        let dispatcher = Dispatcher::new(
            reqwest::Client::new(),
            server.url("/repos/owner/repo/dispatches"),
            "fakeToken",
        );
        dispatcher.send(&event()).await.expect("dispatch");
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn other_status_is_dispatch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dispatches");
                then.status(422).body(r#"{"message":"Validation Failed"}"#);
            })
            .await;

        let dispatcher = Dispatcher::new(reqwest::Client::new(), server.url("/dispatches"), "t");
        let err = dispatcher.send(&event()).await.expect_err("should fail");
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(err.to_string().contains("Validation Failed"));
    }

    #[tokio::test]
    async fn plain_ok_is_not_the_expected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/dispatches");
                then.status(200);
            })
            .await;

        let dispatcher = Dispatcher::new(reqwest::Client::new(), server.url("/dispatches"), "t");
        let err = dispatcher.send(&event()).await.expect_err("should fail");
        assert_eq!(err.status(), Some(StatusCode::OK));
    }
}
