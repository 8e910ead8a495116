//! Integration test: one mock server stands in for Telegram, the linked page, and the GitHub
//! dispatch endpoint. The relay polls, resolves the title, dispatches once, then shuts down.

use httpmock::prelude::*;
use lib::config::{Config, Settings};
use lib::relay::Relay;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn link_in_chat_becomes_repository_dispatch() {
    let server = MockServer::start_async().await;
    let page_url = server.url("/article");

    let first_batch = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/bottest-token/getUpdates")
                .query_param("offset", "0");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    { "update_id": 1, "message": { "chat": { "id": 42 }, "text": format!("#rust #news {} #late", page_url) } }
                ]
            }));
        })
        .await;
    let later_batches = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/bottest-token/getUpdates")
                .query_param("offset", "2");
            then.status(200).json_body(json!({ "ok": true, "result": [] }));
        })
        .await;
    let page = server
        .mock_async(|when, then| {
            when.method(GET).path("/article");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><head><title>\n  Async Rust in Practice\n</title></head><body></body></html>");
        })
        .await;
    let dispatch = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/owner/repo/dispatches")
                .header("authorization", "Bearer gh-token")
                .json_body(json!({
                    "event_type": "webhook",
                    "client_payload": {
                        "url": page_url,
                        "title": "Async Rust in Practice",
                        "tags": "rust,news"
                    }
                }));
            then.status(204);
        })
        .await;

    let mut config = Config::default();
    config.telegram.api_base = Some(server.base_url());
    config.dispatch.api_url = Some(server.url("/repos/owner/repo/dispatches"));
    config.relay.poll_interval_ms = 20;
    let settings = Settings::resolve_with(&config, |key| match key {
        "TELEGRAM_BOT_TOKEN" => Some("test-token".to_string()),
        "GITHUB_TOKEN" => Some("gh-token".to_string()),
        _ => None,
    })
    .expect("settings");

    let mut relay = Relay::from_settings(&settings).expect("relay");
    let shutdown = CancellationToken::new();
    let loop_token = shutdown.clone();
    let handle = tokio::spawn(async move {
        let result = relay.run(loop_token).await;
        (result, relay.cursor())
    });

    for _ in 0..250 {
        if later_batches.calls_async().await > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();

    let (result, cursor) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("relay stops after cancel")
        .expect("relay task");
    result.expect("relay ran without fatal error");
    assert_eq!(cursor, 2);

    first_batch.assert_calls_async(1).await;
    page.assert_calls_async(1).await;
    dispatch.assert_calls_async(1).await;
}
