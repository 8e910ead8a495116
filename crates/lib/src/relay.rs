//! The poll loop: fetch updates since the cursor, then extract, resolve and dispatch each one.
//!
//! Processing is sequential within a batch. The cursor moves past a message before the message is
//! processed, so a failed title lookup or dispatch never blocks later polls. Shutdown is cooperative:
//! the token is checked between iterations and during sleeps, in-flight requests run to completion.

use crate::channels::{FetchError, InboundMessage, TelegramChannel, UpdateSource};
use crate::config::Settings;
use crate::dispatch::{DispatchError, DispatchEvent, Dispatcher, EventSink};
use crate::extract::extract;
use crate::retry::RetryPolicy;
use crate::title::{TitleError, TitleResolver, TitleSource};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("fetching updates still failing after {attempts} retries: {last}")]
    FetchExhausted {
        attempts: u32,
        #[source]
        last: FetchError,
    },
}

/// What happened to one inbound message.
#[derive(Debug)]
pub enum MessageOutcome {
    /// No link in the text; nothing sent.
    NoLink,
    TitleFailed(TitleError),
    Dispatched(DispatchEvent),
    DispatchFailed(DispatchError),
}

/// Loop timing and failure handling.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub notify_failures: bool,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            notify_failures: false,
        }
    }
}

pub struct Relay {
    source: Arc<dyn UpdateSource>,
    titles: Arc<dyn TitleSource>,
    sink: Arc<dyn EventSink>,
    options: RelayOptions,
    cursor: i64,
}

impl Relay {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        titles: Arc<dyn TitleSource>,
        sink: Arc<dyn EventSink>,
        options: RelayOptions,
    ) -> Self {
        Self {
            source,
            titles,
            sink,
            options,
            cursor: 0,
        }
    }

    /// Wire Telegram, the title resolver and the dispatcher onto one shared HTTP client.
    pub fn from_settings(settings: &Settings) -> reqwest::Result<Self> {
        let client = settings.http_client()?;
        let telegram = TelegramChannel::new(
            client.clone(),
            &settings.telegram_token,
            &settings.telegram_api_base,
        )
        .with_long_poll(settings.long_poll_timeout_secs);
        let titles = TitleResolver::new(client.clone());
        let dispatcher = Dispatcher::new(client, &settings.dispatch_url, &settings.dispatch_token);
        Ok(Self::new(
            Arc::new(telegram),
            Arc::new(titles),
            Arc::new(dispatcher),
            RelayOptions {
                poll_interval: settings.poll_interval,
                retry: settings.retry,
                notify_failures: settings.notify_failures,
            },
        ))
    }

    /// Next sequence id to fetch.
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Poll until `shutdown` is cancelled. Errors only when fetch retries are exhausted.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), RelayError> {
        log::info!("relay: polling {} from offset {}", self.source.id(), self.cursor);
        while !shutdown.is_cancelled() {
            let batch = match self.source.fetch_since(self.cursor).await {
                Ok(batch) => batch,
                Err(e) => {
                    log::warn!("relay: failed to get updates: {}", e);
                    match self.retry_fetch(e, &shutdown).await? {
                        Some(batch) => batch,
                        None => break,
                    }
                }
            };
            self.process_batch(batch).await;
            if sleep_or_cancelled(self.options.poll_interval, &shutdown).await {
                break;
            }
        }
        log::info!("relay: stopped at offset {}", self.cursor);
        Ok(())
    }

    /// Retry the fetch with backoff. `Ok(None)` means shutdown was requested while waiting.
    async fn retry_fetch(
        &self,
        first: FetchError,
        shutdown: &CancellationToken,
    ) -> Result<Option<Vec<InboundMessage>>, RelayError> {
        let mut last = first;
        for (attempt, delay) in self.options.retry.delays().enumerate() {
            log::info!(
                "relay: retrying update fetch in {:?} (attempt {}/{})",
                delay,
                attempt + 1,
                self.options.retry.max_attempts
            );
            if sleep_or_cancelled(delay, shutdown).await {
                return Ok(None);
            }
            match self.source.fetch_since(self.cursor).await {
                Ok(batch) => return Ok(Some(batch)),
                Err(e) => {
                    log::warn!("relay: retry {} failed: {}", attempt + 1, e);
                    last = e;
                }
            }
        }
        log::error!("relay: exceeded maximum retries for update fetch");
        Err(RelayError::FetchExhausted {
            attempts: self.options.retry.max_attempts,
            last,
        })
    }

    async fn process_batch(&mut self, batch: Vec<InboundMessage>) {
        for msg in batch {
            self.cursor = self.cursor.max(msg.sequence_id.saturating_add(1));
            self.process(&msg).await;
        }
    }

    /// Run one message through extract, title lookup and dispatch. Failures are logged, never raised.
    pub async fn process(&self, msg: &InboundMessage) -> MessageOutcome {
        let extracted = extract(&msg.text);
        let Some(url) = extracted.url else {
            log::debug!("relay: update {} has no link, skipping", msg.sequence_id);
            return MessageOutcome::NoLink;
        };

        let title = match self.titles.title(&url).await {
            Ok(title) => title,
            Err(e) => {
                log::warn!("relay: title lookup failed for {}: {}", url, e);
                return MessageOutcome::TitleFailed(e);
            }
        };

        let event = DispatchEvent::new(url, title, &extracted.tags);
        match self.sink.dispatch(&event).await {
            Ok(()) => {
                log::info!(
                    "relay: dispatched {} (title: {:?}, tags: {})",
                    event.client_payload.url,
                    event.client_payload.title,
                    event.client_payload.tags
                );
                MessageOutcome::Dispatched(event)
            }
            Err(e) => {
                log::warn!("relay: dispatch failed for {}: {}", event.client_payload.url, e);
                if self.options.notify_failures {
                    self.notify_failure(msg, &event.client_payload.url, &e).await;
                }
                MessageOutcome::DispatchFailed(e)
            }
        }
    }

    async fn notify_failure(&self, msg: &InboundMessage, url: &str, err: &DispatchError) {
        let Some(chat_id) = msg.chat_id.as_deref() else {
            return;
        };
        let text = format!("failed to forward {}: {}", url, err);
        if let Err(e) = self.source.send_message(chat_id, &text).await {
            log::warn!("relay: failure notice to chat {} not sent: {}", chat_id, e);
        }
    }
}

/// Sleep for `duration`; true if `shutdown` fired first.
async fn sleep_or_cancelled(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

/// Run the relay until SIGINT/SIGTERM (Ok) or until fetch retries are exhausted (Err).
pub async fn run_relay(settings: Settings) -> Result<()> {
    let mut relay = Relay::from_settings(&settings).context("building http client")?;
    let shutdown = CancellationToken::new();
    let loop_token = shutdown.clone();
    let mut task = tokio::spawn(async move { relay.run(loop_token).await });

    tokio::select! {
        res = &mut task => {
            res.context("relay task failed")??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            log::info!("shutdown signal received, waiting for the relay loop to finish");
            shutdown.cancel();
        }
    }

    task.await.context("relay task failed")??;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
