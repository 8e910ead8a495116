//! Configuration types and loading.
//!
//! Config is loaded from an optional JSON file (e.g. `~/.linkrelay/config.json`) and the environment.
//! Environment variables override file values. [`Settings::resolve`] validates the result into the
//! explicit settings struct handed to the relay at startup.

use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_API_BASE: &str = "TELEGRAM_API_BASE";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
pub const ENV_CONFIG_PATH: &str = "LINKRELAY_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("reading config from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config from {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Inbound chat transport.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Outbound repository dispatch.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Poll loop timing and retry.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Shared HTTP client.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// Bot API base URL (default https://api.telegram.org). Overridden by TELEGRAM_API_BASE.
    pub api_base: Option<String>,
    /// Long-poll `timeout` passed to getUpdates. 0 (default) means short polling. Must stay below the HTTP client timeout.
    #[serde(default)]
    pub long_poll_timeout_secs: u64,
}

/// Repository dispatch settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Bearer token. Overridden by GITHUB_TOKEN env when set.
    pub token: Option<String>,
    /// Dispatch endpoint, e.g. https://api.github.com/repos/OWNER/REPO/dispatches. Overridden by GITHUB_API_URL.
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Pause between polls (default 1000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Fetch retries before giving up (default 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; doubles per retry (default 1000).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Reply in the originating chat when a dispatch fails.
    #[serde(default)]
    pub notify_failures: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Timeout applied to every request made by the shared client (default 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            notify_failures: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Validated runtime settings, built once at startup and passed into the relay.
#[derive(Clone)]
pub struct Settings {
    pub telegram_token: String,
    pub telegram_api_base: String,
    pub long_poll_timeout_secs: u64,
    pub dispatch_token: String,
    pub dispatch_url: String,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    pub notify_failures: bool,
    pub http_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("telegram_token", &"<redacted>")
            .field("telegram_api_base", &self.telegram_api_base)
            .field("long_poll_timeout_secs", &self.long_poll_timeout_secs)
            .field("dispatch_token", &"<redacted>")
            .field("dispatch_url", &self.dispatch_url)
            .field("poll_interval", &self.poll_interval)
            .field("retry", &self.retry)
            .field("notify_failures", &self.notify_failures)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Settings {
    /// Resolve settings from config and the process environment.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        Self::resolve_with(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings using `lookup` in place of the process environment.
    /// Every missing required value is reported, not only the first.
    pub fn resolve_with<F>(config: &Config, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = pick(&lookup, ENV_TELEGRAM_BOT_TOKEN, config.telegram.bot_token.as_deref());
        let dispatch_token = pick(&lookup, ENV_GITHUB_TOKEN, config.dispatch.token.as_deref());
        let dispatch_url = pick(&lookup, ENV_GITHUB_API_URL, config.dispatch.api_url.as_deref());

        let mut missing = Vec::new();
        if telegram_token.is_none() {
            missing.push(ENV_TELEGRAM_BOT_TOKEN);
        }
        if dispatch_token.is_none() {
            missing.push(ENV_GITHUB_TOKEN);
        }
        if dispatch_url.is_none() {
            missing.push(ENV_GITHUB_API_URL);
        }
        let (Some(telegram_token), Some(dispatch_token), Some(dispatch_url)) =
            (telegram_token, dispatch_token, dispatch_url)
        else {
            return Err(ConfigError::Missing(missing));
        };

        if config.telegram.long_poll_timeout_secs >= config.http.timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "telegram.longPollTimeoutSecs ({}) must be below http.timeoutSecs ({})",
                config.telegram.long_poll_timeout_secs, config.http.timeout_secs
            )));
        }

        let telegram_api_base = pick(&lookup, ENV_TELEGRAM_API_BASE, config.telegram.api_base.as_deref())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());

        Ok(Self {
            telegram_token,
            telegram_api_base,
            long_poll_timeout_secs: config.telegram.long_poll_timeout_secs,
            dispatch_token,
            dispatch_url,
            poll_interval: Duration::from_millis(config.relay.poll_interval_ms),
            retry: RetryPolicy::new(
                config.relay.max_retries,
                Duration::from_millis(config.relay.initial_backoff_ms),
            ),
            notify_failures: config.relay.notify_failures,
            http_timeout: Duration::from_secs(config.http.timeout_secs),
        })
    }

    /// The one HTTP client shared by the Telegram channel, title resolver and dispatcher.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        http_client(self.http_timeout)
    }
}

/// HTTP client with a per-request timeout.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Env value wins over config value; blank strings count as unset.
fn pick<F>(lookup: &F, key: &str, config_value: Option<&str>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|s| non_empty(&s))
        .or_else(|| config_value.and_then(non_empty))
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".linkrelay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from `path` (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf), ConfigError> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        read_config(&path)?
    };
    Ok((config, path))
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn full_env() -> impl Fn(&str) -> Option<String> {
        env(&[
            (ENV_TELEGRAM_BOT_TOKEN, "123:abc"),
            (ENV_GITHUB_TOKEN, "ghp_x"),
            (ENV_GITHUB_API_URL, "https://api.github.com/repos/o/r/dispatches"),
        ])
    }

    #[test]
    fn defaults_match_relay_contract() {
        let settings = Settings::resolve_with(&Config::default(), full_env()).expect("settings");
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_backoff, Duration::from_secs(1));
        assert_eq!(settings.telegram_api_base, TELEGRAM_API_BASE);
        assert!(!settings.notify_failures);
    }

    #[test]
    fn missing_values_are_all_reported() {
        let err = Settings::resolve_with(&Config::default(), env(&[(ENV_GITHUB_TOKEN, "t")]))
            .expect_err("should fail");
        match err {
            ConfigError::Missing(keys) => {
                assert_eq!(keys, vec![ENV_TELEGRAM_BOT_TOKEN, ENV_GITHUB_API_URL]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_env_value_counts_as_missing() {
        let lookup = env(&[
            (ENV_TELEGRAM_BOT_TOKEN, "   "),
            (ENV_GITHUB_TOKEN, "t"),
            (ENV_GITHUB_API_URL, "https://example.test"),
        ]);
        let err = Settings::resolve_with(&Config::default(), lookup).expect_err("should fail");
        assert!(err.to_string().contains(ENV_TELEGRAM_BOT_TOKEN));
    }

    #[test]
    fn env_overrides_config_file_values() {
        let mut config = Config::default();
        config.dispatch.token = Some("from-file".to_string());
        config.dispatch.api_url = Some("https://file.test".to_string());
        config.telegram.bot_token = Some("file-bot".to_string());
        let settings =
            Settings::resolve_with(&config, env(&[(ENV_GITHUB_TOKEN, "from-env")])).expect("settings");
        assert_eq!(settings.dispatch_token, "from-env");
        assert_eq!(settings.dispatch_url, "https://file.test");
        assert_eq!(settings.telegram_token, "file-bot");
    }

    #[test]
    fn long_poll_must_fit_inside_http_timeout() {
        let mut config = Config::default();
        config.telegram.long_poll_timeout_secs = 10;
        let err = Settings::resolve_with(&config, full_env()).expect_err("should fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        config.telegram.long_poll_timeout_secs = 8;
        let settings = Settings::resolve_with(&config, full_env()).expect("settings");
        assert_eq!(settings.long_poll_timeout_secs, 8);
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let mut config = Config::default();
        config.telegram.api_base = Some("http://127.0.0.1:9000/".to_string());
        let settings = Settings::resolve_with(&config, full_env()).expect("settings");
        assert_eq!(settings.telegram_api_base, "http://127.0.0.1:9000");
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let settings = Settings::resolve_with(&Config::default(), full_env()).expect("settings");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("123:abc"));
        assert!(!rendered.contains("ghp_x"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn parses_camel_case_file() {
        let json = r#"{
            "dispatch": { "apiUrl": "https://api.github.com/repos/o/r/dispatches" },
            "relay": { "pollIntervalMs": 250, "notifyFailures": true },
            "http": { "timeoutSecs": 3 }
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse");
        assert_eq!(config.relay.poll_interval_ms, 250);
        assert_eq!(config.relay.max_retries, 5);
        assert!(config.relay.notify_failures);
        assert_eq!(config.http.timeout_secs, 3);
        assert_eq!(
            config.dispatch.api_url.as_deref(),
            Some("https://api.github.com/repos/o/r/dispatches")
        );
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join("linkrelay-config-test-does-not-exist.json");
        let (config, used) = load_config(Some(path.clone())).expect("load");
        assert_eq!(used, path);
        assert_eq!(config.http.timeout_secs, 10);
    }
}
