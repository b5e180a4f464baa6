//! Sync Core Configuration Settings
//!
//! Configuration types for the synchronization core, loaded from
//! environment variables with per-field defaults.

use std::time::Duration;

use crate::domain::store::DEFAULT_ALERT_RETENTION;

/// Bearer credential attached to outbound REST requests.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wrap a raw token string.
    #[must_use]
    pub const fn new(token: String) -> Self {
        Self(token)
    }

    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

/// REST backend settings.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Base URL of the backend, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Per-request timeout. A timed-out snapshot request is a
    /// per-symbol failure, never a batch failure.
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Persistent stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket URL. Empty means derive from the backend base URL.
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff
    /// (1.0 keeps a fixed step).
    pub reconnect_delay_multiplier: f64,
    /// Reconnection attempts before the connection is declared failed
    /// and left for caller intervention.
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_initial: Duration::from_secs(1),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Number of retained scanner alerts, most recent first.
    pub alert_retention: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            alert_retention: DEFAULT_ALERT_RETENTION,
        }
    }
}

/// Complete sync core configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// REST backend settings.
    pub backend: BackendSettings,
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// Store settings.
    pub store: StoreSettings,
    /// Initial bearer credential, when one is already known.
    pub token: Option<BearerToken>,
}

impl SyncConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `MARKET_SYNC_API_URL` is missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("MARKET_SYNC_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("MARKET_SYNC_API_URL".to_string()))?;
        if base_url.is_empty() {
            return Err(ConfigError::EmptyValue("MARKET_SYNC_API_URL".to_string()));
        }

        let backend = BackendSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: parse_env_duration_secs(
                "MARKET_SYNC_REQUEST_TIMEOUT_SECS",
                BackendSettings::default().request_timeout,
            ),
        };

        let stream = StreamSettings {
            url: std::env::var("MARKET_SYNC_WS_URL").unwrap_or_default(),
            reconnect_delay_initial: parse_env_duration_millis(
                "MARKET_SYNC_RECONNECT_DELAY_INITIAL_MS",
                StreamSettings::default().reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "MARKET_SYNC_RECONNECT_DELAY_MAX_SECS",
                StreamSettings::default().reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "MARKET_SYNC_RECONNECT_DELAY_MULTIPLIER",
                StreamSettings::default().reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "MARKET_SYNC_MAX_RECONNECT_ATTEMPTS",
                StreamSettings::default().max_reconnect_attempts,
            ),
        };

        let store = StoreSettings {
            alert_retention: parse_env_usize(
                "MARKET_SYNC_ALERT_RETENTION",
                StoreSettings::default().alert_retention,
            ),
        };

        let token = std::env::var("MARKET_SYNC_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(BearerToken::new);

        Ok(Self {
            backend,
            stream,
            store,
            token,
        })
    }

    /// The stream URL, derived from the backend base URL when not set
    /// explicitly: `http(s)://host` becomes `ws(s)://host/stream`.
    #[must_use]
    pub fn stream_url(&self) -> String {
        if !self.stream.url.is_empty() {
            return self.stream.url.clone();
        }

        let base = &self.backend.base_url;
        let derived = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.clone()
        };
        format!("{}/stream", derived.trim_end_matches('/'))
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
