//! REST Backend Client
//!
//! Request/response access to the backend's snapshot endpoints. Every
//! outbound request carries the cached bearer credential when one is
//! present; a `401` response discards the cached credential and
//! surfaces [`ApiError::Unauthorized`] so the caller can prompt for
//! re-authentication. The client never re-authenticates on its own.

pub mod snapshot;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::domain::market::{AlertEvent, AlertKind, QuoteOrigin, Symbol, SymbolQuote};
use crate::infrastructure::config::{BackendSettings, BearerToken};

// =============================================================================
// Errors
// =============================================================================

/// REST client errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Backend returned a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Backend rejected the credential; the cached token was cleared.
    #[error("unauthorized; cached credential cleared")]
    Unauthorized,

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

// =============================================================================
// Token Store
// =============================================================================

/// Shared holder for the bearer credential.
///
/// Cloning shares the underlying slot, so the client, the facade and
/// the caller all observe the same token state.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<BearerToken>>>,
}

impl TokenStore {
    /// Create a store holding an optional initial token.
    #[must_use]
    pub fn new(initial: Option<BearerToken>) -> Self {
        Self {
            token: Arc::new(RwLock::new(initial)),
        }
    }

    /// Replace the cached token.
    pub fn set(&self, token: BearerToken) {
        *self.token.write() = Some(token);
    }

    /// Discard the cached token.
    pub fn clear(&self) {
        *self.token.write() = None;
    }

    /// Copy of the cached token, if any.
    #[must_use]
    pub fn get(&self) -> Option<BearerToken> {
        self.token.read().clone()
    }

    /// Whether a token is cached.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.token.read().is_some()
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// One symbol's quote snapshot from `GET /api/ltp`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtpSnapshot {
    /// Symbol identifier.
    pub symbol: Symbol,
    /// Last traded price.
    pub ltp: Decimal,
    /// Absolute change.
    #[serde(default)]
    pub change: Decimal,
    /// Percent change.
    #[serde(default)]
    pub change_percent: Decimal,
    /// Instant the backend observed this price.
    pub timestamp: DateTime<Utc>,
}

impl LtpSnapshot {
    /// Convert into a snapshot-origin quote record.
    #[must_use]
    pub fn into_quote(self) -> SymbolQuote {
        SymbolQuote {
            symbol: self.symbol,
            last_price: self.ltp,
            change: self.change,
            change_percent: self.change_percent,
            source_ts: self.timestamp,
            origin: QuoteOrigin::Snapshot,
        }
    }
}

/// One scanner alert row from `GET /api/scanner`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerAlertRow {
    /// Symbol the alert fired for.
    pub symbol: Symbol,
    /// Alert classification wire string.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Last traded price at alert time.
    pub ltp: Decimal,
    /// Percent change at alert time.
    #[serde(default)]
    pub change_percent: Decimal,
    /// Volume multiple relative to average.
    #[serde(default)]
    pub volume_change: Decimal,
    /// Open-interest change percent, when reported.
    #[serde(default)]
    pub oi_change: Option<Decimal>,
    /// Instant the scanner observed the condition.
    pub timestamp: DateTime<Utc>,
}

impl ScannerAlertRow {
    /// Convert into the immutable alert fact.
    #[must_use]
    pub fn into_alert_event(self) -> AlertEvent {
        AlertEvent {
            symbol: self.symbol,
            kind: AlertKind::from_wire(&self.alert_type),
            last_price: self.ltp,
            change_percent: self.change_percent,
            volume_multiplier: self.volume_change,
            oi_change_percent: self.oi_change,
            observed_at: self.timestamp,
        }
    }
}

/// Recent-alert snapshot from `GET /api/scanner`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScannerSnapshot {
    /// Alert rows, newest first.
    #[serde(default)]
    pub alerts: Vec<ScannerAlertRow>,
}

// =============================================================================
// API Client
// =============================================================================

/// HTTP client for the backend's snapshot endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    /// Create a client from backend settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(settings: &BackendSettings, tokens: TokenStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// The token store shared with this client.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// `GET /api/status` — connectivity/health summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the Status Publisher
    /// treats any success as "backend reachable".
    pub async fn status(&self) -> Result<serde_json::Value, ApiError> {
        self.get_json("/api/status", &[]).await
    }

    /// `GET /api/ltp?symbol=` — one symbol's quote snapshot.
    ///
    /// # Errors
    ///
    /// Returns a per-symbol error; callers batching symbols translate
    /// it into a placeholder outcome.
    pub async fn ltp(&self, symbol: &str) -> Result<LtpSnapshot, ApiError> {
        self.get_json("/api/ltp", &[("symbol", symbol)]).await
    }

    /// `GET /api/option-chain?symbol=&expiry=` — chain snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or decode fails.
    pub async fn option_chain(
        &self,
        symbol: &str,
        expiry: Option<&str>,
    ) -> Result<serde_json::Value, ApiError> {
        let mut params = vec![("symbol", symbol)];
        if let Some(expiry) = expiry {
            params.push(("expiry", expiry));
        }
        self.get_json("/api/option-chain", &params).await
    }

    /// `GET /api/signal?symbol=` — derived signal snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or decode fails.
    pub async fn signal(&self, symbol: &str) -> Result<serde_json::Value, ApiError> {
        self.get_json("/api/signal", &[("symbol", symbol)]).await
    }

    /// `GET /api/scanner?...` — recent alert snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or decode fails.
    pub async fn scanner(&self, filters: &[(&str, &str)]) -> Result<ScannerSnapshot, ApiError> {
        self.get_json("/api/scanner", filters).await
    }

    /// Issue a GET request and decode the JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.get(&url).query(params);

        if let Some(token) = self.tokens.get() {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "Backend rejected credential; clearing cached token");
            self.tokens.clear();
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_store_set_clear() {
        let store = TokenStore::default();
        assert!(!store.is_present());

        store.set(BearerToken::new("abc".to_string()));
        assert!(store.is_present());
        assert_eq!(store.get().unwrap().as_str(), "abc");

        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn token_store_clones_share_state() {
        let store = TokenStore::default();
        let shared = store.clone();

        store.set(BearerToken::new("abc".to_string()));
        assert!(shared.is_present());

        shared.clear();
        assert!(!store.is_present());
    }

    #[test]
    fn ltp_snapshot_decodes_camel_case() {
        let json = r#"{
            "symbol": "NIFTY",
            "ltp": 24510.5,
            "change": 120.25,
            "changePercent": 0.49,
            "timestamp": "2024-06-03T09:15:00Z"
        }"#;

        let snapshot: LtpSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.symbol, "NIFTY");
        assert_eq!(snapshot.change_percent, Decimal::new(49, 2));

        let quote = snapshot.into_quote();
        assert_eq!(quote.origin, QuoteOrigin::Snapshot);
        assert_eq!(quote.last_price, Decimal::new(245_105, 1));
    }

    #[test]
    fn ltp_snapshot_defaults_optional_fields() {
        let json = r#"{
            "symbol": "NIFTY",
            "ltp": 100,
            "timestamp": "2024-06-03T09:15:00Z"
        }"#;

        let snapshot: LtpSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.change, Decimal::ZERO);
        assert_eq!(snapshot.change_percent, Decimal::ZERO);
    }

    #[test]
    fn scanner_row_converts_to_alert_event() {
        let json = r#"{
            "symbol": "BANKNIFTY",
            "type": "VOLUME_SPIKE",
            "ltp": 45000,
            "changePercent": 1.2,
            "volumeChange": 6.8,
            "oiChange": 12.3,
            "timestamp": "2024-06-03T10:00:00Z"
        }"#;

        let row: ScannerAlertRow = serde_json::from_str(json).unwrap();
        let fact = row.into_alert_event();
        assert_eq!(fact.kind, AlertKind::VolumeSpike);
        assert_eq!(fact.volume_multiplier, Decimal::new(68, 1));
        assert_eq!(fact.oi_change_percent, Some(Decimal::new(123, 1)));
    }

    #[test]
    fn scanner_snapshot_defaults_to_empty() {
        let snapshot: ScannerSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.alerts.is_empty());
    }
}
