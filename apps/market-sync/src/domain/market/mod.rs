//! Market Data Types
//!
//! Per-symbol quote records and scanner alert events. A quote is the
//! freshest known state for one symbol, tagged with where it came from
//! so the reconciliation store can enforce its freshness ordering.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A symbol string (index or instrument identifier, e.g. "NIFTY").
pub type Symbol = String;

// =============================================================================
// Quotes
// =============================================================================

/// Origin tag on a stored quote record.
///
/// Used to enforce the freshness ordering between one-shot snapshots
/// and streamed updates. `Unknown` only ever appears on placeholder
/// records that have never seen data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteOrigin {
    /// Value came from a request/response snapshot fetch.
    Snapshot,
    /// Value came from a streamed incremental update.
    Stream,
    /// Placeholder; no data has been observed for this symbol.
    Unknown,
}

/// Current quote state for a single symbol.
///
/// Exactly one record exists per symbol in the store; `source_ts` is
/// monotonically non-decreasing for the lifetime of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolQuote {
    /// Symbol identifier (unique key).
    pub symbol: Symbol,
    /// Last traded price.
    pub last_price: Decimal,
    /// Absolute change.
    pub change: Decimal,
    /// Percent change.
    pub change_percent: Decimal,
    /// Instant the source observed this value.
    pub source_ts: DateTime<Utc>,
    /// Where the current value came from.
    pub origin: QuoteOrigin,
}

impl SymbolQuote {
    /// The defined placeholder for a symbol with no observed data.
    ///
    /// Zeroed prices, epoch timestamp and `QuoteOrigin::Unknown`, so
    /// any genuine snapshot or stream value wins the monotonic race.
    #[must_use]
    pub fn unknown(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            last_price: Decimal::ZERO,
            change: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            source_ts: DateTime::UNIX_EPOCH,
            origin: QuoteOrigin::Unknown,
        }
    }

    /// Whether this record holds observed data.
    #[must_use]
    pub fn is_known(&self) -> bool {
        self.origin != QuoteOrigin::Unknown
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Scanner alert classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Sudden price move beyond the scanner threshold.
    PriceExplosion,
    /// Traded volume spike relative to average.
    VolumeSpike,
    /// Significant open-interest change.
    OiChange,
    /// Anything the scanner emits that we do not classify.
    Other,
}

impl AlertKind {
    /// Parse the scanner's wire string; unrecognised values map to
    /// [`AlertKind::Other`].
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "PRICE_EXPLOSION" => Self::PriceExplosion,
            "VOLUME_SPIKE" => Self::VolumeSpike,
            "OI_CHANGE" => Self::OiChange,
            _ => Self::Other,
        }
    }
}

/// A discrete, immutable scanner alert.
///
/// Alerts are append-only facts ordered by arrival; they are never
/// merged with one another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertEvent {
    /// Symbol the alert fired for.
    pub symbol: Symbol,
    /// Alert classification.
    pub kind: AlertKind,
    /// Last traded price at alert time.
    pub last_price: Decimal,
    /// Percent change at alert time.
    pub change_percent: Decimal,
    /// Volume multiple relative to average.
    pub volume_multiplier: Decimal,
    /// Open-interest change percent, when the scanner reports it.
    pub oi_change_percent: Option<Decimal>,
    /// Instant the scanner observed the condition.
    pub observed_at: DateTime<Utc>,
}
