//! Stream Event Types
//!
//! The closed set of events the persistent connection can deliver and
//! the commands the client can send upstream. Dispatch and
//! reconciliation match on these variants exhaustively; there is no
//! stringly-typed payload access anywhere past the codec.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::market::{AlertEvent, AlertKind, Symbol};

// =============================================================================
// Event Kinds
// =============================================================================

/// Identifier for a stream event kind, used as the fan-out key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Last-traded-price update for one symbol.
    LtpUpdate,
    /// Scanner alert for one symbol.
    ScannerAlert,
}

impl EventKind {
    /// All event kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::LtpUpdate, Self::ScannerAlert]
    }

    /// Wire name of this event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LtpUpdate => "ltp_update",
            Self::ScannerAlert => "scanner_alert",
        }
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// A streamed last-traded-price update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LtpUpdate {
    /// Symbol the update is for.
    pub symbol: Symbol,
    /// Last traded price.
    pub ltp: Decimal,
    /// Absolute change.
    pub change: Decimal,
    /// Percent change.
    pub change_percent: Decimal,
    /// Instant the server observed this price.
    pub source_ts: DateTime<Utc>,
}

/// A streamed scanner alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerAlert {
    /// Symbol the alert fired for.
    pub symbol: Symbol,
    /// Alert classification.
    pub kind: AlertKind,
    /// Last traded price at alert time.
    pub ltp: Decimal,
    /// Absolute change at alert time.
    pub change: Decimal,
    /// Percent change at alert time.
    pub change_percent: Decimal,
    /// Traded volume.
    pub volume: u64,
    /// Volume multiple relative to average.
    pub volume_multiplier: Decimal,
    /// Open interest, when reported.
    pub oi: Option<u64>,
    /// Open-interest change percent, when reported.
    pub oi_change_percent: Option<Decimal>,
    /// Instant the scanner observed the condition.
    pub observed_at: DateTime<Utc>,
}

impl ScannerAlert {
    /// Convert into the immutable alert fact stored for retention.
    #[must_use]
    pub fn into_alert_event(self) -> AlertEvent {
        AlertEvent {
            symbol: self.symbol,
            kind: self.kind,
            last_price: self.ltp,
            change_percent: self.change_percent,
            volume_multiplier: self.volume_multiplier,
            oi_change_percent: self.oi_change_percent,
            observed_at: self.observed_at,
        }
    }
}

// =============================================================================
// Events and Commands
// =============================================================================

/// A decoded server-pushed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Last-traded-price update.
    LtpUpdate(LtpUpdate),
    /// Scanner alert.
    ScannerAlert(ScannerAlert),
}

impl StreamEvent {
    /// The kind this event dispatches under.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::LtpUpdate(_) => EventKind::LtpUpdate,
            Self::ScannerAlert(_) => EventKind::ScannerAlert,
        }
    }
}

/// A client-to-server command on the persistent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamCommand {
    /// Ask the server to push updates for a symbol.
    Subscribe {
        /// Symbol to add to the server-side filter.
        symbol: Symbol,
    },
    /// Ask the server to stop pushing updates for a symbol.
    Unsubscribe {
        /// Symbol to remove from the server-side filter.
        symbol: Symbol,
    },
}
