//! Stream Wire Messages
//!
//! JSON envelope and payload shapes for the persistent connection.
//! Every frame is `{"event": "<name>", "data": {...}}` in both
//! directions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::events::{LtpUpdate, ScannerAlert, StreamCommand};
use crate::domain::market::{AlertKind, Symbol};

/// Outer frame shared by events and commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Event or command name.
    pub event: String,
    /// Kind-specific payload.
    pub data: serde_json::Value,
}

/// Payload of an `ltp_update` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LtpUpdateMessage {
    /// Symbol the update is for.
    pub symbol: Symbol,
    /// Last traded price.
    pub ltp: Decimal,
    /// Absolute change.
    #[serde(default)]
    pub change: Decimal,
    /// Percent change.
    #[serde(default)]
    pub change_percent: Decimal,
    /// Server-side observation instant. Older feeds omit it; the
    /// codec stamps arrival time so the monotonic rule still applies.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LtpUpdateMessage {
    /// Convert into the domain event, stamping `received_at` when the
    /// server did not provide a timestamp.
    #[must_use]
    pub fn into_event(self, received_at: DateTime<Utc>) -> LtpUpdate {
        LtpUpdate {
            symbol: self.symbol,
            ltp: self.ltp,
            change: self.change,
            change_percent: self.change_percent,
            source_ts: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Payload of a `scanner_alert` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerAlertMessage {
    /// Symbol the alert fired for.
    pub symbol: Symbol,
    /// Alert classification wire string.
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Last traded price at alert time.
    pub ltp: Decimal,
    /// Absolute change at alert time.
    #[serde(default)]
    pub change: Decimal,
    /// Percent change at alert time.
    #[serde(default)]
    pub change_percent: Decimal,
    /// Traded volume.
    #[serde(default)]
    pub volume: u64,
    /// Volume multiple relative to average.
    #[serde(default)]
    pub volume_change: Decimal,
    /// Open interest, when reported.
    #[serde(default)]
    pub oi: Option<u64>,
    /// Open-interest change percent, when reported.
    #[serde(default)]
    pub oi_change: Option<Decimal>,
    /// Instant the scanner observed the condition.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ScannerAlertMessage {
    /// Convert into the domain event.
    #[must_use]
    pub fn into_event(self, received_at: DateTime<Utc>) -> ScannerAlert {
        ScannerAlert {
            symbol: self.symbol,
            kind: AlertKind::from_wire(&self.alert_type),
            ltp: self.ltp,
            change: self.change,
            change_percent: self.change_percent,
            volume: self.volume,
            volume_multiplier: self.volume_change,
            oi: self.oi,
            oi_change_percent: self.oi_change,
            observed_at: self.timestamp.unwrap_or(received_at),
        }
    }
}

/// Payload of a `subscribe`/`unsubscribe` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Symbol the command applies to.
    pub symbol: Symbol,
}

impl CommandMessage {
    /// The wire name and payload for a command.
    #[must_use]
    pub fn from_command(command: &StreamCommand) -> (&'static str, Self) {
        match command {
            StreamCommand::Subscribe { symbol } => ("subscribe", Self {
                symbol: symbol.clone(),
            }),
            StreamCommand::Unsubscribe { symbol } => ("unsubscribe", Self {
                symbol: symbol.clone(),
            }),
        }
    }
}
