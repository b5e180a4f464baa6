//! Reconciliation Store
//!
//! Merges one-shot snapshot results and streamed deltas into a single
//! authoritative record per symbol, and owns the bounded retention
//! list of scanner alerts.
//!
//! # Freshness policy
//!
//! - `source_ts` is monotonically non-decreasing per symbol. A
//!   streamed update that is older than or equal to the stored record
//!   is discarded whole, never merged field-by-field.
//! - A snapshot write never regresses a value that streaming already
//!   advanced: it is discarded when a stream-origin record with an
//!   equal-or-newer timestamp exists.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use super::events::{EventKind, StreamEvent};
use super::market::{AlertEvent, QuoteOrigin, Symbol, SymbolQuote};
use super::subscription::{EventRegistry, ObserverId};

/// Default number of retained alerts (most recent first).
pub const DEFAULT_ALERT_RETENTION: usize = 50;

/// Authoritative per-symbol quote state plus the alert retention list.
///
/// All reads return copies; callers can never mutate internal state
/// through a returned value. Reads and writes of the quote map are
/// atomic with respect to each other (single writer at a time), so
/// concurrent stream dispatch and snapshot writes cannot produce torn
/// records.
pub struct QuoteStore {
    quotes: RwLock<HashMap<Symbol, SymbolQuote>>,
    alerts: RwLock<VecDeque<AlertEvent>>,
    alert_retention: usize,
}

impl Default for QuoteStore {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_RETENTION)
    }
}

impl QuoteStore {
    /// Create a store retaining at most `alert_retention` alerts.
    #[must_use]
    pub fn new(alert_retention: usize) -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
            alerts: RwLock::new(VecDeque::new()),
            alert_retention,
        }
    }

    // =========================================================================
    // Quote Reconciliation
    // =========================================================================

    /// Apply a snapshot-origin quote.
    ///
    /// Returns `true` if the record was written. The write is skipped
    /// when a stream-origin record with an equal-or-newer timestamp
    /// exists, or when any stored record is strictly newer.
    pub fn apply_snapshot(&self, quote: SymbolQuote) -> bool {
        let mut quotes = self.quotes.write();
        if let Some(existing) = quotes.get(&quote.symbol)
            && existing.is_known()
        {
            let stream_is_fresh =
                existing.origin == QuoteOrigin::Stream && existing.source_ts >= quote.source_ts;
            if stream_is_fresh || existing.source_ts > quote.source_ts {
                return false;
            }
        }

        let record = SymbolQuote {
            origin: QuoteOrigin::Snapshot,
            ..quote
        };
        quotes.insert(record.symbol.clone(), record);
        true
    }

    /// Apply a stream-origin quote under the monotonic timestamp rule.
    ///
    /// Returns `true` if the record was written; an update that is
    /// older than or equal to the stored record is discarded.
    pub fn apply_stream(&self, quote: SymbolQuote) -> bool {
        let mut quotes = self.quotes.write();
        if let Some(existing) = quotes.get(&quote.symbol)
            && existing.is_known()
            && existing.source_ts >= quote.source_ts
        {
            return false;
        }

        let record = SymbolQuote {
            origin: QuoteOrigin::Stream,
            ..quote
        };
        quotes.insert(record.symbol.clone(), record);
        true
    }

    /// Current record for a symbol.
    ///
    /// Unknown symbols get the defined zeroed placeholder rather than
    /// an absent value, so callers render a deterministic state.
    #[must_use]
    pub fn quote(&self, symbol: &str) -> SymbolQuote {
        self.quotes
            .read()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| SymbolQuote::unknown(symbol))
    }

    /// Copy of every stored record, keyed by symbol.
    #[must_use]
    pub fn all_quotes(&self) -> HashMap<Symbol, SymbolQuote> {
        self.quotes.read().clone()
    }

    /// Drop every quote record. The only deletion path.
    pub fn clear(&self) {
        self.quotes.write().clear();
    }

    // =========================================================================
    // Alert Retention
    // =========================================================================

    /// Prepend an alert, evicting the oldest beyond the retention cap.
    pub fn push_alert(&self, alert: AlertEvent) {
        let mut alerts = self.alerts.write();
        alerts.push_front(alert);
        alerts.truncate(self.alert_retention);
    }

    /// Replace the retained alerts with a snapshot, newest first.
    ///
    /// Used to seed the list from the scanner's REST snapshot; the
    /// retention cap still applies.
    pub fn replace_alerts(&self, seed: Vec<AlertEvent>) {
        let mut alerts = self.alerts.write();
        alerts.clear();
        alerts.extend(seed.into_iter().take(self.alert_retention));
    }

    /// Copy of the retained alerts, newest first.
    #[must_use]
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.alerts.read().iter().cloned().collect()
    }

    /// The retention cap.
    #[must_use]
    pub const fn alert_retention(&self) -> usize {
        self.alert_retention
    }

    // =========================================================================
    // Registry Wiring
    // =========================================================================

    /// Register this store as an observer of both stream event kinds.
    ///
    /// Returns the observer ids so the owner can detach the store on
    /// teardown.
    pub fn attach(self: &Arc<Self>, registry: &EventRegistry) -> (ObserverId, ObserverId) {
        let ltp_id = registry.next_observer_id();
        let store = Arc::clone(self);
        registry.subscribe(
            EventKind::LtpUpdate,
            ltp_id,
            Arc::new(move |event| {
                if let StreamEvent::LtpUpdate(update) = event {
                    store.apply_stream(SymbolQuote {
                        symbol: update.symbol.clone(),
                        last_price: update.ltp,
                        change: update.change,
                        change_percent: update.change_percent,
                        source_ts: update.source_ts,
                        origin: QuoteOrigin::Stream,
                    });
                }
            }),
        );

        let alert_id = registry.next_observer_id();
        let store = Arc::clone(self);
        registry.subscribe(
            EventKind::ScannerAlert,
            alert_id,
            Arc::new(move |event| {
                if let StreamEvent::ScannerAlert(alert) = event {
                    store.push_alert(alert.clone().into_alert_event());
                }
            }),
        );

        (ltp_id, alert_id)
    }
}

impl std::fmt::Debug for QuoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteStore")
            .field("quotes", &self.quotes.read().len())
            .field("alerts", &self.alerts.read().len())
            .field("alert_retention", &self.alert_retention)
            .finish()
    }
}
