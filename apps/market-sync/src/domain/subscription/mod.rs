//! Subscription Management
//!
//! Two independent concerns live here:
//!
//! - [`EventRegistry`]: fan-out of decoded stream events to registered
//!   observers, decoupled from the transport. Dispatch is synchronous
//!   and in registration order; a failing observer never prevents the
//!   remaining observers from running.
//! - [`InterestSet`]: the set of symbols the client wants the server
//!   to push updates for. Pure domain state; it returns the upstream
//!   command a mutation implies and can replay the full set after a
//!   reconnect, since the server forgets interest across a dropped
//!   connection.

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::events::{EventKind, StreamCommand, StreamEvent};
use super::market::Symbol;

// =============================================================================
// Observer Types
// =============================================================================

/// Unique identifier for a registered observer.
///
/// Minted by [`EventRegistry::next_observer_id`]; the same id may be
/// registered under several event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Callback invoked with every dispatched event of a subscribed kind.
pub type Observer = Arc<dyn Fn(&StreamEvent) + Send + Sync>;

// =============================================================================
// Event Registry
// =============================================================================

/// Maps event kinds to ordered sets of observers.
///
/// Registration and de-registration are idempotent per
/// `(kind, ObserverId)` pair. Dispatch invokes observers synchronously
/// in registration order and isolates per-observer panics.
///
/// # Example
///
/// ```rust
/// use market_sync::domain::events::EventKind;
/// use market_sync::domain::subscription::EventRegistry;
/// use std::sync::Arc;
///
/// let registry = EventRegistry::new();
/// let id = registry.next_observer_id();
/// registry.subscribe(EventKind::LtpUpdate, id, Arc::new(|_event| {}));
/// assert_eq!(registry.observer_count(EventKind::LtpUpdate), 1);
///
/// registry.unsubscribe(EventKind::LtpUpdate, id);
/// assert_eq!(registry.observer_count(EventKind::LtpUpdate), 0);
/// ```
pub struct EventRegistry {
    observers: RwLock<HashMap<EventKind, Vec<(ObserverId, Observer)>>>,
    next_id: AtomicU64,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Mint a fresh observer identifier.
    #[must_use]
    pub fn next_observer_id(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register an observer for an event kind.
    ///
    /// Re-registering an id already present under this kind is a
    /// no-op; the original callback and its position are kept.
    pub fn subscribe(&self, kind: EventKind, id: ObserverId, observer: Observer) {
        let mut map = self.observers.write();
        let entries = map.entry(kind).or_default();
        if entries.iter().any(|(existing, _)| *existing == id) {
            return;
        }
        entries.push((id, observer));
    }

    /// Remove an observer from an event kind.
    ///
    /// Removing an absent pair is a no-op. The observer receives no
    /// further dispatches; a dispatch already in flight is unaffected.
    pub fn unsubscribe(&self, kind: EventKind, id: ObserverId) {
        let mut map = self.observers.write();
        if let Some(entries) = map.get_mut(&kind) {
            entries.retain(|(existing, _)| *existing != id);
        }
    }

    /// Dispatch an event to every observer registered for its kind.
    ///
    /// Observers run synchronously in registration order. A panicking
    /// observer is logged and skipped; the rest still run.
    pub fn dispatch(&self, event: &StreamEvent) {
        let observers: Vec<(ObserverId, Observer)> = self
            .observers
            .read()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for (id, observer) in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::error!(
                    kind = event.kind().as_str(),
                    observer_id = id.0,
                    "Observer panicked during dispatch"
                );
            }
        }
    }

    /// Number of observers registered for a kind.
    #[must_use]
    pub fn observer_count(&self, kind: EventKind) -> usize {
        self.observers.read().get(&kind).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let map = self.observers.read();
        let mut counts = f.debug_struct("EventRegistry");
        for kind in EventKind::all() {
            counts.field(kind.as_str(), &map.get(kind).map_or(0, Vec::len));
        }
        counts.finish()
    }
}

// =============================================================================
// Interest Set
// =============================================================================

/// Symbols the client has asked the server to push updates for.
///
/// Mutated only by explicit set/clear calls. Mutations return the
/// upstream command they imply; whether the command is actually sent
/// depends on the connection state, which is the stream client's
/// concern. After a reconnect the full set is replayed, one subscribe
/// per symbol.
#[derive(Debug, Default)]
pub struct InterestSet {
    symbols: RwLock<HashSet<Symbol>>,
}

impl InterestSet {
    /// Create an empty interest set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a symbol as interesting.
    ///
    /// Returns the subscribe command to send upstream, or `None` if
    /// the symbol was already interesting.
    #[must_use]
    pub fn set(&self, symbol: &str) -> Option<StreamCommand> {
        self.symbols
            .write()
            .insert(symbol.to_string())
            .then(|| StreamCommand::Subscribe {
                symbol: symbol.to_string(),
            })
    }

    /// Clear interest in a symbol.
    ///
    /// Returns the unsubscribe command to send upstream, or `None` if
    /// the symbol was not interesting.
    #[must_use]
    pub fn clear(&self, symbol: &str) -> Option<StreamCommand> {
        self.symbols
            .write()
            .remove(symbol)
            .then(|| StreamCommand::Unsubscribe {
                symbol: symbol.to_string(),
            })
    }

    /// Commands restoring the full interest set on a fresh connection.
    ///
    /// Exactly one subscribe per interesting symbol.
    #[must_use]
    pub fn replay_commands(&self) -> Vec<StreamCommand> {
        self.symbols
            .read()
            .iter()
            .cloned()
            .map(|symbol| StreamCommand::Subscribe { symbol })
            .collect()
    }

    /// Whether a symbol is currently interesting.
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.read().contains(symbol)
    }

    /// Number of interesting symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.read().len()
    }

    /// Whether no symbols are interesting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.read().is_empty()
    }
}
