//! Market Synchronization Facade
//!
//! Wires the snapshot loader, stream client, reconciliation store and
//! status publisher into one service. Snapshot results and streamed
//! deltas both land in the [`QuoteStore`] under its freshness policy,
//! so callers read one authoritative record per symbol regardless of
//! which path delivered it last.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::market::Symbol;
use crate::domain::store::QuoteStore;
use crate::domain::subscription::{EventRegistry, InterestSet, ObserverId};
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::rest::snapshot::{SnapshotLoader, SnapshotOutcome};
use crate::infrastructure::rest::{ApiClient, ApiError, TokenStore};
use crate::infrastructure::status::{StatusPublisher, SystemStatus};
use crate::infrastructure::stream::{ConnectionState, StreamClient, StreamClientConfig};

/// The synchronization core's public entry point.
///
/// Owns every moving part; consumers interact with the store, the
/// status publisher and the interest API and never touch the transport
/// directly.
pub struct MarketSync {
    registry: Arc<EventRegistry>,
    store: Arc<QuoteStore>,
    store_observers: (ObserverId, ObserverId),
    api: Arc<ApiClient>,
    loader: SnapshotLoader,
    client: Arc<StreamClient>,
    status: Arc<StatusPublisher>,
    shutdown: CancellationToken,
}

impl MarketSync {
    /// Build the sync core from configuration. No connection is made
    /// and no request is sent until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns an error if the REST client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, ApiError> {
        let tokens = TokenStore::new(config.token.clone());
        let api = Arc::new(ApiClient::new(&config.backend, tokens)?);
        let loader = SnapshotLoader::new(Arc::clone(&api));

        let registry = Arc::new(EventRegistry::new());
        let store = Arc::new(QuoteStore::new(config.store.alert_retention));
        let store_observers = store.attach(&registry);

        let client = Arc::new(StreamClient::new(
            StreamClientConfig::from_stream_settings(config.stream_url(), &config.stream),
            Arc::clone(&registry),
            Arc::new(InterestSet::new()),
        ));

        Ok(Self {
            registry,
            store,
            store_observers,
            api,
            loader,
            client,
            status: Arc::new(StatusPublisher::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Connect the stream and start mirroring its state into the
    /// status publisher.
    ///
    /// Idempotent: a live stream session is left alone. The stream
    /// session and the state mirror are the only background tasks;
    /// backend reachability is only probed when
    /// [`refresh_status`](Self::refresh_status) is called.
    pub fn start(&self) {
        self.client.connect();

        let status = Arc::clone(&self.status);
        let state_rx = self.client.state_watch();
        let cancel = self.shutdown.clone();
        tokio::spawn(status.mirror_stream_state(state_rx, cancel));
    }

    /// Probe backend reachability once and report the refreshed
    /// snapshot. Subscribers are notified only if the probe changed it.
    pub async fn refresh_status(&self) -> SystemStatus {
        self.status.probe_backend(&self.api).await;
        self.status.current()
    }

    /// Stop the status mirror, tear down the stream session and detach
    /// the store from the registry.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.client.disconnect();

        let (ltp_id, alert_id) = self.store_observers;
        self.registry
            .unsubscribe(crate::domain::events::EventKind::LtpUpdate, ltp_id);
        self.registry
            .unsubscribe(crate::domain::events::EventKind::ScannerAlert, alert_id);
    }

    // =========================================================================
    // Snapshot Loading
    // =========================================================================

    /// Fetch quote snapshots for the given symbols and reconcile them
    /// into the store.
    ///
    /// Each symbol resolves independently; a failed fetch leaves the
    /// store untouched, so readers see the zeroed placeholder until a
    /// later fetch or stream update fills it. A snapshot never
    /// regresses a record that streaming already advanced.
    pub async fn load_snapshots(&self, symbols: &[Symbol]) -> Vec<SnapshotOutcome> {
        let outcomes = self.loader.fetch_many(symbols).await;

        for outcome in &outcomes {
            if outcome.is_success() {
                self.store.apply_snapshot(outcome.quote.clone());
            }
        }

        outcomes
    }

    /// Seed the alert retention list from the scanner's REST snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or decode fails; the retained
    /// alerts are left untouched on failure.
    pub async fn load_alerts(&self, filters: &[(&str, &str)]) -> Result<usize, ApiError> {
        let snapshot = self.api.scanner(filters).await?;
        let seed: Vec<_> = snapshot
            .alerts
            .into_iter()
            .map(crate::infrastructure::rest::ScannerAlertRow::into_alert_event)
            .collect();
        let count = seed.len();
        self.store.replace_alerts(seed);
        Ok(count)
    }

    // =========================================================================
    // Interest
    // =========================================================================

    /// Watch a symbol: track interest and subscribe upstream when
    /// connected. Watching an already-watched symbol is a no-op.
    pub fn watch(&self, symbol: &str) {
        self.client.set_symbol_interest(symbol);
    }

    /// Stop watching a symbol. Unknown symbols are a no-op.
    pub fn unwatch(&self, symbol: &str) {
        self.client.clear_symbol_interest(symbol);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The reconciliation store.
    #[must_use]
    pub fn store(&self) -> &Arc<QuoteStore> {
        &self.store
    }

    /// The observer registry for consumers that want raw events.
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// The status publisher.
    #[must_use]
    pub fn status(&self) -> &Arc<StatusPublisher> {
        &self.status
    }

    /// The REST client, for one-off snapshot endpoints.
    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// The shared bearer token store.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    /// Current stream connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Reconnect manually after the retry budget was spent.
    pub fn reconnect(&self) {
        self.client.connect();
    }
}

impl std::fmt::Debug for MarketSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketSync")
            .field("connection_state", &self.connection_state())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
