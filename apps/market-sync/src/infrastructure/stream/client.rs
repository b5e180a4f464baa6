//! Stream Client
//!
//! Owns the single persistent WebSocket connection to the backend
//! event stream. Exactly one connection exists at a time; every decoded
//! event fans out through the shared [`EventRegistry`], so consumers
//! never hold their own sockets.
//!
//! # Lifecycle
//!
//! `connect` is idempotent: calling it while a session is connecting,
//! connected or retrying is a no-op. A dropped connection is retried
//! with exponential backoff until the attempt budget is spent, after
//! which the client parks in [`ConnectionState::Failed`] until a
//! manual `connect` starts a fresh session with a fresh budget. On
//! every successful (re)connect the full symbol interest set is
//! replayed upstream, since the server forgets interest across a
//! dropped connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::{CodecError, JsonCodec};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::events::StreamCommand;
use crate::domain::subscription::{EventRegistry, InterestSet};
use crate::infrastructure::config::StreamSettings;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Codec error on an outbound command.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,

    /// Reconnection attempt budget exhausted.
    #[error("maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

// =============================================================================
// Connection State
// =============================================================================

/// Observable lifecycle state of the stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No session exists.
    Disconnected,
    /// First connection attempt of a session is in flight.
    Connecting,
    /// Connection is established; events flow.
    Connected,
    /// Connection dropped; retrying with backoff.
    Reconnecting,
    /// Retry budget spent; waiting for a manual reconnect.
    Failed,
}

impl ConnectionState {
    /// Wire/display name for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
            Self::Failed => "FAILED",
        }
    }

    /// Whether a session is live (connecting, connected or retrying).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// WebSocket URL of the event stream.
    pub url: String,
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
}

impl StreamClientConfig {
    /// Create a configuration with default reconnection behavior.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Derive configuration from stream settings.
    #[must_use]
    pub fn from_stream_settings(url: String, settings: &StreamSettings) -> Self {
        Self {
            url,
            reconnect: ReconnectConfig::from_stream_settings(settings),
        }
    }
}

// =============================================================================
// Stream Client
// =============================================================================

/// One live session's handles.
///
/// The id ties state publications back to the session that made them:
/// a task whose id no longer matches the stored session has been
/// superseded and must not touch the published state.
struct Session {
    id: u64,
    cancel: CancellationToken,
    command_tx: mpsc::UnboundedSender<StreamCommand>,
}

/// WebSocket client multiplexing the backend event stream.
///
/// Holds the symbol interest set and the observer registry; decoded
/// events are dispatched synchronously from the read loop. Undecodable
/// frames are logged and dropped without tearing the connection down.
pub struct StreamClient {
    config: StreamClientConfig,
    codec: JsonCodec,
    registry: Arc<EventRegistry>,
    interest: Arc<InterestSet>,
    state_tx: watch::Sender<ConnectionState>,
    session: parking_lot::Mutex<Option<Session>>,
    session_seq: AtomicU64,
}

impl StreamClient {
    /// Create a new stream client. No connection is made until
    /// [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        config: StreamClientConfig,
        registry: Arc<EventRegistry>,
        interest: Arc<InterestSet>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            codec: JsonCodec::new(),
            registry,
            interest,
            state_tx,
            session: parking_lot::Mutex::new(None),
            session_seq: AtomicU64::new(0),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Watch receiver notified only when the state actually changes.
    #[must_use]
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The shared observer registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.registry
    }

    /// The shared symbol interest set.
    #[must_use]
    pub fn interest(&self) -> &Arc<InterestSet> {
        &self.interest
    }

    /// Start a session if none is live.
    ///
    /// A no-op while connecting, connected or retrying. From
    /// `Disconnected` or `Failed` this starts a fresh session with a
    /// fresh retry budget.
    pub fn connect(self: &Arc<Self>) {
        let mut session = self.session.lock();
        if self.state().is_active() {
            return;
        }
        if let Some(stale) = session.take() {
            stale.cancel.cancel();
        }

        let id = self.session_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *session = Some(Session {
            id,
            cancel: cancel.clone(),
            command_tx,
        });
        self.set_state(ConnectionState::Connecting);

        let client = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = client.run(id, cancel, command_rx).await {
                tracing::error!(error = %error, "Stream client stopped");
            }
        });
    }

    /// Tear down the live session, if any, and report `Disconnected`.
    ///
    /// The session lock is held across the state publication, so a
    /// session task racing this call cannot publish afterwards.
    pub fn disconnect(&self) {
        let mut session = self.session.lock();
        if let Some(live) = session.take() {
            live.cancel.cancel();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Mark a symbol as interesting and, when connected, subscribe
    /// upstream. Already-interesting symbols produce no traffic.
    pub fn set_symbol_interest(&self, symbol: &str) {
        if let Some(command) = self.interest.set(symbol) {
            self.forward_if_connected(command);
        }
    }

    /// Clear interest in a symbol and, when connected, unsubscribe
    /// upstream. Unknown symbols produce no traffic.
    pub fn clear_symbol_interest(&self, symbol: &str) {
        if let Some(command) = self.interest.clear(symbol) {
            self.forward_if_connected(command);
        }
    }

    fn forward_if_connected(&self, command: StreamCommand) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        if let Some(session) = self.session.lock().as_ref() {
            let _ = session.command_tx.send(command);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::info!(from = %current, to = %state, "Stream connection state changed");
                *current = state;
                true
            }
        });
    }

    /// Publish a transition on behalf of a session task, but only while
    /// that session is still the one the client owns.
    ///
    /// The session lock serializes the ownership check with `connect`
    /// and `disconnect`, so a superseded task can never publish over
    /// the state they set.
    fn set_state_for(&self, session_id: u64, state: ConnectionState) -> bool {
        let session = self.session.lock();
        if !session.as_ref().is_some_and(|live| live.id == session_id) {
            return false;
        }
        self.set_state(state);
        true
    }

    /// Drop the session and park in `Failed`, but only while the given
    /// session is still the one the client owns.
    fn fail_session(&self, session_id: u64) -> bool {
        let mut session = self.session.lock();
        if !session.as_ref().is_some_and(|live| live.id == session_id) {
            return false;
        }
        session.take();
        self.set_state(ConnectionState::Failed);
        true
    }

    /// Session loop: connect, process, retry with backoff, park in
    /// `Failed` when the budget is spent.
    async fn run(
        self: Arc<Self>,
        session_id: u64,
        cancel: CancellationToken,
        mut command_rx: mpsc::UnboundedReceiver<StreamCommand>,
    ) -> Result<(), StreamClientError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match self
                .connect_and_run(session_id, &cancel, &mut command_rx, &mut policy)
                .await
            {
                Ok(()) => {
                    tracing::info!("Stream session closed gracefully");
                    return Ok(());
                }
                Err(error) => {
                    // A cancelled session must not fight disconnect()
                    // over the published state.
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    tracing::warn!(error = %error, "Stream connection error");

                    if let Some(delay) = policy.next_delay() {
                        if !self.set_state_for(session_id, ConnectionState::Reconnecting) {
                            return Ok(());
                        }
                        tracing::info!(
                            attempt = policy.attempt_count(),
                            delay_ms = delay.as_millis(),
                            "Reconnecting to event stream"
                        );

                        tokio::select! {
                            () = cancel.cancelled() => return Ok(()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else if self.fail_session(session_id) {
                        return Err(StreamClientError::MaxReconnectAttemptsExceeded);
                    } else {
                        // Superseded while retrying; the session that
                        // replaced this one owns the state now.
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Connect, replay the interest set, then process frames and
    /// outbound commands until error or cancellation.
    async fn connect_and_run(
        &self,
        session_id: u64,
        cancel: &CancellationToken,
        command_rx: &mut mpsc::UnboundedReceiver<StreamCommand>,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamClientError> {
        tracing::info!(url = %self.config.url, "Connecting to event stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        if !self.set_state_for(session_id, ConnectionState::Connected) {
            return Ok(());
        }
        policy.reset();

        for command in self.interest.replay_commands() {
            let frame = self.codec.encode_command(&command)?;
            write.send(Message::Text(frame.into())).await?;
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                command = command_rx.recv() => {
                    match command {
                        Some(command) => {
                            let frame = self.codec.encode_command(&command)?;
                            write.send(Message::Text(frame.into())).await?;
                        }
                        // Sender dropped with the session; shut down.
                        None => return Ok(()),
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => match self.codec.decode(&text) {
                            Ok(event) => self.registry.dispatch(&event),
                            Err(error) => {
                                tracing::warn!(error = %error, "Dropping undecodable frame");
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Server sent close frame");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => return Err(error.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(StreamClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("interest", &self.interest.len())
            .finish_non_exhaustive()
    }
}
