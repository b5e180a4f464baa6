//! System Status Publisher
//!
//! Aggregates backend reachability and stream connection state into a
//! single observable status snapshot. Subscribers receive a
//! notification only when the snapshot actually changes. Backend
//! reachability is probed on demand, never polled; the stream state
//! mirror is the publisher's only background task.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::rest::{ApiClient, ApiError};
use crate::infrastructure::stream::ConnectionState;

// =============================================================================
// Status Types
// =============================================================================

/// Backend reachability as last observed by the status probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendHealth {
    /// No probe has completed yet.
    Unknown,
    /// Last probe received an HTTP response.
    Reachable,
    /// Last probe failed at the transport level.
    Unreachable,
}

/// Overall health derived from the component states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Backend reachable and stream connected.
    Healthy,
    /// Exactly one of the two components is up.
    Degraded,
    /// Neither component is up.
    Unhealthy,
}

/// One observable snapshot of system status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    /// Backend reachability.
    pub backend: BackendHealth,
    /// Stream connection state.
    pub stream: ConnectionState,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            backend: BackendHealth::Unknown,
            stream: ConnectionState::Disconnected,
        }
    }
}

impl SystemStatus {
    /// Derive overall health from the component states.
    #[must_use]
    pub const fn health(&self) -> HealthStatus {
        let backend_up = matches!(self.backend, BackendHealth::Reachable);
        let stream_up = matches!(self.stream, ConnectionState::Connected);

        match (backend_up, stream_up) {
            (true, true) => HealthStatus::Healthy,
            (false, false) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        }
    }
}

// =============================================================================
// Status Publisher
// =============================================================================

/// Change-only publisher of [`SystemStatus`] snapshots.
///
/// Component updates that do not change the snapshot are swallowed, so
/// a subscriber that reacts to every notification reacts only to real
/// transitions.
#[derive(Debug)]
pub struct StatusPublisher {
    status_tx: watch::Sender<SystemStatus>,
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusPublisher {
    /// Create a publisher with both components in their initial state.
    #[must_use]
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(SystemStatus::default());
        Self { status_tx }
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> SystemStatus {
        *self.status_tx.borrow()
    }

    /// Watch receiver notified only on snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SystemStatus> {
        self.status_tx.subscribe()
    }

    /// Record a backend health observation.
    pub fn set_backend_health(&self, backend: BackendHealth) {
        self.status_tx.send_if_modified(|status| {
            if status.backend == backend {
                false
            } else {
                tracing::info!(from = ?status.backend, to = ?backend, "Backend health changed");
                status.backend = backend;
                true
            }
        });
    }

    /// Record a stream connection state observation.
    pub fn set_stream_state(&self, stream: ConnectionState) {
        self.status_tx.send_if_modified(|status| {
            if status.stream == stream {
                false
            } else {
                status.stream = stream;
                true
            }
        });
    }

    /// Probe the backend once and record the result.
    ///
    /// Any HTTP response counts as reachable, including auth failures;
    /// only transport-level failures mark the backend unreachable.
    pub async fn probe_backend(&self, api: &ApiClient) {
        let health = match api.status().await {
            Ok(_)
            | Err(ApiError::Unauthorized | ApiError::Http { .. } | ApiError::Decode(_)) => {
                BackendHealth::Reachable
            }
            Err(error) => {
                tracing::warn!(error = %error, "Backend status probe failed");
                BackendHealth::Unreachable
            }
        };
        self.set_backend_health(health);
    }

    /// Mirror stream connection state changes until the stream client
    /// is dropped or the token is cancelled.
    pub async fn mirror_stream_state(
        self: Arc<Self>,
        mut state_rx: watch::Receiver<ConnectionState>,
        cancel: CancellationToken,
    ) {
        self.set_stream_state(*state_rx.borrow());
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let state = *state_rx.borrow_and_update();
                    self.set_stream_state(state);
                }
            }
        }
    }
}
