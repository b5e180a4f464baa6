#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Market Sync - Real-Time Market Data Synchronization Core
//!
//! Keeps a local quote store consistent with a trading backend over
//! two transports: one-shot REST snapshots and a single persistent
//! WebSocket event stream. Snapshot results and streamed deltas are
//! reconciled under a per-symbol monotonic freshness rule, so readers
//! always see the latest known record no matter which path delivered
//! it.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Reconciliation logic and data types
//!   - `market`: Quote and alert types
//!   - `events`: Stream event and command types
//!   - `subscription`: Observer registry and symbol interest set
//!   - `store`: Reconciliation store with freshness policy
//!
//! - **Application**: Use cases
//!   - `sync`: The synchronization facade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `rest`: Backend REST client and snapshot loader
//!   - `stream`: WebSocket client with reconnection
//!   - `status`: Connectivity status publisher
//!   - `config`: Environment-driven configuration
//!   - `telemetry`: Tracing initialization
//!
//! # Data Flow
//!
//! ```text
//! REST /api/ltp ────► Snapshot Loader ──┐
//!                                       ▼
//!                                ┌─────────────┐
//!                                │ Quote Store │──► readers
//!                                └─────────────┘
//!                                       ▲
//! WS /stream ───► Stream Client ──► Registry ──► observers
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Reconciliation types with no transport dependencies.
pub mod domain;

/// Application layer - Use cases.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::events::{EventKind, LtpUpdate, ScannerAlert, StreamCommand, StreamEvent};
pub use domain::market::{AlertEvent, AlertKind, QuoteOrigin, Symbol, SymbolQuote};
pub use domain::store::{DEFAULT_ALERT_RETENTION, QuoteStore};
pub use domain::subscription::{EventRegistry, InterestSet, Observer, ObserverId};

// Application facade
pub use application::sync::MarketSync;

// Infrastructure config
pub use infrastructure::config::{
    BackendSettings, BearerToken, ConfigError, StoreSettings, StreamSettings, SyncConfig,
};

// REST client (for integration tests)
pub use infrastructure::rest::{ApiClient, ApiError, TokenStore};
pub use infrastructure::rest::snapshot::{SnapshotLoader, SnapshotOutcome};

// Stream client (for integration tests)
pub use infrastructure::stream::{
    ConnectionState, ReconnectConfig, ReconnectPolicy, StreamClient, StreamClientConfig,
    StreamClientError,
};

// Status publisher
pub use infrastructure::status::{BackendHealth, HealthStatus, StatusPublisher, SystemStatus};

// Telemetry
pub use infrastructure::telemetry::init as init_telemetry;
