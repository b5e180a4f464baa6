//! Tracing Initialization
//!
//! Structured logging via `tracing` with an `EnvFilter`-driven level.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level filter (default: `info`)
//!
//! # Usage
//!
//! ```ignore
//! use market_sync::infrastructure::telemetry;
//!
//! // Initialize at startup.
//! telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
///
/// Safe to call once per process; later calls are ignored so tests
/// that initialize telemetry independently do not panic.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
