//! Market Sync Binary
//!
//! Starts the market data synchronization core.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin market-sync
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKET_SYNC_API_URL`: Backend base URL
//!
//! ## Optional
//! - `MARKET_SYNC_WS_URL`: Stream URL (default: derived from API URL)
//! - `MARKET_SYNC_TOKEN`: Initial bearer credential
//! - `MARKET_SYNC_SYMBOLS`: Comma-separated symbols to watch at startup
//! - `MARKET_SYNC_MAX_RECONNECT_ATTEMPTS`: Retry budget (default: 5)
//! - `MARKET_SYNC_RECONNECT_DELAY_INITIAL_MS`: First retry delay (default: 1000)
//! - `MARKET_SYNC_RECONNECT_DELAY_MAX_SECS`: Retry delay cap (default: 30)
//! - `MARKET_SYNC_ALERT_RETENTION`: Retained alerts (default: 50)
//! - `MARKET_SYNC_REQUEST_TIMEOUT_SECS`: REST timeout (default: 30)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use market_sync::infrastructure::telemetry;
use market_sync::{MarketSync, SyncConfig};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();
    telemetry::init();

    tracing::info!("Starting market sync core");

    let config = SyncConfig::from_env()?;
    log_config(&config);

    let sync = Arc::new(MarketSync::new(&config)?);
    sync.start();

    let symbols = startup_symbols();
    for symbol in &symbols {
        sync.watch(symbol);
    }

    if !symbols.is_empty() {
        let outcomes = sync.load_snapshots(&symbols).await;
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            total = outcomes.len(),
            failed,
            "Initial snapshot load complete"
        );
    }

    if let Err(error) = sync.load_alerts(&[]).await {
        tracing::warn!(error = %error, "Initial alert load failed");
    }

    let status = sync.refresh_status().await;
    tracing::info!(backend = ?status.backend, "Initial backend probe complete");

    let mut status_rx = sync.status().subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            tracing::info!(
                backend = ?status.backend,
                stream = %status.stream,
                health = ?status.health(),
                "System status changed"
            );
        }
    });

    tracing::info!("Market sync ready");

    await_shutdown().await;

    sync.shutdown();
    tracing::info!("Market sync stopped");
    Ok(())
}

/// Symbols to watch at startup from `MARKET_SYNC_SYMBOLS`.
fn startup_symbols() -> Vec<String> {
    std::env::var("MARKET_SYNC_SYMBOLS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Log the parsed configuration.
fn log_config(config: &SyncConfig) {
    tracing::info!(
        backend_url = %config.backend.base_url,
        stream_url = %config.stream_url(),
        max_reconnect_attempts = config.stream.max_reconnect_attempts,
        alert_retention = config.store.alert_retention,
        token_present = config.token.is_some(),
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
