//! Snapshot Loader
//!
//! Fetches one-shot quote state for a set of symbols concurrently.
//! Each symbol resolves independently: a failed fetch yields the
//! defined zeroed placeholder plus the error, never a missing row and
//! never a failed batch.

use futures::future::join_all;
use std::sync::Arc;

use super::{ApiClient, ApiError};
use crate::domain::market::{Symbol, SymbolQuote};

/// Per-symbol result of a snapshot batch.
#[derive(Debug)]
pub struct SnapshotOutcome {
    /// Symbol this outcome is for.
    pub symbol: Symbol,
    /// Fetched quote, or the zeroed placeholder on failure.
    pub quote: SymbolQuote,
    /// The failure, when the fetch did not succeed.
    pub error: Option<ApiError>,
}

impl SnapshotOutcome {
    /// Whether the fetch succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Concurrent per-symbol snapshot fetcher.
///
/// Holds no cross-symbol state; requests for different symbols run in
/// parallel and cannot fail each other.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    api: Arc<ApiClient>,
}

impl SnapshotLoader {
    /// Create a loader over an API client.
    #[must_use]
    pub const fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Fetch quote snapshots for every symbol concurrently.
    ///
    /// Outcomes are returned in the order the symbols were given.
    pub async fn fetch_many(&self, symbols: &[Symbol]) -> Vec<SnapshotOutcome> {
        let fetches = symbols.iter().map(|symbol| {
            let api = Arc::clone(&self.api);
            let symbol = symbol.clone();
            async move {
                match api.ltp(&symbol).await {
                    Ok(snapshot) => SnapshotOutcome {
                        symbol,
                        quote: snapshot.into_quote(),
                        error: None,
                    },
                    Err(error) => {
                        tracing::warn!(
                            symbol = %symbol,
                            error = %error,
                            "Snapshot fetch failed; using placeholder"
                        );
                        SnapshotOutcome {
                            quote: SymbolQuote::unknown(symbol.clone()),
                            symbol,
                            error: Some(error),
                        }
                    }
                }
            }
        });

        join_all(fetches).await
    }
}
