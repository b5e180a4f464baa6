//! Snapshot loader and REST client integration tests.
//!
//! Each test runs a stub backend on a loopback port. Per-symbol
//! isolation, timeout handling and credential invalidation are
//! exercised against real HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use market_sync::{
    ApiClient, ApiError, BackendSettings, BearerToken, QuoteOrigin, SnapshotLoader, TokenStore,
};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn ltp_handler(Query(params): Query<HashMap<String, String>>) -> Response {
    let symbol = params.get("symbol").cloned().unwrap_or_default();
    match symbol.as_str() {
        "BROKEN" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "SLOW" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::OK.into_response()
        }
        _ => Json(json!({
            "symbol": symbol,
            "ltp": 24510.5,
            "change": 120.25,
            "changePercent": 0.49,
            "timestamp": "2024-06-03T09:15:00Z"
        }))
        .into_response(),
    }
}

fn stub_app() -> Router {
    Router::new()
        .route("/api/ltp", get(ltp_handler))
        .route("/api/status", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/api/option-chain",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({
                    "symbol": params.get("symbol"),
                    "expiry": params.get("expiry"),
                    "strikes": [{"strike": 24500, "callOi": 120, "putOi": 340}]
                }))
            }),
        )
        .route(
            "/api/signal",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                Json(json!({
                    "symbol": params.get("symbol"),
                    "signal": "BUY",
                    "confidence": 0.72
                }))
            }),
        )
        .route(
            "/api/scanner",
            get(|| async {
                Json(json!({
                    "alerts": [{
                        "symbol": "NIFTY",
                        "type": "PRICE_EXPLOSION",
                        "ltp": 24510,
                        "changePercent": 1.2,
                        "volumeChange": 5.2,
                        "timestamp": "2024-06-03T10:00:00Z"
                    }]
                }))
            }),
        )
}

fn api_for(addr: SocketAddr, timeout: Duration, token: Option<&str>) -> Arc<ApiClient> {
    let settings = BackendSettings {
        base_url: format!("http://{addr}"),
        request_timeout: timeout,
    };
    let tokens = TokenStore::new(token.map(|t| BearerToken::new(t.to_string())));
    Arc::new(ApiClient::new(&settings, tokens).unwrap())
}

#[tokio::test]
async fn failed_symbol_yields_placeholder_without_failing_the_batch() {
    let addr = serve(stub_app()).await;
    let loader = SnapshotLoader::new(api_for(addr, Duration::from_secs(5), None));

    let symbols = vec![
        "NIFTY".to_string(),
        "BROKEN".to_string(),
        "BANKNIFTY".to_string(),
    ];
    let outcomes = loader.fetch_many(&symbols).await;

    assert_eq!(outcomes.len(), 3);
    // Outcomes keep input order.
    assert_eq!(outcomes[0].symbol, "NIFTY");
    assert_eq!(outcomes[1].symbol, "BROKEN");
    assert_eq!(outcomes[2].symbol, "BANKNIFTY");

    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[0].quote.origin, QuoteOrigin::Snapshot);
    assert_eq!(outcomes[0].quote.last_price, Decimal::new(245_105, 1));

    assert!(!outcomes[1].is_success());
    assert_eq!(outcomes[1].quote.origin, QuoteOrigin::Unknown);
    assert_eq!(outcomes[1].quote.last_price, Decimal::ZERO);
    assert!(matches!(
        outcomes[1].error,
        Some(ApiError::Http { status: 500, .. })
    ));

    assert!(outcomes[2].is_success());
}

#[tokio::test]
async fn timed_out_symbol_is_a_per_symbol_failure() {
    let addr = serve(stub_app()).await;
    let loader = SnapshotLoader::new(api_for(addr, Duration::from_millis(200), None));

    let symbols = vec!["SLOW".to_string(), "NIFTY".to_string()];
    let outcomes = loader.fetch_many(&symbols).await;

    assert!(!outcomes[0].is_success());
    assert!(matches!(outcomes[0].error, Some(ApiError::Timeout)));
    assert_eq!(outcomes[0].quote.origin, QuoteOrigin::Unknown);

    assert!(outcomes[1].is_success());
}

#[tokio::test]
async fn unauthorized_response_clears_cached_token() {
    let app = Router::new().route(
        "/api/ltp",
        get(|| async { StatusCode::UNAUTHORIZED.into_response() }),
    );
    let addr = serve(app).await;
    let api = api_for(addr, Duration::from_secs(5), Some("stale-token"));

    assert!(api.tokens().is_present());
    let result = api.ltp("NIFTY").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(!api.tokens().is_present());

    // The next request goes out without a credential and is not
    // retried by the client itself.
    let result = api.ltp("NIFTY").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
}

#[tokio::test]
async fn bearer_token_is_attached_when_present() {
    let app = Router::new().route(
        "/api/ltp",
        get(|headers: axum::http::HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "symbol": auth,
                "ltp": 1,
                "timestamp": "2024-06-03T09:15:00Z"
            }))
        }),
    );
    let addr = serve(app).await;
    let api = api_for(addr, Duration::from_secs(5), Some("secret-token"));

    let snapshot = api.ltp("NIFTY").await.unwrap();
    assert_eq!(snapshot.symbol, "Bearer secret-token");
}

#[tokio::test]
async fn scanner_snapshot_decodes_alert_rows() {
    let addr = serve(stub_app()).await;
    let api = api_for(addr, Duration::from_secs(5), None);

    let snapshot = api.scanner(&[]).await.unwrap();
    assert_eq!(snapshot.alerts.len(), 1);

    let fact = snapshot.alerts[0].clone().into_alert_event();
    assert_eq!(fact.symbol, "NIFTY");
    assert_eq!(fact.volume_multiplier, Decimal::new(52, 1));
}

#[tokio::test]
async fn option_chain_passes_symbol_and_expiry_through() {
    let addr = serve(stub_app()).await;
    let api = api_for(addr, Duration::from_secs(5), None);

    let chain = api.option_chain("NIFTY", Some("2024-06-27")).await.unwrap();
    assert_eq!(chain["symbol"], "NIFTY");
    assert_eq!(chain["expiry"], "2024-06-27");
    assert_eq!(chain["strikes"][0]["strike"], 24500);

    // Expiry is optional; the backend must not see the parameter.
    let chain = api.option_chain("NIFTY", None).await.unwrap();
    assert_eq!(chain["expiry"], serde_json::Value::Null);
}

#[tokio::test]
async fn signal_snapshot_round_trips() {
    let addr = serve(stub_app()).await;
    let api = api_for(addr, Duration::from_secs(5), None);

    let signal = api.signal("BANKNIFTY").await.unwrap();
    assert_eq!(signal["symbol"], "BANKNIFTY");
    assert_eq!(signal["signal"], "BUY");
}

#[tokio::test]
async fn status_endpoint_round_trips() {
    let addr = serve(stub_app()).await;
    let api = api_for(addr, Duration::from_secs(5), None);

    let status = api.status().await.unwrap();
    assert_eq!(status["status"], "ok");
}

#[tokio::test]
async fn network_failure_is_not_a_timeout() {
    // Reserve a dead port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = api_for(addr, Duration::from_secs(5), None);
    let result = api.ltp("NIFTY").await;
    assert!(matches!(result, Err(ApiError::Network(_))));
}
