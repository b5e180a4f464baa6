//! Stream client lifecycle integration tests.
//!
//! Each test runs a throwaway WebSocket server on a loopback port and
//! drives the client against it: event dispatch into the store,
//! interest replay across reconnects, and the bounded retry budget.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use market_sync::{
    ConnectionState, EventRegistry, InterestSet, QuoteStore, ReconnectConfig, StreamClient,
    StreamClientConfig,
};
use rust_decimal::Decimal;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        multiplier: 2.0,
        jitter_factor: 0.0,
        max_attempts,
    }
}

fn client_for(
    url: String,
    reconnect: ReconnectConfig,
) -> (Arc<StreamClient>, Arc<EventRegistry>, Arc<QuoteStore>) {
    let registry = Arc::new(EventRegistry::new());
    let store = Arc::new(QuoteStore::default());
    let _observers = store.attach(&registry);

    let client = Arc::new(StreamClient::new(
        StreamClientConfig { url, reconnect },
        Arc::clone(&registry),
        Arc::new(InterestSet::new()),
    ));
    (client, registry, store)
}

/// Collect `subscribe` symbols from one accepted connection until
/// `expected` have arrived, then report them.
async fn collect_subscribes(
    ws: &mut WebSocketStream<TcpStream>,
    expected: usize,
) -> Vec<String> {
    let mut symbols = Vec::new();
    while symbols.len() < expected {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                if frame["event"] == "subscribe" {
                    symbols.push(frame["data"]["symbol"].as_str().unwrap().to_string());
                }
            }
            Some(Ok(_)) => {}
            _ => break,
        }
    }
    symbols.sort();
    symbols
}

#[tokio::test]
async fn connected_client_dispatches_events_into_store() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let frame = r#"{"event":"ltp_update","data":{"symbol":"NIFTY","ltp":105,"change":5,"changePercent":5.0,"timestamp":"2024-06-03T09:30:00Z"}}"#;
        ws.send(Message::Text(frame.into())).await.unwrap();

        // Hold the connection open while the client processes.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _registry, store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(2));
    client.connect();

    let mut state_rx = client.state_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !store.quote("NIFTY").is_known() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let record = store.quote("NIFTY");
    assert_eq!(record.last_price, Decimal::new(105, 0));
    assert_eq!(record.change_percent, Decimal::new(50, 1));

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn undecodable_frame_is_dropped_without_tearing_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text("not json at all".into())).await.unwrap();
        ws.send(Message::Text(r#"{"event":"mystery","data":{}}"#.into()))
            .await
            .unwrap();
        let good = r#"{"event":"ltp_update","data":{"symbol":"NIFTY","ltp":105}}"#;
        ws.send(Message::Text(good.into())).await.unwrap();

        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _registry, store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(2));
    client.connect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !store.quote("NIFTY").is_known() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // The bad frames must not have dropped the connection.
    assert_eq!(client.state(), ConnectionState::Connected);
    client.disconnect();
}

#[tokio::test]
async fn interest_is_replayed_exactly_once_per_symbol_after_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (batch_tx, mut batch_rx) = mpsc::unbounded_channel::<Vec<String>>();

    tokio::spawn(async move {
        // First connection: collect the replay, then drop the socket
        // to force a reconnect.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let symbols = collect_subscribes(&mut ws, 2).await;
        batch_tx.send(symbols).unwrap();
        drop(ws);

        // Second connection: the full set must be replayed again.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let symbols = collect_subscribes(&mut ws, 2).await;
        batch_tx.send(symbols).unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _registry, _store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(5));
    client.set_symbol_interest("NIFTY");
    client.set_symbol_interest("BANKNIFTY");
    client.set_symbol_interest("NIFTY");
    client.connect();

    let first = tokio::time::timeout(Duration::from_secs(5), batch_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, vec!["BANKNIFTY", "NIFTY"]);

    let second = tokio::time::timeout(Duration::from_secs(5), batch_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, vec!["BANKNIFTY", "NIFTY"]);

    client.disconnect();
}

#[tokio::test]
async fn live_interest_changes_are_sent_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<serde_json::Value>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                frame_tx
                    .send(serde_json::from_str(text.as_str()).unwrap())
                    .unwrap();
            }
        }
    });

    let (client, _registry, _store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(2));
    client.connect();

    let mut state_rx = client.state_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    client.set_symbol_interest("NIFTY");
    let frame = tokio::time::timeout(Duration::from_secs(5), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame["event"], "subscribe");
    assert_eq!(frame["data"]["symbol"], "NIFTY");

    // Duplicate interest must not produce traffic; the next frame the
    // server sees is the unsubscribe.
    client.set_symbol_interest("NIFTY");
    client.clear_symbol_interest("NIFTY");
    let frame = tokio::time::timeout(Duration::from_secs(5), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame["event"], "unsubscribe");
    assert_eq!(frame["data"]["symbol"], "NIFTY");

    client.disconnect();
}

#[tokio::test]
async fn exhausted_retry_budget_parks_in_failed() {
    // Reserve a port with no listener behind it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (client, _registry, _store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(2));
    client.connect();

    let mut state_rx = client.state_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Failed),
    )
    .await
    .unwrap()
    .unwrap();

    // Failed is sticky until a manual connect.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Failed);

    // Manual connect starts a fresh session with a fresh budget.
    client.connect();
    assert!(client.state().is_active());

    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Failed),
    )
    .await
    .unwrap()
    .unwrap();

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_during_reconnect_delay_cancels_the_retry() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let reconnect = ReconnectConfig {
        initial_delay: Duration::from_secs(30),
        max_delay: Duration::from_secs(60),
        multiplier: 2.0,
        jitter_factor: 0.0,
        max_attempts: 10,
    };
    let (client, _registry, _store) = client_for(format!("ws://{addr}/stream"), reconnect);
    client.connect();

    let mut state_rx = client.state_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Reconnecting),
    )
    .await
    .unwrap()
    .unwrap();

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // The cancelled session must not publish any further state.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn dropped_connection_transitions_through_reconnecting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // Accept and immediately drop, then accept again and hold.
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        drop(ws);

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (client, _registry, _store) = client_for(format!("ws://{addr}/stream"), fast_reconnect(5));
    client.connect();

    let mut state_rx = client.state_watch();
    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Reconnecting),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    client.disconnect();
}
