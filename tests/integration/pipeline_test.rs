//! End-to-end pipeline tests on paused time

use crate::support::{coins, Harness, ScriptedSource, Snapshot};
use coin_ticker::boundary::PipelineMessage;
use coin_ticker::config::PipelineConfig;
use coin_ticker::feed::Direction;
use coin_ticker::market::FetchError;
use coin_ticker::pipeline::FETCH_ERROR_MESSAGE;
use std::time::Duration;
use tokio::time::Instant;

fn symbols(message: &PipelineMessage) -> Vec<String> {
    match message {
        PipelineMessage::Coins { coins } => coins.iter().map(|c| c.symbol.clone()).collect(),
        other => panic!("expected coins, got {other:?}"),
    }
}

fn price(message: &PipelineMessage) -> (String, f64, Direction) {
    match message {
        PipelineMessage::Price { update } => (update.symbol.clone(), update.price, update.direction),
        other => panic!("expected price, got {other:?}"),
    }
}

/// Spawn, take the first snapshot and bring connection 0 up
async fn connected(script: Vec<Snapshot>) -> Harness {
    let mut h = Harness::spawn(script);
    h.next().await;
    h.connector.establish(0).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: true });
    h
}

#[tokio::test(start_paused = true)]
async fn test_initialize_publishes_ranked_set_and_subscribes() {
    let mut h = Harness::spawn(vec![Ok(coins(&[("BTC", 42000.0), ("ETH", 2300.0), ("SOL", 95.0)]))]);

    assert_eq!(symbols(&h.next().await), ["BTC", "ETH", "SOL"]);
    assert_eq!(h.connector.count(), 1);
    assert_eq!(
        h.connector.url(0),
        "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade/solusdt@trade"
    );

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_initialize_reports_error_then_retries() {
    let start = Instant::now();
    let mut h = Harness::spawn(vec![Err(FetchError::Status(429)), Ok(coins(&[("BTC", 1.0)]))]);

    assert_eq!(
        h.next().await,
        PipelineMessage::Error {
            message: FETCH_ERROR_MESSAGE.to_string()
        }
    );
    assert_eq!(h.connector.count(), 0);

    assert_eq!(symbols(&h.next().await), ["BTC"]);
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(11));
    assert_eq!(h.source.calls(), 2);

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_become_price_deltas() {
    let mut h = connected(vec![Ok(coins(&[("BTC", 100.0), ("ETH", 10.0)]))]).await;

    h.connector.trade(0, "BTCUSDT", "101.5").await;
    assert_eq!(price(&h.next().await), ("BTC".to_string(), 101.5, Direction::Up));

    h.connector.trade(0, "ETHUSDT", "9.5").await;
    assert_eq!(price(&h.next().await), ("ETH".to_string(), 9.5, Direction::Down));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_discarded_ticks_are_silent() {
    let mut h = connected(vec![Ok(coins(&[("BTC", 100.0)]))]).await;

    h.connector.trade(0, "BTCUSDT", "100").await;
    h.connector.trade(0, "DOGEUSDT", "0.2").await;
    h.connector.trade(0, "BTCUSDT", "NaN").await;
    h.connector
        .emit(0, coin_ticker::ws::StreamEventKind::Frame("{not json".to_string()))
        .await;
    h.connector.trade(0, "BTCUSDT", "99").await;

    assert_eq!(price(&h.next().await), ("BTC".to_string(), 99.0, Direction::Down));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stats_count_accepted_ticks_per_window() {
    let mut h = connected(vec![Ok(coins(&[("BTC", 100.0)]))]).await;

    h.connector.trade(0, "BTCUSDT", "101").await;
    h.connector.trade(0, "BTCUSDT", "102").await;
    h.connector.trade(0, "BTCUSDT", "102").await;
    h.connector.trade(0, "BTCUSDT", "103").await;

    let mut updates = 0;
    while updates == 0 {
        updates = h.next_stats().await;
    }
    assert_eq!(updates, 3);
    assert_eq!(h.next_stats().await, 0);

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ping_gets_pong() {
    let mut h = Harness::spawn(vec![Ok(coins(&[("BTC", 1.0)]))]);
    h.next().await;

    h.pipeline.ping().await.unwrap();
    assert!(matches!(h.next().await, PipelineMessage::Pong { .. }));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_backoff_grows_and_resets_on_open() {
    let mut h = connected(vec![Ok(coins(&[("BTC", 100.0)]))]).await;

    let t = Instant::now();
    h.connector.drop_connection(0).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: false });
    h.connector.wait_for(2).await;
    assert!(t.elapsed() >= Duration::from_secs(2));
    assert!(t.elapsed() < Duration::from_millis(2100));
    assert_eq!(h.connector.url(1), h.connector.url(0));

    // Second failure in a row without ever opening
    let t = Instant::now();
    h.connector.drop_connection(1).await;
    h.connector.wait_for(3).await;
    assert!(t.elapsed() >= Duration::from_secs(4));
    assert!(t.elapsed() < Duration::from_millis(4100));

    h.connector.establish(2).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: true });

    let t = Instant::now();
    h.connector.drop_connection(2).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: false });
    h.connector.wait_for(4).await;
    assert!(t.elapsed() < Duration::from_millis(2100));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_connection_cannot_feed_ticks() {
    let mut h = connected(vec![Ok(coins(&[("BTC", 100.0)]))]).await;

    h.connector.drop_connection(0).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: false });
    h.connector.wait_for(2).await;
    h.connector.establish(1).await;
    assert_eq!(h.next().await, PipelineMessage::Status { connected: true });

    h.connector.trade(0, "BTCUSDT", "1").await;
    h.connector.trade(1, "BTCUSDT", "101").await;
    assert_eq!(price(&h.next().await), ("BTC".to_string(), 101.0, Direction::Up));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_with_new_universe_switches_stream() {
    let mut h = connected(vec![
        Ok(coins(&[("BTC", 100.0), ("ETH", 10.0)])),
        Ok(coins(&[("BTC", 100.0), ("SOL", 50.0)])),
    ])
    .await;

    h.pipeline.refresh().await.unwrap();
    assert_eq!(symbols(&h.next().await), ["BTC", "SOL"]);
    assert_eq!(h.connector.count(), 2);
    assert!(h.connector.was_closed(0));
    assert!(h.connector.url(1).ends_with("streams=btcusdt@trade/solusdt@trade"));

    // Already reported connected; reopening stays quiet
    h.connector.establish(1).await;
    h.connector.trade(1, "ETHUSDT", "11").await;
    h.connector.trade(1, "SOLUSDT", "55").await;
    assert_eq!(price(&h.next().await), ("SOL".to_string(), 55.0, Direction::Up));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_refresh_resets_prices_on_same_connection() {
    let start = Instant::now();
    let mut h = connected(vec![
        Ok(coins(&[("BTC", 100.0), ("ETH", 10.0)])),
        Ok(coins(&[("ETH", 12.0), ("BTC", 90.0)])),
    ])
    .await;

    h.connector.trade(0, "BTCUSDT", "120").await;
    h.next().await;

    let message = h.next().await;
    assert!(start.elapsed() >= Duration::from_secs(300));
    let PipelineMessage::Coins { coins } = message else {
        panic!("expected coins, got {message:?}");
    };
    assert_eq!(coins[0].symbol, "ETH");
    assert_eq!(coins[1].current_price, 90.0);
    assert_eq!(h.connector.count(), 1);
    assert!(!h.connector.was_closed(0));

    // The refreshed price is the new base for direction
    h.connector.trade(0, "BTCUSDT", "95").await;
    assert_eq!(price(&h.next().await), ("BTC".to_string(), 95.0, Direction::Up));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_or_empty_refresh_keeps_current_set() {
    let mut h = connected(vec![
        Ok(coins(&[("BTC", 100.0)])),
        Err(FetchError::Status(500)),
        Ok(Vec::new()),
    ])
    .await;

    h.pipeline.refresh().await.unwrap();
    assert_eq!(
        h.next().await,
        PipelineMessage::Error {
            message: FETCH_ERROR_MESSAGE.to_string()
        }
    );

    h.pipeline.refresh().await.unwrap();
    while h.source.calls() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.pipeline.ping().await.unwrap();
    assert!(matches!(h.next().await, PipelineMessage::Pong { .. }));
    assert_eq!(h.connector.count(), 1);

    h.connector.trade(0, "BTCUSDT", "101").await;
    assert_eq!(price(&h.next().await), ("BTC".to_string(), 101.0, Direction::Up));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_connection_and_cancels_retries() {
    let h = connected(vec![Ok(coins(&[("BTC", 100.0)]))]).await;
    let Harness { pipeline, connector, source } = h;

    pipeline.shutdown().await;
    assert!(connector.was_closed(0));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(connector.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_initialize_retry() {
    let mut h = Harness::spawn(vec![Ok(Vec::new())]);
    while h.source.calls() < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    h.pipeline.ping().await.unwrap();
    assert!(matches!(h.next().await, PipelineMessage::Pong { .. }));

    let Harness { pipeline, connector, source } = h;
    pipeline.shutdown().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 1);
    assert_eq!(connector.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_initialize_does_not_override_newer_refresh() {
    let source = ScriptedSource::delayed(vec![
        (Duration::from_secs(5), Ok(coins(&[("BTC", 100.0), ("ETH", 10.0)]))),
        (Duration::ZERO, Ok(coins(&[("BTC", 100.0), ("SOL", 50.0)]))),
    ]);
    let mut h = Harness::spawn_with(PipelineConfig::default(), source);
    while h.source.calls() < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    h.pipeline.refresh().await.unwrap();
    assert_eq!(symbols(&h.next().await), ["BTC", "SOL"]);

    // Let the initialize fetch finish, then use a pong as a barrier
    tokio::time::sleep(Duration::from_secs(6)).await;
    h.pipeline.ping().await.unwrap();
    assert!(matches!(h.next().await, PipelineMessage::Pong { .. }));
    assert_eq!(h.connector.count(), 1);
    assert!(h.connector.url(0).ends_with("streams=btcusdt@trade/solusdt@trade"));

    h.pipeline.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_periods_do_not_stop_the_pipeline() {
    let settings = PipelineConfig {
        stats_interval_ms: 0,
        refresh_interval_secs: 0,
        ..PipelineConfig::default()
    };
    let mut h = Harness::spawn_with(settings, ScriptedSource::new(vec![Ok(coins(&[("BTC", 1.0)]))]));

    assert_eq!(symbols(&h.next().await), ["BTC"]);
    assert_eq!(h.next_stats().await, 0);

    h.pipeline.ping().await.unwrap();
    assert!(matches!(h.next().await, PipelineMessage::Pong { .. }));

    h.pipeline.shutdown().await;
}
