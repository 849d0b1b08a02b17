//! Integration tests for session orchestration: start, replace, stop,
//! failure isolation and shutdown.

use pulsewatch::core::{MonitoringSupervisor, StopOutcome};
use pulsewatch::error::SupervisorError;
use pulsewatch::models::{MarketCategory, MonitoringRequest, WatchScope};
use pulsewatch::services::StaticFavorites;
use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::{
    connection_for, kline_frame, subscribed_symbols, symbols, test_config, within,
    FailingFavorites, MockStreamConnector, RecordingNotifier, StaticCatalog, TestSupervisor,
};

const CONSUMER: i64 = 1001;
const FIVE: [&str; 5] = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT"];

fn request(consumer_id: i64, scope: WatchScope, category: MarketCategory) -> MonitoringRequest {
    MonitoringRequest::new(consumer_id, 5.0, "15m", scope, category).unwrap()
}

fn all_linear(consumer_id: i64) -> MonitoringRequest {
    request(consumer_id, WatchScope::AllActive, MarketCategory::Linear)
}

#[tokio::test]
async fn start_spawns_one_stream_per_chunk() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));

    let summary = t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    assert_eq!(summary.instruments, 5);
    assert_eq!(summary.streams, 3);
    assert_eq!(summary.timeframe, "15m");

    let handles = within(t.connector.wait_for_connections(3)).await;
    let mut subscribed = Vec::new();
    for handle in &handles {
        assert_eq!(handle.url, t.supervisor.config().ws_linear_url);
        let chunk = subscribed_symbols(handle).await;
        assert!(!chunk.is_empty() && chunk.len() <= 2);
        subscribed.extend(chunk);
    }
    subscribed.sort();
    let mut expected = symbols(&FIVE);
    expected.sort();
    assert_eq!(subscribed, expected);

    let texts = t.notifier.texts_for(CONSUMER);
    assert!(texts
        .iter()
        .any(|m| m.starts_with("Monitoring started: 5 instruments across 3 streams")));
    assert!(t.supervisor.is_active(CONSUMER).await);
    assert_eq!(t.metrics.active_sessions.get(), 1);

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn spot_sessions_use_the_spot_stream() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&["BTCUSDT"])));

    t.supervisor
        .start(request(CONSUMER, WatchScope::AllActive, MarketCategory::Spot))
        .await
        .unwrap();

    let handles = within(t.connector.wait_for_connections(1)).await;
    assert_eq!(handles[0].url, t.supervisor.config().ws_spot_url);

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn catalog_failure_aborts_start_without_connecting() {
    let t = TestSupervisor::new(StaticCatalog::Unavailable);

    let err = t.supervisor.start(all_linear(CONSUMER)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Catalog(_)));
    assert_eq!(t.notifier.texts_for(CONSUMER), vec!["Failed to fetch instruments"]);
    assert_eq!(t.connector.connect_attempts(), 0);
    assert!(!t.supervisor.is_active(CONSUMER).await);
}

#[tokio::test]
async fn empty_catalog_aborts_start() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(Vec::new()));

    let err = t.supervisor.start(all_linear(CONSUMER)).await.unwrap_err();
    assert!(matches!(err, SupervisorError::NoInstruments));
    assert_eq!(t.notifier.texts_for(CONSUMER), vec!["Failed to fetch instruments"]);
    assert_eq!(t.connector.connect_attempts(), 0);
}

#[tokio::test]
async fn favorites_scope_monitors_only_favorites() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));
    t.favorites
        .set(CONSUMER, symbols(&["ADAUSDT", "ETHUSDT"]))
        .await;

    let summary = t
        .supervisor
        .start(request(CONSUMER, WatchScope::Favorites, MarketCategory::Linear))
        .await
        .unwrap();
    assert_eq!(summary.instruments, 2);
    assert_eq!(summary.streams, 1);

    let handles = within(t.connector.wait_for_connections(1)).await;
    assert_eq!(
        subscribed_symbols(&handles[0]).await,
        vec!["ADAUSDT", "ETHUSDT"]
    );

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn no_favorites_is_reported_distinctly() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));

    let err = t
        .supervisor
        .start(request(CONSUMER, WatchScope::Favorites, MarketCategory::Linear))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::NoFavorites(CONSUMER)));
    assert_eq!(
        t.notifier.texts_for(CONSUMER),
        vec!["You have no favorite instruments"]
    );
    assert_eq!(t.connector.connect_attempts(), 0);
}

#[tokio::test]
async fn favorites_lookup_failure_is_reported_distinctly() {
    let connector = Arc::new(MockStreamConnector::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let supervisor = MonitoringSupervisor::new(
        test_config(),
        Arc::new(StaticCatalog::Symbols(symbols(&FIVE))),
        Arc::new(FailingFavorites),
        notifier.clone(),
        connector.clone(),
    );

    let err = supervisor
        .start(request(CONSUMER, WatchScope::Favorites, MarketCategory::Linear))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::Favorites {
            consumer_id: CONSUMER,
            ..
        }
    ));
    assert_eq!(
        notifier.texts_for(CONSUMER),
        vec!["Failed to load your favorite instruments"]
    );
    assert_eq!(connector.connect_attempts(), 0);
}

#[tokio::test]
async fn restart_replaces_the_previous_session() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let first = within(t.connector.wait_for_connections(3)).await;

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let all = within(t.connector.wait_for_connections(6)).await;

    // The replaced session is fully torn down before start returns.
    assert!(first.iter().all(|h| h.is_closed()));
    let second = &all[3..];
    assert!(second.iter().all(|h| !h.is_closed()));

    let sessions = t.supervisor.active_sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].consumer_id, CONSUMER);
    assert_eq!(t.metrics.active_sessions.get(), 1);

    assert_eq!(
        t.supervisor.stop(CONSUMER).await,
        StopOutcome::Stopped { streams: 3 }
    );
    assert!(second.iter().all(|h| h.is_closed()));
    assert_eq!(t.metrics.active_streams.get(), 0);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));

    assert_eq!(t.supervisor.stop(CONSUMER).await, StopOutcome::NoActiveSession);

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    within(t.connector.wait_for_connections(3)).await;

    assert_eq!(
        t.supervisor.stop(CONSUMER).await,
        StopOutcome::Stopped { streams: 3 }
    );
    assert_eq!(t.supervisor.stop(CONSUMER).await, StopOutcome::NoActiveSession);
    assert!(!t.supervisor.is_active(CONSUMER).await);
    assert_eq!(t.metrics.active_sessions.get(), 0);

    let texts = t.notifier.texts_for(CONSUMER);
    assert_eq!(texts.first().map(String::as_str), Some("No active monitoring"));
    assert!(texts.iter().any(|m| m == "Monitoring stopped"));
    assert_eq!(texts.last().map(String::as_str), Some("No active monitoring"));
}

#[tokio::test]
async fn stopping_one_consumer_leaves_others_running() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&["BTCUSDT"])));

    t.supervisor.start(all_linear(1)).await.unwrap();
    t.supervisor.start(all_linear(2)).await.unwrap();
    let handles = within(t.connector.wait_for_connections(2)).await;

    t.supervisor.stop(1).await;
    assert!(handles[0].is_closed());
    assert!(!handles[1].is_closed());
    assert!(t.supervisor.is_active(2).await);

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn connect_failure_in_one_chunk_spares_siblings() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&[
        "BTCUSDT", "ETHUSDT", "SOLUSDT",
    ])));
    t.connector.refuse_next_connects(1);

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    t.notifier
        .wait_for(|m| m.starts_with("❌ Failed to connect to the market stream"))
        .await;

    let survivor = within(t.connector.wait_for_connections(1)).await.remove(0);
    let symbol = subscribed_symbols(&survivor).await.remove(0);
    survivor.push_text(kline_frame(&symbol, 100.0, 110.0, 1_700_000_000_000));

    let alert = t
        .notifier
        .wait_for(|m| m.starts_with(&format!("Ticker: {}", symbol)))
        .await;
    assert!(alert.contains("Price change: 10.00%"));
    assert_eq!(t.connector.connect_attempts(), 2);
    assert!(t.supervisor.is_active(CONSUMER).await);

    within(async {
        loop {
            let sessions = t.supervisor.active_sessions().await;
            if sessions[0].live_streams == 1 {
                assert_eq!(sessions[0].streams, 2);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn stream_failure_notifies_the_consumer() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&["BTCUSDT"])));

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let handle = within(t.connector.wait_for_connections(1)).await.remove(0);
    handle.close_from_server();

    let text = t
        .notifier
        .wait_for(|m| m.starts_with("⚠️ Market stream for BTCUSDT ended"))
        .await;
    assert!(text.contains("server closed the stream"));

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn panic_in_one_chunk_is_isolated() {
    let t = TestSupervisor::build(
        StaticCatalog::Symbols(symbols(&["BTCUSDT", "XRPUSDT", "ETHUSDT"])),
        RecordingNotifier::panicking_on("BTCUSDT"),
        test_config(),
    );

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    within(t.connector.wait_for_connections(2)).await;

    let doomed = connection_for(&t.connector, "BTCUSDT").await;
    let healthy = connection_for(&t.connector, "ETHUSDT").await;

    doomed.push_text(kline_frame("BTCUSDT", 100.0, 120.0, 1_700_000_000_000));
    t.notifier
        .wait_for(|m| m.starts_with("⚠️ Monitoring crashed unexpectedly"))
        .await;

    healthy.push_text(kline_frame("ETHUSDT", 100.0, 90.0, 1_700_000_000_000));
    let alert = t.notifier.wait_for(|m| m.starts_with("Ticker: ETHUSDT")).await;
    assert!(alert.contains("🔴 Short"));
    assert!(t.supervisor.is_active(CONSUMER).await);

    assert_eq!(
        t.supervisor.stop(CONSUMER).await,
        StopOutcome::Stopped { streams: 2 }
    );
    assert!(healthy.is_closed());
}

#[tokio::test]
async fn stop_does_not_wait_for_a_hung_notifier() {
    let read_timeout = Duration::from_secs(2);
    let t = TestSupervisor::build(
        StaticCatalog::Symbols(symbols(&["BTCUSDT"])),
        RecordingNotifier::stalling_on_alerts(),
        test_config().with_read_timeout(read_timeout),
    );

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let handle = within(t.connector.wait_for_connections(1)).await.remove(0);
    handle.push_text(kline_frame("BTCUSDT", 100.0, 110.0, 1_700_000_000_000));
    t.notifier.wait_for(|m| m.starts_with("Ticker: BTCUSDT")).await;

    let outcome = tokio::time::timeout(read_timeout, t.supervisor.stop(CONSUMER))
        .await
        .expect("stop blocked on the notifier");
    assert_eq!(outcome, StopOutcome::Stopped { streams: 1 });
    assert!(handle.is_closed());
    assert_eq!(t.metrics.active_streams.get(), 0);
}

#[tokio::test]
async fn cooldown_survives_a_restart() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&["BTCUSDT"])));
    let ts = 1_700_000_000_000;

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let first = within(t.connector.wait_for_connections(1)).await.remove(0);
    first.push_text(kline_frame("BTCUSDT", 100.0, 106.0, ts));
    t.notifier.wait_for(|m| m.starts_with("Ticker: BTCUSDT")).await;

    t.supervisor.start(all_linear(CONSUMER)).await.unwrap();
    let second = within(t.connector.wait_for_connections(2)).await.remove(1);
    second.push_text(kline_frame("BTCUSDT", 100.0, 107.0, ts + 60_000));

    within(async {
        while t.metrics.alerts_suppressed_total.get() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(t.notifier.alerts_for(CONSUMER).len(), 1);

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn cooldowns_are_per_consumer() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&["BTCUSDT"])));
    let ts = 1_700_000_000_000;

    t.supervisor.start(all_linear(1)).await.unwrap();
    t.supervisor.start(all_linear(2)).await.unwrap();
    let handles = within(t.connector.wait_for_connections(2)).await;

    for handle in &handles {
        handle.push_text(kline_frame("BTCUSDT", 100.0, 106.0, ts));
    }
    within(async {
        while t.notifier.alerts_for(1).is_empty() || t.notifier.alerts_for(2).is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(t.supervisor.cooldowns().len(), 2);

    t.supervisor.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_every_session() {
    let t = TestSupervisor::new(StaticCatalog::Symbols(symbols(&FIVE)));

    t.supervisor.start(all_linear(1)).await.unwrap();
    t.supervisor.start(all_linear(2)).await.unwrap();
    let handles = within(t.connector.wait_for_connections(6)).await;

    within(t.supervisor.shutdown()).await;

    assert!(handles.iter().all(|h| h.is_closed()));
    assert!(t.supervisor.active_sessions().await.is_empty());
    assert_eq!(t.metrics.active_sessions.get(), 0);
    assert_eq!(t.metrics.active_streams.get(), 0);
}

#[tokio::test]
async fn favorites_scope_skips_the_catalog() {
    let favorites = Arc::new(StaticFavorites::new());
    favorites.set(CONSUMER, symbols(&["BTCUSDT"])).await;
    let connector = Arc::new(MockStreamConnector::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let supervisor = MonitoringSupervisor::new(
        test_config(),
        Arc::new(StaticCatalog::Unavailable),
        favorites.clone(),
        notifier.clone(),
        connector.clone(),
    );

    supervisor
        .start(request(CONSUMER, WatchScope::Favorites, MarketCategory::Linear))
        .await
        .unwrap();
    within(connector.wait_for_connections(1)).await;

    supervisor.shutdown().await;
}
