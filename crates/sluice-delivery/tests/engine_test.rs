//! Integration tests for the fanout engine lifecycle.
//!
//! Exercises the dequeue loop against the in-memory store: claim ordering,
//! idle-poll cadence, error absorption, and graceful shutdown draining.

use std::{sync::Arc, time::Duration};

use sluice_core::{Clock, Event, RealClock, TestClock};
use sluice_delivery::{
    store::{mock::MockQueueStore, QueueStore},
    DeliveryError, FanoutConfig, FanoutEngine,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const PENDING: &str = "queued_events";
const IN_FLIGHT: &str = "processing_events";

fn fast_config(endpoints: Vec<String>) -> FanoutConfig {
    FanoutConfig {
        endpoints,
        idle_interval: Duration::from_millis(10),
        ..FanoutConfig::default()
    }
}

fn raw_event(user_id: &str) -> String {
    Event::new(user_id, "payload").to_json().expect("event should encode")
}

/// Polls until `condition` holds or the deadline passes.
async fn wait_for<F, Fut>(condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition().await {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn engine_delivers_queued_events_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(MockQueueStore::new());
    store.seed(PENDING, &raw_event("u-1")).await;
    store.seed(PENDING, &raw_event("u-2")).await;

    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        fast_config(vec![format!("{}/hook", server.uri())]),
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    wait_for(|| async {
        store.items(PENDING).await.is_empty() && store.items(IN_FLIGHT).await.is_empty()
    })
    .await;

    let stats = engine.stats().await;
    engine.shutdown().await.expect("engine should drain");

    assert_eq!(stats.events_dequeued, 2);
    server.verify().await;
}

#[tokio::test]
async fn empty_queue_polls_exactly_once_per_idle_interval() {
    let store = Arc::new(MockQueueStore::new());
    let clock = TestClock::new();
    let idle = Duration::from_millis(100);

    let config = FanoutConfig {
        endpoints: vec!["http://127.0.0.1:1/hook".to_string()],
        idle_interval: idle,
        ..FanoutConfig::default()
    };
    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        config,
        Arc::new(clock.clone()) as Arc<dyn Clock>,
    )
    .expect("engine should build");
    engine.start();

    // Let the loop spin through a number of virtual-time iterations.
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.shutdown().await.expect("engine should drain");

    let calls = u32::try_from(store.move_attempts().await).expect("attempt count fits in u32");
    assert!(calls >= 2, "loop should have polled repeatedly, saw {calls}");
    // One idle sleep per poll: no busy-spin tighter than the interval.
    assert_eq!(clock.elapsed(), idle * calls);
}

#[tokio::test]
async fn events_are_claimed_in_queue_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let store = Arc::new(MockQueueStore::new());
    let first = raw_event("first");
    let second = raw_event("second");
    store.seed(PENDING, &first).await;
    store.seed(PENDING, &second).await;

    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        fast_config(vec![format!("{}/hook", server.uri())]),
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    wait_for(|| async { store.moved_values().await.len() == 2 }).await;
    engine.shutdown().await.expect("engine should drain");

    assert_eq!(store.moved_values().await, vec![first, second]);
}

#[tokio::test]
async fn shutdown_drains_in_flight_fanouts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MockQueueStore::new());
    store.seed(PENDING, &raw_event("u-1")).await;

    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        fast_config(vec![format!("{}/slow", server.uri())]),
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    // Wait until the event is claimed, then shut down while the HTTP
    // request is still in flight.
    wait_for(|| async { !store.moved_values().await.is_empty() }).await;
    engine.shutdown().await.expect("drain should wait for the fanout");

    assert!(store.items(IN_FLIGHT).await.is_empty(), "fanout completed during drain");
    server.verify().await;
}

#[tokio::test]
async fn shutdown_reports_timeout_when_a_fanout_cannot_finish() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let store = Arc::new(MockQueueStore::new());
    store.seed(PENDING, &raw_event("u-1")).await;

    let config = FanoutConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..fast_config(vec![format!("{}/hook", server.uri())])
    };
    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        config,
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    wait_for(|| async { !store.moved_values().await.is_empty() }).await;
    let result = engine.shutdown().await;

    assert!(matches!(result, Err(DeliveryError::ShutdownTimeout { .. })));
}

#[tokio::test]
async fn store_errors_do_not_kill_the_loop() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let store = Arc::new(MockQueueStore::new());
    store.inject_move_error("transient redis failure").await;
    store.seed(PENDING, &raw_event("u-1")).await;

    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        fast_config(vec![format!("{}/hook", server.uri())]),
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    wait_for(|| async { store.items(PENDING).await.is_empty() }).await;
    let stats = engine.stats().await;
    engine.shutdown().await.expect("engine should drain");

    assert_eq!(stats.events_dequeued, 1, "event claimed after the failed poll");
}

#[tokio::test]
async fn undecodable_claims_are_counted() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let store = Arc::new(MockQueueStore::new());
    store.seed(PENDING, "garbage").await;

    let mut engine = FanoutEngine::new(
        store.clone() as Arc<dyn QueueStore>,
        fast_config(vec![format!("{}/hook", server.uri())]),
        Arc::new(RealClock),
    )
    .expect("engine should build");
    engine.start();

    wait_for(|| async { store.items(IN_FLIGHT).await.is_empty() && store.items(PENDING).await.is_empty() })
        .await;
    let stats = engine.stats().await;
    engine.shutdown().await.expect("engine should drain");

    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.events_dequeued, 1);
}
