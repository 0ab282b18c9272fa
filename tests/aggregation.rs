//! End-to-end scenarios exercising the ingress queue, worker pool, aggregator, and window
//! lifecycle together.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use event_aggregator::aggregator::Aggregator;
use event_aggregator::event::Event;
use event_aggregator::ingest::{IngressQueue, WorkerPool};
use event_aggregator::window::WindowManager;

fn pageview(user_id: &str, timestamp: DateTime<Utc>) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        event_type: "pageview".to_string(),
        timestamp,
        user_id: Some(user_id.to_string()),
        session_id: None,
        properties: HashMap::new(),
    }
}

fn click(element: &str) -> Event {
    let mut properties = HashMap::new();
    properties.insert("element".to_string(), serde_json::json!(element));
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        event_type: "click".to_string(),
        timestamp: Utc::now(),
        user_id: None,
        session_id: None,
        properties,
    }
}

fn purchase(user_id: &str, amount: f64) -> Event {
    let mut properties = HashMap::new();
    properties.insert("amount".to_string(), serde_json::json!(amount));
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        event_type: "purchase".to_string(),
        timestamp: Utc::now(),
        user_id: Some(user_id.to_string()),
        session_id: None,
        properties,
    }
}

/// E4: mixed event types with overlapping user ids.
#[test]
fn mixed_event_types_scenario() {
    let aggregator = Aggregator::new(Duration::minutes(1), StdDuration::from_secs(5));
    let now = Utc::now();

    aggregator.process_event(&pageview("u1", now));
    aggregator.process_event(&pageview("u2", now));
    aggregator.process_event(&click("button"));
    aggregator.process_event(&purchase("u2", 99.99));

    assert_eq!(aggregator.global_metric_value("total_events"), Some(4.0));
    assert_eq!(aggregator.global_metric_value("pageviews"), Some(2.0));
    assert_eq!(aggregator.global_metric_value("clicks"), Some(1.0));
    assert_eq!(aggregator.global_metric_value("purchases"), Some(1.0));
    let stats = aggregator.stats();
    assert_eq!(stats.unique_users, 2);
}

/// E5: 10 concurrent producers x 100 events each, all through the real ingress queue and
/// worker pool (not a direct `process_event` call), asserting deterministic totals regardless
/// of interleaving.
#[tokio::test]
async fn concurrent_ingestion_produces_deterministic_totals() {
    let aggregator = Arc::new(Aggregator::new(Duration::minutes(5), StdDuration::from_secs(5)));
    let (queue, receiver) = IngressQueue::new(4096);
    let pool = WorkerPool::spawn(8, receiver, aggregator.clone());

    let mut producers = Vec::new();
    for producer_id in 0..10 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            let user_id = format!("u{producer_id}");
            for _ in 0..100 {
                let event = pageview(&user_id, Utc::now());
                loop {
                    match queue.try_enqueue(event.clone()) {
                        Ok(()) => break,
                        Err(event_aggregator::error::AggregatorError::Backpressure) => {
                            tokio::task::yield_now().await;
                        }
                        Err(other) => panic!("unexpected enqueue error: {other}"),
                    }
                }
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    drop(queue);
    pool.join().await;

    assert_eq!(aggregator.global_metric_value("total_events"), Some(1000.0));
    assert_eq!(aggregator.stats().unique_users, 10);
}

/// E6: window expiry, active/should-close transitions, and exactly-once callback dispatch.
#[test]
fn window_expiry_scenario() {
    let manager = WindowManager::new(Duration::minutes(1));
    let t0 = DateTime::from_timestamp(0, 0).unwrap();

    let window = manager.get_or_create_window(t0);
    assert!(window.is_active(t0 + Duration::seconds(30)));
    assert!(!window.should_close(t0 + Duration::seconds(30)));

    let past_end = t0 + Duration::seconds(61);
    assert!(window.should_close(past_end));

    let closed = manager.close_expired_windows(past_end);
    assert_eq!(closed.len(), 1);
    assert!(manager.active_windows().is_empty());

    // A second sweep at the same instant closes nothing further.
    assert!(manager.close_expired_windows(past_end).is_empty());
}

/// Invariant 3 & 4 held under a batch with an unevenly distributed set of event types.
#[test]
fn total_events_always_equals_sum_of_per_type_counters() {
    let aggregator = Aggregator::new(Duration::minutes(1), StdDuration::from_secs(5));
    let event_types = ["pageview", "pageview", "pageview", "click", "purchase", "signup"];
    for event_type in event_types {
        aggregator.process_event(&Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            user_id: None,
            session_id: None,
            properties: HashMap::new(),
        });
    }

    let total = aggregator.global_metric_value("total_events").unwrap();
    let mut by_type_sum = 0.0;
    for event_type in ["pageview", "click", "purchase", "signup"] {
        by_type_sum += aggregator
            .global_metric_value(&format!("events_by_type:{event_type}"))
            .unwrap_or(0.0);
    }
    assert_eq!(total, by_type_sum);
    assert_eq!(total, event_types.len() as f64);
}

/// Boundary: a full bounded queue rejects with backpressure and does not affect aggregator
/// state, since the event never reaches a worker.
#[tokio::test]
async fn full_queue_rejects_without_mutating_aggregator_state() {
    let aggregator = Arc::new(Aggregator::new(Duration::minutes(1), StdDuration::from_secs(5)));
    let (queue, _receiver) = IngressQueue::new(1);

    queue.try_enqueue(pageview("u1", Utc::now())).unwrap();
    let result = queue.try_enqueue(pageview("u2", Utc::now()));
    assert!(matches!(
        result,
        Err(event_aggregator::error::AggregatorError::Backpressure)
    ));
    // No worker pool was spawned, so nothing has touched the aggregator yet.
    assert_eq!(aggregator.global_metric_value("total_events"), None);
}

/// Boundary: batch size validation rejects 0 and >1000 without touching any metric state.
#[test]
fn batch_size_validation_boundaries() {
    use event_aggregator::event::{validate_batch_size, MAX_BATCH_SIZE};

    assert!(validate_batch_size(0).is_err());
    assert!(validate_batch_size(1).is_ok());
    assert!(validate_batch_size(MAX_BATCH_SIZE).is_ok());
    assert!(validate_batch_size(MAX_BATCH_SIZE + 1).is_err());
}

/// The window-closed callback fires exactly once per closed window even when several windows
/// expire in the same sweep.
#[test]
fn callback_fires_once_per_window_across_multiple_expirations() {
    let manager = WindowManager::new(Duration::seconds(10));
    let t0 = DateTime::from_timestamp(0, 0).unwrap();

    manager.get_or_create_window(t0);
    manager.get_or_create_window(t0 + Duration::seconds(10));
    manager.get_or_create_window(t0 + Duration::seconds(20));

    let far_future = t0 + Duration::seconds(1000);
    let closed = manager.close_expired_windows(far_future);
    assert_eq!(closed.len(), 3);

    let fire_count = Arc::new(AtomicUsize::new(0));
    for window in &closed {
        assert!(window.closed());
        fire_count.fetch_add(1, Ordering::SeqCst);
    }
    assert_eq!(fire_count.load(Ordering::SeqCst), 3);
    assert!(manager.close_expired_windows(far_future).is_empty());
}
