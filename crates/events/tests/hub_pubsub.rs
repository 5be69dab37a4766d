use std::sync::Arc;
use std::time::Duration;

use genhub_events::{EventKind, EventSink, ProgressEvent, ProgressHub};

// ---------------------------------------------------------------------------
// Test: per-job order is emission order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_arrive_in_emission_order() {
    let hub = ProgressHub::default();
    let mut sub = hub.subscribe(11).await;

    hub.emit(&ProgressEvent::progress(11, 10.0, "Initializing")).await;
    hub.emit(&ProgressEvent::progress(11, 80.0, "Processing results"))
        .await;
    hub.emit(&ProgressEvent::complete(11, serde_json::json!({"seed": 1})))
        .await;

    let kinds: Vec<(EventKind, Option<f64>)> = [
        sub.recv().await.unwrap(),
        sub.recv().await.unwrap(),
        sub.recv().await.unwrap(),
    ]
    .into_iter()
    .map(|e| (e.kind, e.progress))
    .collect();

    assert_eq!(
        kinds,
        vec![
            (EventKind::Progress, Some(10.0)),
            (EventKind::Progress, Some(80.0)),
            (EventKind::Complete, None),
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: no replay for late subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_late_subscriber_sees_only_new_events() {
    let hub = ProgressHub::default();
    hub.publish(ProgressEvent::progress(12, 10.0, "before"));

    let mut sub = hub.subscribe(12).await;
    hub.publish(ProgressEvent::progress(12, 20.0, "after"));

    let event = sub.recv().await.unwrap();
    assert_eq!(event.message, "after");
}

// ---------------------------------------------------------------------------
// Test: listen_once returns the first event
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_listen_once_returns_first_event() {
    let hub = Arc::new(ProgressHub::default());

    let publisher = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            while hub.listener_count().await == 0 {
                tokio::task::yield_now().await;
            }
            hub.publish(ProgressEvent::error(13, "provider failed"));
            hub.publish(ProgressEvent::progress(13, 90.0, "ignored"));
        })
    };

    let event = hub
        .listen_once(13, Duration::from_secs(5))
        .await
        .expect("event before timeout");
    publisher.await.unwrap();

    assert_eq!(event.kind, EventKind::Error);
    assert_eq!(event.message, "provider failed");
    assert_eq!(hub.listener_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: slow subscriber misses events instead of blocking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_slow_subscriber_skips_overflow() {
    let hub = ProgressHub::with_subscriber_capacity(Default::default(), 2);
    let mut sub = hub.subscribe(14).await;

    for pct in 1..=10 {
        hub.publish(ProgressEvent::progress(14, f64::from(pct), "tick"));
    }
    hub.publish(ProgressEvent::complete(14, serde_json::json!({})));

    let mut last = None;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_millis(200), sub.recv()).await
    {
        let terminal = event.is_terminal();
        last = Some(event);
        if terminal {
            break;
        }
    }
    assert_eq!(last.map(|e| e.kind), Some(EventKind::Complete));
}
