//! Event Bridge Tests
//!
//! Test File: event_bridge_tests.rs
//! Requirements: coordinate-updated fan-out over local dispatch, enclosing
//! context, nested contexts and direct receiver; per-transport isolation

mod helpers;

use cwr_batch::event_bridge::{
    ChannelPort, ContextTopology, CoordinateReceiver, DeliveryError, EventBridge, TransportStatus,
    WebhookPort,
};
use cwr_batch::services::build_http_client;
use cwr_common::events::{BatchProgress, CoordinateUpdate, EventBus, GeoEvent};
use helpers::FakeBackend;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingReceiver {
    updates: Mutex<Vec<CoordinateUpdate>>,
}

impl CoordinateReceiver for RecordingReceiver {
    fn update(&self, update: &CoordinateUpdate) -> Result<(), DeliveryError> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(())
    }
}

fn coordinate_event(record_id: i64) -> GeoEvent {
    GeoEvent::CoordinateUpdated(CoordinateUpdate {
        record_id,
        latitude: 49.7593,
        longitude: 5.9759,
        saved: true,
        raw: json!({ "ddm": "N 49° 45.558 E 005° 58.554" }),
    })
}

/// TC-BRIDGE-001: Standalone context still dispatches locally
/// **Type:** Unit Test | **Priority:** P0
#[tokio::test]
async fn test_standalone_local_dispatch() {
    // Given: no parent, no children, no receiver; one local listener
    let bus = EventBus::new(8);
    let mut rx = bus.subscribe();
    let bridge = EventBridge::new(bus.clone(), Arc::new(ContextTopology::default()));

    // When
    let report = bridge.deliver(&coordinate_event(1));

    // Then: only local dispatch did anything, nothing failed
    assert_eq!(report.outcome("local"), Some(&TransportStatus::Delivered(1)));
    assert_eq!(report.outcome("enclosing"), Some(&TransportStatus::Skipped));
    assert_eq!(report.outcome("nested"), Some(&TransportStatus::Skipped));
    assert_eq!(report.outcome("direct"), Some(&TransportStatus::Skipped));
    assert_eq!(report.failures(), 0);
    assert!(matches!(rx.try_recv(), Ok(GeoEvent::CoordinateUpdated(u)) if u.record_id == 1));
}

/// TC-BRIDGE-002: No local listeners is skipped, not failed
/// **Type:** Unit Test | **Priority:** P2
#[tokio::test]
async fn test_no_local_listeners() {
    let bridge = EventBridge::new(EventBus::new(8), Arc::new(ContextTopology::default()));

    let report = bridge.deliver(&coordinate_event(1));

    assert_eq!(report.outcome("local"), Some(&TransportStatus::Skipped));
    assert_eq!(report.delivered(), 0);
    assert_eq!(report.failures(), 0);
}

/// TC-BRIDGE-003: Enclosing context receives the structured message
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn test_enclosing_context_message() {
    let (port, mut parent_rx) = ChannelPort::new("parent", 4);
    let topology = Arc::new(ContextTopology::embedded(Arc::new(port)));
    let bridge = EventBridge::new(EventBus::new(8), topology.clone());

    let report = bridge.deliver(&coordinate_event(9));

    assert!(topology.is_embedded());
    assert_eq!(report.outcome("enclosing"), Some(&TransportStatus::Delivered(1)));
    let message = parent_rx.try_recv().unwrap();
    assert_eq!(message["type"], "coordinate-updated");
    assert_eq!(message["detail"]["recordId"], 9);
    assert_eq!(message["detail"]["saved"], true);
    assert_eq!(message["detail"]["raw"]["ddm"], "N 49° 45.558 E 005° 58.554");
}

/// TC-BRIDGE-004: A closed nested context fails alone; other transports still deliver
/// **Type:** Integration Test | **Priority:** P0
#[tokio::test]
async fn test_failure_isolated_per_transport() {
    // Given: two nested contexts (one gone), a parent and a direct receiver
    let topology = Arc::new(ContextTopology::default());
    let (live, mut live_rx) = ChannelPort::new("live", 4);
    let (gone, gone_rx) = ChannelPort::new("gone", 4);
    drop(gone_rx);
    topology.add_child(Arc::new(gone));
    topology.add_child(Arc::new(live));
    let (parent, mut parent_rx) = ChannelPort::new("parent", 4);
    topology.set_parent(Some(Arc::new(parent)));
    let receiver = Arc::new(RecordingReceiver::default());
    let as_receiver: Arc<dyn CoordinateReceiver> = receiver.clone();
    topology.set_receiver(&as_receiver);

    let bridge = EventBridge::new(EventBus::new(8), topology);

    // When
    let report = bridge.deliver(&coordinate_event(5));

    // Then: nested reports the failure, the live child still got the message
    assert!(matches!(report.outcome("nested"), Some(TransportStatus::Failed(msg)) if msg.contains("1 of 2")));
    assert_eq!(live_rx.try_recv().unwrap()["detail"]["recordId"], 5);

    // And: the remaining transports were unaffected
    assert_eq!(report.outcome("enclosing"), Some(&TransportStatus::Delivered(1)));
    assert!(parent_rx.try_recv().is_ok());
    assert_eq!(report.outcome("direct"), Some(&TransportStatus::Delivered(1)));
    assert_eq!(receiver.updates.lock().unwrap()[0].record_id, 5);
    assert_eq!(report.failures(), 1);
}

/// TC-BRIDGE-005: A dropped direct receiver is skipped
/// **Type:** Unit Test | **Priority:** P2
#[tokio::test]
async fn test_dropped_direct_receiver() {
    let topology = Arc::new(ContextTopology::default());
    {
        let receiver: Arc<dyn CoordinateReceiver> = Arc::new(RecordingReceiver::default());
        topology.set_receiver(&receiver);
        assert!(topology.receiver().is_some());
    }
    let bridge = EventBridge::new(EventBus::new(8), topology.clone());

    let report = bridge.deliver(&coordinate_event(1));

    assert!(topology.receiver().is_none());
    assert_eq!(report.outcome("direct"), Some(&TransportStatus::Skipped));
}

/// TC-BRIDGE-006: Non-coordinate events never reach the direct receiver
/// **Type:** Unit Test | **Priority:** P2
#[tokio::test]
async fn test_direct_receiver_only_takes_coordinates() {
    let topology = Arc::new(ContextTopology::default());
    let receiver = Arc::new(RecordingReceiver::default());
    let as_receiver: Arc<dyn CoordinateReceiver> = receiver.clone();
    topology.set_receiver(&as_receiver);
    let bridge = EventBridge::new(EventBus::new(8), topology);

    let report = bridge.deliver(&GeoEvent::BatchProgress(BatchProgress {
        run_id: uuid::Uuid::new_v4(),
        cursor: 1,
        total: 2,
        percentage: 50.0,
        record_id: 1,
        timestamp: chrono::Utc::now(),
    }));

    assert_eq!(report.outcome("direct"), Some(&TransportStatus::Skipped));
    assert!(receiver.updates.lock().unwrap().is_empty());
}

/// TC-BRIDGE-007: Webhook parent receives the message over HTTP
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_webhook_parent() {
    // Given: the enclosing context is reachable over HTTP
    let backend = FakeBackend::start().await;
    let port = WebhookPort::new(build_http_client().unwrap(), format!("{}/messages", backend.base_url));
    let bridge = EventBridge::new(EventBus::new(8), Arc::new(ContextTopology::embedded(Arc::new(port))));

    // When
    let report = bridge.deliver(&coordinate_event(3));

    // Then: the post is accepted immediately and lands shortly after
    assert_eq!(report.outcome("enclosing"), Some(&TransportStatus::Delivered(1)));
    let messages = backend.wait_for_messages(1).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "coordinate-updated");
    assert_eq!(messages[0]["detail"]["recordId"], 3);
}

/// TC-BRIDGE-008: Webhook posting outside a runtime fails without panicking
/// **Type:** Unit Test | **Priority:** P2
#[test]
fn test_webhook_without_runtime() {
    let port = WebhookPort::new(build_http_client().unwrap(), "http://127.0.0.1:9/messages");
    let bridge = EventBridge::new(EventBus::new(8), Arc::new(ContextTopology::embedded(Arc::new(port))));

    let report = bridge.deliver(&coordinate_event(1));

    assert!(matches!(report.outcome("enclosing"), Some(TransportStatus::Failed(msg)) if msg.contains("runtime")));
}

/// TC-BRIDGE-009: A context that never answers does not pin the post forever
/// **Type:** Integration Test | **Priority:** P1
#[tokio::test]
async fn test_webhook_post_times_out() {
    // Given: a nested context that accepts the connection and never responds
    let backend = FakeBackend::start().await;
    let port = Arc::new(WebhookPort::with_timeout(
        build_http_client().unwrap(),
        format!("{}/hang", backend.base_url),
        Duration::from_millis(100),
    ));
    let topology = ContextTopology::default();
    topology.add_child(port.clone());
    let bridge = EventBridge::new(EventBus::new(8), Arc::new(topology));

    // When
    let report = bridge.deliver(&coordinate_event(4));
    assert_eq!(report.outcome("nested"), Some(&TransportStatus::Delivered(1)));

    // Then: the spawned post gives up after the timeout
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while port.in_flight() > 0 {
        assert!(tokio::time::Instant::now() < deadline, "webhook post still pending");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
