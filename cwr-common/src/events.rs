//! Event types for the Cachewright event system
//!
//! Provides the shared `GeoEvent` definitions and the in-process `EventBus`.
//!
//! Every event serializes to the structured message shape used across
//! execution contexts:
//!
//! ```json
//! { "type": "coordinate-updated", "detail": { "recordId": 42, "latitude": 49.7593, ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Payload of a `coordinate-updated` message
///
/// Receivers key on `record_id` and treat repeated deliveries idempotently
/// (last value wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateUpdate {
    /// Record the coordinate belongs to
    pub record_id: i64,
    /// Decimal latitude
    pub latitude: f64,
    /// Decimal longitude
    pub longitude: f64,
    /// Whether the coordinate was written back to the record's backend
    pub saved: bool,
    /// Raw candidate as produced by the extractor (DDM text, source, certainty)
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Batch run started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStarted {
    pub run_id: Uuid,
    pub plugin_name: String,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

/// Batch run progress `(cursor, total)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub run_id: Uuid,
    /// Records processed so far
    pub cursor: usize,
    /// Size of the working set
    pub total: usize,
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,
    /// Record that was just processed
    pub record_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A result row was appended to the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRowAppended {
    pub run_id: Uuid,
    /// Zero-based row index
    pub index: usize,
    pub record_id: i64,
    pub code: String,
    /// True when the row carries a coordinate
    pub detected: bool,
    /// True when the plugin call failed
    pub is_error: bool,
}

/// Batch run finished (completed or stopped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCompleted {
    pub run_id: Uuid,
    /// Rows produced
    pub processed: usize,
    /// Size of the working set
    pub total: usize,
    /// Rows carrying a coordinate
    pub detected: usize,
    /// Rows produced from failed plugin calls
    pub errors: usize,
    /// True when the run ended through a stop request
    pub stopped: bool,
    pub timestamp: DateTime<Utc>,
}

/// Cachewright event types
///
/// Events are broadcast via `EventBus` and serialized as `{ type, detail }`
/// messages for SSE and cross-context delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum GeoEvent {
    /// A record has a new best-known coordinate
    ///
    /// Triggers:
    /// - Map surfaces: redraw the record's marker
    /// - Result tables: refresh the record's row
    CoordinateUpdated(CoordinateUpdate),

    /// Batch run started
    BatchStarted(BatchStarted),

    /// One record processed
    BatchProgress(BatchProgress),

    /// Result row appended
    BatchRowAppended(BatchRowAppended),

    /// Batch run finished
    BatchCompleted(BatchCompleted),
}

impl GeoEvent {
    /// Event name as it appears in the `type` field of the structured message
    pub fn event_type(&self) -> &'static str {
        match self {
            GeoEvent::CoordinateUpdated(_) => "coordinate-updated",
            GeoEvent::BatchStarted(_) => "batch-started",
            GeoEvent::BatchProgress(_) => "batch-progress",
            GeoEvent::BatchRowAppended(_) => "batch-row-appended",
            GeoEvent::BatchCompleted(_) => "batch-completed",
        }
    }

    /// Structured cross-context message for this event
    pub fn to_message(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cwr_common::events::{CoordinateUpdate, EventBus, GeoEvent};
///
/// let event_bus = EventBus::new(16);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(GeoEvent::CoordinateUpdated(CoordinateUpdate {
///     record_id: 7,
///     latitude: 49.7593,
///     longitude: 5.9759,
///     saved: false,
///     raw: serde_json::Value::Null,
/// })).ok();
///
/// assert!(matches!(rx.try_recv(), Ok(GeoEvent::CoordinateUpdated(_))));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GeoEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<GeoEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: GeoEvent) -> Result<usize, broadcast::error::SendError<GeoEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GeoEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
