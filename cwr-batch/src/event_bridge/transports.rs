//! The four standard delivery transports

use cwr_common::events::{EventBus, GeoEvent};
use serde_json::Value;
use std::sync::Arc;

use super::{ContextTopology, Delivery, DeliveryError, DeliveryTransport};

/// In-process listeners on the event bus
pub struct LocalDispatch {
    event_bus: EventBus,
}

impl LocalDispatch {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

impl DeliveryTransport for LocalDispatch {
    fn name(&self) -> &'static str {
        "local"
    }

    fn send(&self, event: &GeoEvent, _message: &Value) -> Result<Delivery, DeliveryError> {
        // No subscribers is not a failure
        Ok(match self.event_bus.emit(event.clone()) {
            Ok(receivers) => Delivery::Delivered(receivers),
            Err(_) => Delivery::Skipped,
        })
    }
}

/// The context this one is embedded in
pub struct EnclosingContext {
    topology: Arc<ContextTopology>,
}

impl EnclosingContext {
    pub fn new(topology: Arc<ContextTopology>) -> Self {
        Self { topology }
    }
}

impl DeliveryTransport for EnclosingContext {
    fn name(&self) -> &'static str {
        "enclosing"
    }

    fn send(&self, _event: &GeoEvent, message: &Value) -> Result<Delivery, DeliveryError> {
        match self.topology.parent() {
            Some(parent) => parent.post(message).map(|()| Delivery::Delivered(1)),
            None => Ok(Delivery::Skipped),
        }
    }
}

/// Every registered nested context
///
/// Each child is posted to even when an earlier one fails; the transport
/// fails only if at least one child did.
pub struct NestedContexts {
    topology: Arc<ContextTopology>,
}

impl NestedContexts {
    pub fn new(topology: Arc<ContextTopology>) -> Self {
        Self { topology }
    }
}

impl DeliveryTransport for NestedContexts {
    fn name(&self) -> &'static str {
        "nested"
    }

    fn send(&self, _event: &GeoEvent, message: &Value) -> Result<Delivery, DeliveryError> {
        let children = self.topology.children();
        if children.is_empty() {
            return Ok(Delivery::Skipped);
        }

        let errors: Vec<DeliveryError> = children
            .iter()
            .filter_map(|child| child.post(message).err())
            .collect();

        match errors.first() {
            None => Ok(Delivery::Delivered(children.len())),
            Some(first) => Err(DeliveryError::Nested {
                failed: errors.len(),
                total: children.len(),
                first: first.to_string(),
            }),
        }
    }
}

/// Known receiver object in this context, called directly
///
/// Only coordinate updates are handed over; other events are skipped.
pub struct DirectReceiver {
    topology: Arc<ContextTopology>,
}

impl DirectReceiver {
    pub fn new(topology: Arc<ContextTopology>) -> Self {
        Self { topology }
    }
}

impl DeliveryTransport for DirectReceiver {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn send(&self, event: &GeoEvent, _message: &Value) -> Result<Delivery, DeliveryError> {
        let GeoEvent::CoordinateUpdated(update) = event else {
            return Ok(Delivery::Skipped);
        };
        match self.topology.receiver() {
            Some(receiver) => receiver.update(update).map(|()| Delivery::Delivered(1)),
            None => Ok(Delivery::Skipped),
        }
    }
}
