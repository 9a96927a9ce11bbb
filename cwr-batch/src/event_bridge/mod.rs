//! Cross-context coordinate fan-out
//!
//! The bridge publishes one [`GeoEvent`] through an ordered list of
//! independently failable [`DeliveryTransport`]s:
//!
//! 1. **local**: the in-process `EventBus` (SSE clients and other listeners)
//! 2. **enclosing**: the parent context's message port, when embedded
//! 3. **nested**: every registered child context's message port
//! 4. **direct**: a known receiver's `update` method, held weakly
//!
//! Transports run synchronously in order. A failing transport is logged and
//! the next one still runs. Delivery is best-effort; receivers key on
//! `recordId` and treat repeats idempotently.

pub mod board;
pub mod ports;
pub mod transports;

pub use board::CoordinateBoard;
pub use ports::{ChannelPort, ContextTopology, CoordinateReceiver, MessagePort, WebhookPort};
pub use transports::{DirectReceiver, EnclosingContext, LocalDispatch, NestedContexts};

use cwr_common::events::{EventBus, GeoEvent};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to serialize event: {0}")]
    Serialize(String),

    #[error("Message port {port} closed")]
    PortClosed { port: String },

    #[error("Message port {port} is full")]
    PortFull { port: String },

    #[error("No async runtime available to post to {port}")]
    NoRuntime { port: String },

    #[error("Receiver rejected update: {0}")]
    Receiver(String),

    #[error("{failed} of {total} nested contexts failed: {first}")]
    Nested {
        failed: usize,
        total: usize,
        first: String,
    },
}

/// Outcome of one transport that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to `n` receivers
    Delivered(usize),
    /// Nothing to deliver to
    Skipped,
}

/// One way of reaching receivers
pub trait DeliveryTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver `event`; `message` is its structured `{ type, detail }` form
    fn send(&self, event: &GeoEvent, message: &Value) -> Result<Delivery, DeliveryError>;
}

/// Per-transport outcome as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum TransportStatus {
    Delivered(usize),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportOutcome {
    pub transport: &'static str,
    #[serde(flatten)]
    pub status: TransportStatus,
}

/// What happened on each transport for one `deliver` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub outcomes: Vec<TransportOutcome>,
}

impl DeliveryReport {
    pub fn outcome(&self, transport: &str) -> Option<&TransportStatus> {
        self.outcomes
            .iter()
            .find(|o| o.transport == transport)
            .map(|o| &o.status)
    }

    /// Total receivers reached across transports
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                TransportStatus::Delivered(n) => n,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, TransportStatus::Failed(_)))
            .count()
    }
}

/// Publisher over the ordered transport list
pub struct EventBridge {
    transports: Vec<Box<dyn DeliveryTransport>>,
}

impl EventBridge {
    /// Standard four-transport bridge
    pub fn new(event_bus: EventBus, topology: Arc<ContextTopology>) -> Self {
        Self::with_transports(vec![
            Box::new(LocalDispatch::new(event_bus)),
            Box::new(EnclosingContext::new(topology.clone())),
            Box::new(NestedContexts::new(topology.clone())),
            Box::new(DirectReceiver::new(topology)),
        ])
    }

    pub fn with_transports(transports: Vec<Box<dyn DeliveryTransport>>) -> Self {
        Self { transports }
    }

    /// Append a transport after the existing ones
    pub fn push_transport(&mut self, transport: Box<dyn DeliveryTransport>) {
        self.transports.push(transport);
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Fan `event` out through every transport
    pub fn deliver(&self, event: &GeoEvent) -> DeliveryReport {
        let message = match event.to_message() {
            Ok(message) => message,
            Err(e) => {
                let error = DeliveryError::Serialize(e.to_string());
                warn!(event = event.event_type(), error = %error, "Event not deliverable");
                return DeliveryReport {
                    outcomes: self
                        .transports
                        .iter()
                        .map(|t| TransportOutcome {
                            transport: t.name(),
                            status: TransportStatus::Failed(error.to_string()),
                        })
                        .collect(),
                };
            }
        };

        let outcomes = self
            .transports
            .iter()
            .map(|transport| {
                let status = match transport.send(event, &message) {
                    Ok(Delivery::Delivered(n)) => {
                        debug!(transport = transport.name(), receivers = n, "Event delivered");
                        TransportStatus::Delivered(n)
                    }
                    Ok(Delivery::Skipped) => TransportStatus::Skipped,
                    Err(e) => {
                        warn!(
                            transport = transport.name(),
                            event = event.event_type(),
                            error = %e,
                            "Event delivery failed"
                        );
                        TransportStatus::Failed(e.to_string())
                    }
                };
                TransportOutcome {
                    transport: transport.name(),
                    status,
                }
            })
            .collect();

        DeliveryReport { outcomes }
    }
}
