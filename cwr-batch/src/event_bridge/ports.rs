//! Execution-context plumbing
//!
//! Other contexts are reached only through structured messages posted to a
//! [`MessagePort`]. The [`ContextTopology`] records which ports exist: the
//! enclosing context's port (when this service is embedded), the ports of
//! nested contexts registered at runtime, and an optional direct receiver.

use cwr_common::events::CoordinateUpdate;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::DeliveryError;

/// Endpoint accepting structured `{ type, detail }` messages
pub trait MessagePort: Send + Sync {
    /// Human-readable port identity for logs and errors
    fn describe(&self) -> String;

    /// Post `message` without waiting for the receiving context
    fn post(&self, message: &Value) -> Result<(), DeliveryError>;
}

/// Object in this context that accepts coordinate updates directly
pub trait CoordinateReceiver: Send + Sync {
    fn update(&self, update: &CoordinateUpdate) -> Result<(), DeliveryError>;
}

/// In-process port backed by a bounded tokio channel
pub struct ChannelPort {
    label: String,
    tx: mpsc::Sender<Value>,
}

impl ChannelPort {
    /// Port plus the receiving end for the other context
    pub fn new(label: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                label: label.into(),
                tx,
            },
            rx,
        )
    }
}

impl MessagePort for ChannelPort {
    fn describe(&self) -> String {
        format!("channel:{}", self.label)
    }

    fn post(&self, message: &Value) -> Result<(), DeliveryError> {
        self.tx.try_send(message.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::PortFull {
                port: self.describe(),
            },
            mpsc::error::TrySendError::Closed(_) => DeliveryError::PortClosed {
                port: self.describe(),
            },
        })
    }
}

/// Upper bound on one webhook POST, connection included
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Port for a context reachable over HTTP: POSTs the message as JSON
///
/// The request runs on a spawned task bounded by a timeout; its outcome is
/// only logged.
pub struct WebhookPort {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl WebhookPort {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self::with_timeout(client, url, WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts spawned and not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl MessagePort for WebhookPort {
    fn describe(&self) -> String {
        format!("webhook:{}", self.url)
    }

    fn post(&self, message: &Value) -> Result<(), DeliveryError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| DeliveryError::NoRuntime {
            port: self.describe(),
        })?;

        let request = self.client.post(&self.url).timeout(self.timeout).json(message);
        let url = self.url.clone();
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "Webhook message posted");
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status().as_u16(), "Webhook rejected message");
                }
                Err(e) if e.is_timeout() => {
                    warn!(url = %url, "Webhook post timed out");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Webhook post failed");
                }
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }
}

/// Ports and receivers reachable from this context
#[derive(Default)]
pub struct ContextTopology {
    parent: RwLock<Option<Arc<dyn MessagePort>>>,
    children: RwLock<Vec<Arc<dyn MessagePort>>>,
    receiver: RwLock<Option<Weak<dyn CoordinateReceiver>>>,
}

impl ContextTopology {
    /// Topology of a context embedded in `parent`
    pub fn embedded(parent: Arc<dyn MessagePort>) -> Self {
        let topology = Self::default();
        topology.set_parent(Some(parent));
        topology
    }

    pub fn set_parent(&self, parent: Option<Arc<dyn MessagePort>>) {
        *self.parent.write().unwrap_or_else(PoisonError::into_inner) = parent;
    }

    pub fn parent(&self) -> Option<Arc<dyn MessagePort>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_embedded(&self) -> bool {
        self.parent().is_some()
    }

    /// Register a nested context; returns the number of nested contexts
    ///
    /// A port with the same description replaces the earlier registration.
    pub fn add_child(&self, port: Arc<dyn MessagePort>) -> usize {
        let description = port.describe();
        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        match children.iter().position(|child| child.describe() == description) {
            Some(index) => children[index] = port,
            None => children.push(port),
        }
        children.len()
    }

    /// Forget the nested context with `description`; false when unknown
    pub fn remove_child(&self, description: &str) -> bool {
        let mut children = self.children.write().unwrap_or_else(PoisonError::into_inner);
        let before = children.len();
        children.retain(|child| child.describe() != description);
        children.len() != before
    }

    pub fn children(&self) -> Vec<Arc<dyn MessagePort>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn child_descriptions(&self) -> Vec<String> {
        self.children().iter().map(|port| port.describe()).collect()
    }

    /// Remember `receiver` without keeping it alive
    pub fn set_receiver(&self, receiver: &Arc<dyn CoordinateReceiver>) {
        *self.receiver.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::downgrade(receiver));
    }

    /// The direct receiver, if one is registered and still alive
    pub fn receiver(&self) -> Option<Arc<dyn CoordinateReceiver>> {
        self.receiver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}
