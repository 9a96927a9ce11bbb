//! Per-plugin transport strategies
//!
//! Every plugin is called through a [`PluginTransport`]. The
//! [`TransportTable`] maps plugin names to transports so a plugin needing a
//! different call path is a configuration entry, not a code branch.
//!
//! Built-in transports:
//! - [`JsonTransport`]: pooled connection, body read in one call
//! - [`ChunkedTransport`]: dedicated connection, body drained chunk by chunk
//!   (the aggregate meta plugin's responses are lost on the pooled path)

use async_trait::async_trait;
use cwr_common::config::TransportKind;
use reqwest::header::{ACCEPT, CONNECTION};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const USER_AGENT: &str = concat!("Cachewright/", env!("CARGO_PKG_VERSION"));

/// Connect timeout for backend calls; requests themselves are not time-limited
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Aggregate plugin bundling sub-plugin results
pub const META_PLUGIN_NAME: &str = "metasolver";

/// Transport-level failures (no HTTP response to interpret)
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Raw HTTP outcome handed back to the invoker
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One way of calling a plugin's execute endpoint
#[async_trait]
pub trait PluginTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// POST `body` as JSON to `url`
    async fn execute(&self, url: &str, body: &Value) -> Result<TransportResponse, TransportError>;
}

/// Build the shared HTTP client used for every backend call
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

/// Pooled JSON request, whole body read at once
pub struct JsonTransport {
    client: reqwest::Client,
}

impl JsonTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginTransport for JsonTransport {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn execute(&self, url: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

/// JSON request on a dedicated connection, body drained chunk by chunk
pub struct ChunkedTransport {
    client: reqwest::Client,
}

impl ChunkedTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginTransport for ChunkedTransport {
    fn name(&self) -> &'static str {
        "chunked"
    }

    async fn execute(&self, url: &str, body: &Value) -> Result<TransportResponse, TransportError> {
        let mut response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONNECTION, "close")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let mut buffer = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
        {
            buffer.extend_from_slice(&chunk);
        }
        debug!(bytes = buffer.len(), "Chunked transport drained response");

        Ok(TransportResponse {
            status,
            body: String::from_utf8_lossy(&buffer).into_owned(),
        })
    }
}

/// Built-in transport for a configured kind
pub fn transport_for(kind: TransportKind, client: reqwest::Client) -> Arc<dyn PluginTransport> {
    match kind {
        TransportKind::Json => Arc::new(JsonTransport::new(client)),
        TransportKind::Chunked => Arc::new(ChunkedTransport::new(client)),
    }
}

/// Overrides applied before configuration: the meta plugin uses the chunked transport
pub fn default_overrides() -> BTreeMap<String, TransportKind> {
    BTreeMap::from([(META_PLUGIN_NAME.to_string(), TransportKind::Chunked)])
}

/// Transport selection by plugin name
#[derive(Clone)]
pub struct TransportTable {
    default: Arc<dyn PluginTransport>,
    overrides: HashMap<String, Arc<dyn PluginTransport>>,
}

impl TransportTable {
    pub fn new(default: Arc<dyn PluginTransport>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Table from configuration: JSON by default, plus one entry per override
    pub fn from_config(client: reqwest::Client, overrides: &BTreeMap<String, TransportKind>) -> Self {
        let mut table = Self::new(transport_for(TransportKind::Json, client.clone()));
        for (plugin, kind) in overrides {
            table.register(plugin.clone(), transport_for(*kind, client.clone()));
        }
        table
    }

    /// Route `plugin_name` through `transport`
    pub fn register(&mut self, plugin_name: impl Into<String>, transport: Arc<dyn PluginTransport>) -> &mut Self {
        self.overrides.insert(plugin_name.into(), transport);
        self
    }

    /// Transport for `plugin_name` (the default when no override exists)
    pub fn select(&self, plugin_name: &str) -> Arc<dyn PluginTransport> {
        self.overrides
            .get(plugin_name)
            .unwrap_or(&self.default)
            .clone()
    }
}
