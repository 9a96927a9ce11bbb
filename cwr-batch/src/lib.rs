//! cwr-batch library interface
//!
//! Batch plugin solver: runs a decoding plugin over a set of geocache
//! records, normalizes what each call returns, and fans detected coordinates
//! out to every reachable execution context.

pub mod api;
pub mod config;
pub mod error;
pub mod event_bridge;
pub mod extractors;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use cwr_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::event_bridge::{
    ContextTopology, CoordinateBoard, CoordinateReceiver, EventBridge, WebhookPort,
};
use crate::services::{
    build_http_client, BatchOrchestrator, HttpPersistenceGateway, PluginCatalog, PluginInvoker,
    ResultNormalizer, TransportTable,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Sequential batch runner (owns the current run)
    pub orchestrator: Arc<BatchOrchestrator>,
    /// Solver plugin listing
    pub catalog: Arc<PluginCatalog>,
    /// Event bus for SSE and local dispatch
    pub event_bus: EventBus,
    /// Enclosing / nested contexts reachable by the event bridge
    pub topology: Arc<ContextTopology>,
    /// Latest detected coordinate per record (the topology's direct receiver)
    pub coordinates: Arc<CoordinateBoard>,
    /// Shared HTTP client (webhook ports registered at runtime reuse it)
    pub http_client: reqwest::Client,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<BatchOrchestrator>,
        catalog: Arc<PluginCatalog>,
        event_bus: EventBus,
        topology: Arc<ContextTopology>,
        http_client: reqwest::Client,
    ) -> Self {
        let coordinates = Arc::new(CoordinateBoard::new());
        let receiver: Arc<dyn CoordinateReceiver> = coordinates.clone();
        topology.set_receiver(&receiver);

        Self {
            orchestrator,
            catalog,
            event_bus,
            topology,
            coordinates,
            http_client,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Wire the full pipeline against the configured backend
    pub fn from_config(config: &ServiceConfig) -> cwr_common::Result<Self> {
        let http_client = build_http_client()
            .map_err(|e| cwr_common::Error::Internal(format!("HTTP client: {}", e)))?;
        let event_bus = EventBus::new(config.event_capacity);

        let topology = Arc::new(ContextTopology::default());
        if let Some(url) = &config.parent_context_url {
            topology.set_parent(Some(Arc::new(WebhookPort::new(http_client.clone(), url.as_str()))));
        }

        let transports = TransportTable::from_config(http_client.clone(), &config.transports);
        let invoker = Arc::new(PluginInvoker::new(
            config.backend_url.as_str(),
            transports,
            ResultNormalizer::default(),
        ));
        let persistence = Arc::new(HttpPersistenceGateway::new(
            http_client.clone(),
            config.backend_url.as_str(),
        ));
        let bridge = Arc::new(EventBridge::new(event_bus.clone(), topology.clone()));
        let orchestrator = Arc::new(BatchOrchestrator::new(
            invoker,
            persistence,
            bridge,
            event_bus.clone(),
        ));
        let catalog = Arc::new(PluginCatalog::new(
            http_client.clone(),
            config.backend_url.as_str(),
        ));

        Ok(Self::new(orchestrator, catalog, event_bus, topology, http_client))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::batch_routes())
        .merge(api::plugin_routes())
        .merge(api::context_routes())
        .merge(api::coordinate_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
