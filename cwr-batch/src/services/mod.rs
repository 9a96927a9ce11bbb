//! Batch pipeline services
//!
//! - `result_normalizer`: plugin payload → `NormalizedResult`
//! - `plugin_transport` / `plugin_invoker`: per-plugin HTTP call paths
//! - `persistence_gateway`: coordinate write-back
//! - `plugin_catalog`: available solver plugins
//! - `batch_orchestrator`: sequential run over a record set

pub mod batch_orchestrator;
pub mod persistence_gateway;
pub mod plugin_catalog;
pub mod plugin_invoker;
pub mod plugin_transport;
pub mod result_normalizer;

pub use batch_orchestrator::{BatchError, BatchOrchestrator};
pub use persistence_gateway::{
    CoordinatePersistence, HttpPersistenceGateway, PersistenceError, SaveOutcome,
};
pub use plugin_catalog::{CatalogError, PluginCatalog, PluginInfo};
pub use plugin_invoker::PluginInvoker;
pub use plugin_transport::{
    build_http_client, ChunkedTransport, JsonTransport, PluginTransport, TransportError,
    TransportResponse, TransportTable,
};
pub use result_normalizer::ResultNormalizer;
