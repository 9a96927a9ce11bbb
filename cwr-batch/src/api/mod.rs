//! HTTP API handlers for cwr-batch
//!
//! REST endpoints for batch control plus an SSE stream of `GeoEvent`s.

pub mod batch;
pub mod contexts;
pub mod coordinates;
pub mod health;
pub mod plugins;
pub mod sse;

pub use batch::batch_routes;
pub use contexts::context_routes;
pub use coordinates::coordinate_routes;
pub use health::health_routes;
pub use plugins::plugin_routes;
pub use sse::event_stream;
