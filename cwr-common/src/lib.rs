//! # Cachewright Common Library
//!
//! Shared code for the Cachewright services including:
//! - Coordinate conversion (DDM ↔ decimal degrees)
//! - Event types (GeoEvent enum) and the in-process EventBus
//! - Configuration loading (TOML + environment tiers)
//! - SSE streaming helpers

pub mod config;
pub mod coordinates;
pub mod error;
pub mod events;
pub mod sse;

pub use coordinates::DecimalCoordinates;
pub use error::{Error, Result};
