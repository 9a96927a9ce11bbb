//! Test Helper Utilities
//!
//! Shared utilities for testing cwr-batch:
//! - `fake_backend`: real HTTP backend (axum on 127.0.0.1:0) for reqwest paths
//! - `doubles`: scripted plugin transport and recording persistence
//! - `fixtures`: records and plugin payloads

#![allow(dead_code)]

pub mod doubles;
pub mod fake_backend;
pub mod fixtures;

pub use doubles::{harness, Gate, Harness, RecordingPersistence, ScriptedTransport};
pub use fake_backend::{unreachable_url, FakeBackend};
pub use fixtures::{coordinates_payload, empty_payload, record, records};
