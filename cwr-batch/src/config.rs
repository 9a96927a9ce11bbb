//! Service configuration for cwr-batch
//!
//! Each setting resolves CLI → ENV → TOML → compiled default. Transport
//! overrides merge the built-in defaults with the TOML `[transports]` table,
//! the file winning on conflicts.

use cwr_common::config::{resolve_setting, ConfigSource, TomlConfig, TransportKind};
use std::collections::BTreeMap;
use tracing::info;

use crate::services::plugin_transport::default_overrides;

pub const MODULE_NAME: &str = "cwr-batch";
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PORT: u16 = 5790;
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

pub const ENV_BACKEND_URL: &str = "CWR_BACKEND_URL";
pub const ENV_PORT: &str = "CWR_PORT";
pub const ENV_PARENT_CONTEXT_URL: &str = "CWR_PARENT_CONTEXT_URL";

/// Tracing filter directives for this service's crates at `level`
pub fn log_directives(level: &str) -> String {
    format!("cwr_batch={0},cwr_common={0},tower_http={0}", level)
}

/// Command-line values that take precedence over every other tier
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub backend_url: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub backend_url: String,
    pub port: u16,
    /// Message endpoint of the enclosing context, when embedded
    pub parent_context_url: Option<String>,
    pub event_capacity: usize,
    pub transports: BTreeMap<String, TransportKind>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            port: DEFAULT_PORT,
            parent_context_url: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            transports: default_overrides(),
        }
    }
}

impl ServiceConfig {
    /// Resolve every setting from its tiers
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Self {
        let (backend_url, backend_source) = resolve_setting(
            cli.backend_url.clone(),
            ENV_BACKEND_URL,
            toml.backend_url.clone(),
            DEFAULT_BACKEND_URL.to_string(),
        );
        let (port, port_source) = resolve_setting(cli.port, ENV_PORT, toml.port, DEFAULT_PORT);

        let parent_context_url = std::env::var(ENV_PARENT_CONTEXT_URL)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| toml.parent_context_url.clone());

        let mut transports = default_overrides();
        transports.extend(toml.transports.iter().map(|(k, v)| (k.clone(), *v)));

        log_source("backend_url", &backend_url, backend_source);
        log_source("port", &port, port_source);

        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            port,
            parent_context_url,
            event_capacity: toml.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
            transports,
        }
    }
}

fn log_source(name: &str, value: &dyn std::fmt::Display, source: ConfigSource) {
    info!("{} = {} (from {:?})", name, value, source);
}
