//! Configuration loading and tiered setting resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the service starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Directory under the platform config dir holding every module's TOML file
pub const CONFIG_DIR_NAME: &str = "cachewright";

/// Transport strategy used to call a plugin's execute endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON request, whole body read in one call
    #[default]
    Json,
    /// JSON request, body drained chunk by chunk on a dedicated connection
    Chunked,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(TransportKind::Json),
            "chunked" => Ok(TransportKind::Chunked),
            other => Err(Error::Config(format!(
                "Unknown transport '{}'. Use json or chunked",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration loaded from a module's TOML file
///
/// Every field is optional so a partial file only overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Base URL of the backend hosting plugins and geocache records
    #[serde(default)]
    pub backend_url: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Message endpoint of the enclosing context, when this service is embedded
    #[serde(default)]
    pub parent_context_url: Option<String>,

    /// Event bus capacity
    #[serde(default)]
    pub event_capacity: Option<usize>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-plugin transport overrides (`metasolver = "chunked"`)
    #[serde(default)]
    pub transports: BTreeMap<String, TransportKind>,
}

/// Where a resolved setting came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    TomlFile,
    Default,
}

/// Default TOML path for a module: `<config dir>/cachewright/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(format!("{}.toml", module_name)))
}

/// Load a TOML config file
///
/// A missing file yields `TomlConfig::default()` with a warning; a file that
/// exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Resolve one setting through the CLI → ENV → TOML → default tiers
///
/// An environment value that fails to parse is logged and skipped.
pub fn resolve_setting<T>(
    cli_value: Option<T>,
    env_var_name: &str,
    toml_value: Option<T>,
    default: T,
) -> (T, ConfigSource)
where
    T: FromStr,
{
    if let Some(value) = cli_value {
        return (value, ConfigSource::CommandLine);
    }

    if let Ok(raw) = std::env::var(env_var_name) {
        match raw.parse::<T>() {
            Ok(value) => return (value, ConfigSource::Environment),
            Err(_) => warn!("Ignoring unparseable {}={:?}", env_var_name, raw),
        }
    }

    if let Some(value) = toml_value {
        return (value, ConfigSource::TomlFile);
    }

    (default, ConfigSource::Default)
}
