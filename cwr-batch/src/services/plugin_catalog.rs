//! Solver plugin catalog
//!
//! Lists the plugins the backend offers for batch solving. The JSON endpoint
//! is tried first; when it fails the plugin page markup is scraped for
//! `data-plugin-name` attributes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Opening tags carrying a `data-plugin-name` attribute
static PLUGIN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<[^>]*\bdata-plugin-name\s*=\s*"([^"]+)"[^>]*>"#)
        .expect("plugin tag pattern is valid")
});

static PLUGIN_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bdata-plugin-description\s*=\s*"([^"]*)""#)
        .expect("plugin description pattern is valid")
});

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog endpoint returned {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Plugin catalog unavailable (primary: {primary}; fallback: {fallback})")]
    Unavailable { primary: String, fallback: String },
}

/// One solver plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

pub struct PluginCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl PluginCatalog {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Plugins usable as batch solvers
    pub async fn list(&self) -> Result<Vec<PluginInfo>, CatalogError> {
        let primary = match self.list_from_api().await {
            Ok(plugins) => return Ok(plugins),
            Err(e) => e,
        };
        warn!(error = %primary, "Plugin API failed, falling back to plugin page");

        self.list_from_markup().await.map_err(|fallback| CatalogError::Unavailable {
            primary: primary.to_string(),
            fallback: fallback.to_string(),
        })
    }

    async fn list_from_api(&self) -> Result<Vec<PluginInfo>, CatalogError> {
        let url = format!("{}/api/plugins", self.base_url);
        let body = self.fetch(&url, &[("context", "solver")]).await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))?;
        parse_plugin_list(value)
    }

    async fn list_from_markup(&self) -> Result<Vec<PluginInfo>, CatalogError> {
        let url = format!("{}/plugins", self.base_url);
        let markup = self.fetch(&url, &[]).await?;
        let plugins = scrape_plugins(&markup);
        if plugins.is_empty() {
            return Err(CatalogError::Parse("no data-plugin-name attributes found".to_string()));
        }
        debug!(count = plugins.len(), "Scraped plugins from markup");
        Ok(plugins)
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))
    }
}

/// Accept either a bare array or `{ "plugins": [...] }`
fn parse_plugin_list(value: Value) -> Result<Vec<PluginInfo>, CatalogError> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("plugins") {
            Some(Value::Array(items)) => items,
            _ => return Err(CatalogError::Parse("missing plugins array".to_string())),
        },
        _ => return Err(CatalogError::Parse("unexpected catalog shape".to_string())),
    };

    list.into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| CatalogError::Parse(e.to_string())))
        .collect()
}

fn scrape_plugins(markup: &str) -> Vec<PluginInfo> {
    let mut plugins: Vec<PluginInfo> = Vec::new();
    for caps in PLUGIN_TAG.captures_iter(markup) {
        let name = caps[1].trim().to_string();
        if name.is_empty() || plugins.iter().any(|p| p.name == name) {
            continue;
        }
        let description = PLUGIN_DESCRIPTION
            .captures(&caps[0])
            .map(|d| d[1].trim().to_string())
            .filter(|d| !d.is_empty());

        plugins.push(PluginInfo {
            name,
            description,
            version: None,
            category: None,
        });
    }
    plugins
}
