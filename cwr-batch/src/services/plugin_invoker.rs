//! Plugin invocation
//!
//! Sends one [`InvocationRequest`] to the backend's execute endpoint and turns
//! whatever comes back into a [`NormalizedResult`]. Failures never escape:
//! network errors, non-2xx statuses and unparseable bodies all become
//! error-shaped results so the batch keeps going.

use serde_json::Value;
use tracing::{debug, warn};

use super::plugin_transport::TransportTable;
use super::result_normalizer::ResultNormalizer;
use crate::models::{FailureKind, InvocationRequest, NormalizedResult};

/// Characters of raw body kept for diagnostics on format errors
pub const EXCERPT_CHARS: usize = 200;

pub struct PluginInvoker {
    base_url: String,
    transports: TransportTable,
    normalizer: ResultNormalizer,
}

impl PluginInvoker {
    pub fn new(base_url: impl Into<String>, transports: TransportTable, normalizer: ResultNormalizer) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transports,
            normalizer,
        }
    }

    /// `POST {base}/api/plugins/{name}/execute`
    pub fn execute_url(&self, plugin_name: &str) -> String {
        format!("{}/api/plugins/{}/execute", self.base_url, plugin_name)
    }

    /// Invoke the plugin named in `request`
    pub async fn invoke(&self, request: &InvocationRequest) -> NormalizedResult {
        let transport = self.transports.select(&request.plugin_name);
        let url = self.execute_url(&request.plugin_name);

        debug!(
            plugin = %request.plugin_name,
            record_id = request.record_id,
            transport = transport.name(),
            "Invoking plugin"
        );

        let response = match transport.execute(&url, &request.body()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    plugin = %request.plugin_name,
                    record_id = request.record_id,
                    error = %e,
                    "Plugin call failed"
                );
                return NormalizedResult::error(FailureKind::Transport, e.to_string(), None);
            }
        };

        if !response.is_success() {
            warn!(
                plugin = %request.plugin_name,
                record_id = request.record_id,
                status = response.status,
                "Plugin returned error status"
            );
            return NormalizedResult::error(
                FailureKind::Transport,
                response.status.to_string(),
                None,
            );
        }

        match parse_body(&response.body) {
            Ok(payload) => self.normalizer.normalize(&payload),
            Err(message) => {
                warn!(
                    plugin = %request.plugin_name,
                    record_id = request.record_id,
                    "{}", message
                );
                NormalizedResult::error(FailureKind::Format, message, Some(excerpt(&response.body)))
            }
        }
    }
}

/// Parse a response body as JSON, sniffing for markup first
fn parse_body(body: &str) -> Result<Value, String> {
    if body.trim_start().starts_with('<') {
        return Err("Plugin returned markup instead of JSON".to_string());
    }
    serde_json::from_str(body).map_err(|e| format!("Invalid JSON response: {}", e))
}

fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_CHARS).collect()
}
