//! Per-record plugin invocation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{BatchOptions, Record};

/// One URL path segment: no slashes, no query, no leading dot
static PLUGIN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]*$").expect("plugin name pattern is valid")
});

/// True when `name` can be placed in the execute URL as-is
pub fn is_valid_plugin_name(name: &str) -> bool {
    PLUGIN_NAME.is_match(name)
}

/// How the plugin should attack the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    #[default]
    Decode,
    Bruteforce,
}

/// One plugin call for one record
///
/// Created per record per run and discarded once the call completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationRequest {
    pub plugin_name: String,
    pub text: String,
    pub mode: InvocationMode,
    pub record_id: i64,
    pub code: String,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl InvocationRequest {
    /// Build the request for `record` under the run's options
    pub fn for_record(record: &Record, plugin_name: &str, options: &BatchOptions) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            text: record.invocation_text().to_string(),
            mode: options.mode,
            record_id: record.id,
            code: record.code.clone(),
            extra: options.extra.clone(),
        }
    }

    /// JSON body for the execute endpoint: `{ text, recordId, code, mode, ...extra }`
    ///
    /// Extra parameters are spread last, so a plugin-specific key may shadow a
    /// standard one.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("text".to_string(), Value::String(self.text.clone()));
        body.insert("recordId".to_string(), Value::from(self.record_id));
        body.insert("code".to_string(), Value::String(self.code.clone()));
        body.insert(
            "mode".to_string(),
            serde_json::to_value(self.mode).unwrap_or(Value::Null),
        );
        for (key, value) in &self.extra {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}
