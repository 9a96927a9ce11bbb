//! Plugin result normalization
//!
//! Reduces the two top-level plugin shapes to one [`NormalizedResult`]:
//! - **Meta shape** (`combinedResults` present): main detection from the
//!   aggregate fields, one detailed entry per sub-result
//! - **Single shape**: main detection from the whole payload, one detailed
//!   entry wrapping it
//!
//! Anything that is not a JSON object yields the empty-safe default.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::extractors::{aggregate, CoordinateExtractor};
use crate::models::{
    CoordinateCandidate, DetailedResult, MainDetection, NormalizedResult, NO_RESULT_TEXT,
};

/// Field names a plugin may use for its decoded output text
const OUTPUT_TEXT_FIELDS: [&str; 4] = ["text_output", "textOutput", "output", "decoded_text"];

/// Source label of the single detailed entry for single-shape payloads
const SINGLE_SOURCE: &str = "plugin";

#[derive(Debug, Clone, Default)]
pub struct ResultNormalizer {
    extractor: CoordinateExtractor,
}

impl ResultNormalizer {
    pub fn new(extractor: CoordinateExtractor) -> Self {
        Self { extractor }
    }

    /// Normalize one plugin payload; never panics
    pub fn normalize(&self, payload: &Value) -> NormalizedResult {
        let Some(object) = payload.as_object() else {
            debug!("Plugin payload is not an object, using empty result");
            return NormalizedResult::empty();
        };

        match object.get("combinedResults") {
            Some(Value::Object(combined)) => self.normalize_meta(payload, combined),
            Some(_) => {
                debug!("combinedResults is not a map, using empty result");
                NormalizedResult::empty()
            }
            None => self.normalize_single(payload),
        }
    }

    fn normalize_meta(&self, payload: &Value, combined: &Map<String, Value>) -> NormalizedResult {
        let mut detailed_results = Vec::with_capacity(combined.len());
        let mut best_sub: Option<CoordinateCandidate> = None;

        for (name, sub) in combined {
            let candidate = self.extractor.extract(sub);
            if candidate.exists {
                best_sub = Some(match best_sub {
                    None => candidate.clone(),
                    // First certain sub-result wins; an uncertain one never replaces it
                    Some(current) if !current.certain && candidate.certain => candidate.clone(),
                    Some(current) => current,
                });
            }

            detailed_results.push(DetailedResult {
                source: name.clone(),
                source_id: source_id(sub).unwrap_or_else(|| name.clone()),
                details: json!({ "raw": sub, "coordinates": candidate }),
            });
        }

        let coordinates = aggregate::extract_aggregate(payload)
            .or(best_sub)
            .unwrap_or_default();
        let text = output_text(payload)
            .or_else(|| coordinates.ddm.clone())
            .unwrap_or_else(|| NO_RESULT_TEXT.to_string());

        NormalizedResult {
            main_detection: MainDetection { text, coordinates },
            detailed_results,
            failure: None,
        }
    }

    fn normalize_single(&self, payload: &Value) -> NormalizedResult {
        let coordinates = self.extractor.extract(payload);
        let text = output_text(payload).unwrap_or_else(|| NO_RESULT_TEXT.to_string());
        let source = payload
            .get("plugin_name")
            .or_else(|| payload.get("pluginName"))
            .and_then(Value::as_str)
            .unwrap_or(SINGLE_SOURCE)
            .to_string();

        NormalizedResult {
            main_detection: MainDetection { text, coordinates },
            detailed_results: vec![DetailedResult {
                source_id: source.clone(),
                source,
                details: payload.clone(),
            }],
            failure: None,
        }
    }
}

/// Output text at the top level, under `result`, or in the first `results` item
fn output_text(payload: &Value) -> Option<String> {
    let candidates = [
        Some(payload),
        payload.get("result"),
        payload.get("results").and_then(|r| r.get(0)),
    ];

    candidates.into_iter().flatten().find_map(|object| {
        OUTPUT_TEXT_FIELDS.iter().find_map(|field| {
            object
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    })
}

fn source_id(sub: &Value) -> Option<String> {
    match sub.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
