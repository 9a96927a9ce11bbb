//! Normalized plugin results
//!
//! Every plugin response, whatever its shape, is reduced to one
//! [`NormalizedResult`]: a single main detection plus zero or more detailed
//! per-source entries.

use cwr_common::DecimalCoordinates;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Detection text used when a plugin produced nothing usable
pub const NO_RESULT_TEXT: &str = "no result";

/// A coordinate a plugin may have found
///
/// When `exists` is false every other field is absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateCandidate {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<DecimalCoordinates>,
    #[serde(default)]
    pub certain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl CoordinateCandidate {
    /// Nothing found
    pub fn not_found() -> Self {
        Self::default()
    }

    /// A found coordinate
    pub fn found(
        ddm: Option<String>,
        decimal: Option<DecimalCoordinates>,
        certain: bool,
        source: impl Into<String>,
    ) -> Self {
        Self {
            exists: true,
            ddm,
            decimal,
            certain,
            source: Some(source.into()),
        }
    }
}

/// The single best detection for a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainDetection {
    pub text: String,
    pub coordinates: CoordinateCandidate,
}

/// One per-source entry (one per sub-plugin for aggregate plugins)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedResult {
    pub source: String,
    pub source_id: String,
    pub details: Value,
}

/// Why an invocation produced an error-shaped result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network failure or non-2xx status
    Transport,
    /// Body was markup or not valid JSON
    Format,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Leading part of the raw body, for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Plugin output reduced to one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub main_detection: MainDetection,
    pub detailed_results: Vec<DetailedResult>,
    /// Present only on error-shaped results built by the invoker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResultFailure>,
}

impl Default for NormalizedResult {
    fn default() -> Self {
        Self {
            main_detection: MainDetection {
                text: NO_RESULT_TEXT.to_string(),
                coordinates: CoordinateCandidate::not_found(),
            },
            detailed_results: Vec::new(),
            failure: None,
        }
    }
}

impl NormalizedResult {
    /// Empty-safe default for malformed payloads
    pub fn empty() -> Self {
        Self::default()
    }

    /// Error-shaped result for a failed call
    ///
    /// The detection text is `"Error: <message>"`; no coordinate exists.
    pub fn error(kind: FailureKind, message: impl Into<String>, excerpt: Option<String>) -> Self {
        let message = message.into();
        Self {
            main_detection: MainDetection {
                text: format!("Error: {}", message),
                coordinates: CoordinateCandidate::not_found(),
            },
            detailed_results: Vec::new(),
            failure: Some(ResultFailure {
                kind,
                message,
                excerpt,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    pub fn coordinates(&self) -> &CoordinateCandidate {
        &self.main_detection.coordinates
    }
}
