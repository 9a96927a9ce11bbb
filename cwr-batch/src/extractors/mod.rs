//! Coordinate extraction from raw plugin results
//!
//! Plugins report coordinates in many shapes. Each shape has its own pure
//! strategy function `fn(&Value) -> Option<CoordinateCandidate>`; the
//! [`CoordinateExtractor`] tries them in registration order and stops at the
//! first hit.
//!
//! # Strategies
//! 1. **direct**: `coordinates.exists == true` (decimal backfilled from DDM)
//! 2. **solutions**: `coordinates` is a list of `{north, east}` pairs
//! 3. **findings**: DDM text found in `findings[].content`
//! 4. **aggregate**: meta-plugin `combinedResults` + `primaryCoordinates`
//! 5. **nested**: strategies 1-3 applied to each item of `results`
//!
//! New plugin shapes are supported by registering another strategy; existing
//! strategies stay untouched.

pub mod aggregate;
pub mod direct;
pub mod findings;
pub mod nested;
pub mod solutions;

use crate::models::CoordinateCandidate;
use cwr_common::DecimalCoordinates;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// Signature every extraction strategy implements
pub type StrategyFn = fn(&Value) -> Option<CoordinateCandidate>;

/// A named extraction strategy
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub extract: StrategyFn,
}

/// Ordered registry of extraction strategies
#[derive(Clone)]
pub struct CoordinateExtractor {
    strategies: Vec<Strategy>,
}

impl fmt::Debug for CoordinateExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinateExtractor")
            .field("strategies", &self.strategy_names())
            .finish()
    }
}

impl Default for CoordinateExtractor {
    fn default() -> Self {
        Self::standard()
    }
}

impl CoordinateExtractor {
    /// Extractor with no strategies (every lookup misses)
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Extractor with the five built-in strategies in their canonical order
    pub fn standard() -> Self {
        let mut extractor = Self::empty();
        extractor
            .register("direct", direct::extract_direct)
            .register("solutions", solutions::extract_solutions)
            .register("findings", findings::extract_findings)
            .register("aggregate", aggregate::extract_aggregate)
            .register("nested", nested::extract_nested);
        extractor
    }

    /// Append a strategy; it runs after every strategy registered before it
    pub fn register(&mut self, name: &'static str, extract: StrategyFn) -> &mut Self {
        self.strategies.push(Strategy { name, extract });
        self
    }

    /// Names of the registered strategies, in order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name).collect()
    }

    /// Run the strategies in order; `exists == false` when none matches
    pub fn extract(&self, result: &Value) -> CoordinateCandidate {
        for strategy in &self.strategies {
            if let Some(candidate) = (strategy.extract)(result) {
                debug!(strategy = strategy.name, "Coordinate extracted");
                return candidate;
            }
        }
        CoordinateCandidate::not_found()
    }
}

/// Flag that may arrive as a bool, a 0/1 number or a "true"/"false" string
pub(crate) fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Plugin-reported confidence (`certain` or `certitude`)
pub(crate) fn certainty(object: &Map<String, Value>) -> Option<bool> {
    object
        .get("certain")
        .or_else(|| object.get("certitude"))
        .and_then(flag)
}

/// Number that may arrive as JSON number or numeric string
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty trimmed string field
pub(crate) fn text<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Decimal pair from `{lat|latitude, lon|longitude}`, rejected when out of range
pub(crate) fn decimal_pair(value: &Value) -> Option<DecimalCoordinates> {
    let object = value.as_object()?;
    let lat = object
        .get("lat")
        .or_else(|| object.get("latitude"))
        .and_then(number)?;
    let lon = object
        .get("lon")
        .or_else(|| object.get("lng"))
        .or_else(|| object.get("longitude"))
        .and_then(number)?;
    let coords = DecimalCoordinates::new(lat, lon);
    coords.is_valid().then_some(coords)
}
