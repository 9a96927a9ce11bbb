//! Meta-plugin aggregate strategy
//!
//! Aggregate plugins bundle sub-plugin results under `combinedResults` and
//! report one `primaryCoordinates` decimal pair. The DDM text comes from the
//! first sub-result exposing explicit `ddmLat` / `ddmLon` fields.

use serde_json::{Map, Value};

use super::{certainty, decimal_pair, text};
use crate::models::CoordinateCandidate;

/// Source label when no sub-result carries DDM text
pub const DECIMAL_ONLY_SOURCE: &str = "decimal format only";

/// Combine the primary decimal with the first explicit sub-result DDM
pub fn extract_aggregate(result: &Value) -> Option<CoordinateCandidate> {
    let combined = result.get("combinedResults")?.as_object()?;
    let primary = result.get("primaryCoordinates").and_then(decimal_pair)?;

    for (name, sub) in combined {
        let Some(sub) = sub.as_object() else {
            continue;
        };
        if let Some((lat, lon, certain)) = explicit_ddm(sub) {
            return Some(CoordinateCandidate::found(
                Some(format!("{} {}", lat, lon)),
                Some(primary),
                certain,
                name.as_str(),
            ));
        }
    }

    Some(CoordinateCandidate::found(
        None,
        Some(primary),
        true,
        DECIMAL_ONLY_SOURCE,
    ))
}

/// `ddmLat` / `ddmLon` from the sub-result's `coordinates`, or from the sub-result itself
fn explicit_ddm(sub: &Map<String, Value>) -> Option<(&str, &str, bool)> {
    let nested = sub.get("coordinates").and_then(Value::as_object);
    [nested, Some(sub)].into_iter().flatten().find_map(|fields| {
        let lat = text(fields, "ddmLat")?;
        let lon = text(fields, "ddmLon")?;
        Some((lat, lon, certainty(fields).unwrap_or(true)))
    })
}
