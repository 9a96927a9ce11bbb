//! Direct field strategy: the plugin already reports `coordinates.exists`

use cwr_common::coordinates::to_decimal;
use cwr_common::DecimalCoordinates;
use serde_json::{Map, Value};

use super::{certainty, decimal_pair, flag, number, text};
use crate::models::CoordinateCandidate;

/// Source label when the plugin does not name one
const DEFAULT_SOURCE: &str = "plugin";

/// Read `coordinates` when it carries `exists == true`
///
/// DDM comes from `ddm` or from a `ddmLat` / `ddmLon` pair. Decimal comes from
/// `decimal {lat, lon}` or `decimalLatitude` / `decimalLongitude`, and is
/// backfilled from the DDM text when missing. An unreported certainty counts
/// as certain.
pub fn extract_direct(result: &Value) -> Option<CoordinateCandidate> {
    let result = result.as_object()?;
    let coords = result.get("coordinates")?.as_object()?;
    if coords.get("exists").and_then(flag) != Some(true) {
        return None;
    }

    let ddm = ddm_text(coords);
    let decimal = coords
        .get("decimal")
        .and_then(decimal_pair)
        .or_else(|| split_decimal(coords))
        .or_else(|| ddm.as_deref().and_then(to_decimal));

    if ddm.is_none() && decimal.is_none() {
        return None;
    }

    let certain = certainty(coords)
        .or_else(|| certainty(result))
        .unwrap_or(true);
    let source = text(coords, "source").unwrap_or(DEFAULT_SOURCE);

    Some(CoordinateCandidate::found(ddm, decimal, certain, source))
}

fn ddm_text(coords: &Map<String, Value>) -> Option<String> {
    if let Some(ddm) = text(coords, "ddm") {
        return Some(ddm.to_string());
    }
    match (text(coords, "ddmLat"), text(coords, "ddmLon")) {
        (Some(lat), Some(lon)) => Some(format!("{} {}", lat, lon)),
        _ => None,
    }
}

fn split_decimal(coords: &Map<String, Value>) -> Option<DecimalCoordinates> {
    let lat = coords.get("decimalLatitude").and_then(number)?;
    let lon = coords.get("decimalLongitude").and_then(number)?;
    let pair = DecimalCoordinates::new(lat, lon);
    pair.is_valid().then_some(pair)
}
