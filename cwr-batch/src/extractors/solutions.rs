//! Array-of-solutions strategy used by formula-style plugins

use cwr_common::coordinates::to_decimal;
use serde_json::Value;

use crate::models::CoordinateCandidate;

const SOURCE: &str = "formula";

/// Take the first `{north, east}` pair of a `coordinates` list
///
/// The DDM text is `"<north> <east>"`. Formula solutions are never certain.
pub fn extract_solutions(result: &Value) -> Option<CoordinateCandidate> {
    let first = result.get("coordinates")?.as_array()?.first()?.as_object()?;
    let north = first.get("north").and_then(Value::as_str)?.trim();
    let east = first.get("east").and_then(Value::as_str)?.trim();
    if north.is_empty() || east.is_empty() {
        return None;
    }

    let ddm = format!("{} {}", north, east);
    let decimal = to_decimal(&ddm);
    Some(CoordinateCandidate::found(Some(ddm), decimal, false, SOURCE))
}
