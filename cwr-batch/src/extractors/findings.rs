//! Free-text scan of `findings[].content`

use cwr_common::coordinates::{find_ddm, to_decimal};
use serde_json::Value;

use super::flag;
use crate::models::CoordinateCandidate;

const SOURCE: &str = "findings";

/// First DDM pair found in any finding's content
///
/// Certainty follows the finding's `isInteresting` flag, true when absent.
pub fn extract_findings(result: &Value) -> Option<CoordinateCandidate> {
    result
        .get("findings")?
        .as_array()?
        .iter()
        .find_map(|finding| {
            let content = finding.get("content")?.as_str()?;
            let ddm = find_ddm(content)?;
            let certain = finding.get("isInteresting").and_then(flag).unwrap_or(true);
            let decimal = to_decimal(&ddm);
            Some(CoordinateCandidate::found(Some(ddm), decimal, certain, SOURCE))
        })
}
