//! Records and plugin payloads

use cwr_batch::models::{Record, SolvedState};
use serde_json::{json, Value};

pub const REFERENCE_DDM: &str = "N 49° 45.558 E 005° 58.554";

pub fn record(id: i64) -> Record {
    Record {
        id,
        code: format!("GC{:04}", id),
        name: format!("Mystery #{}", id),
        cache_type: "Mystery".to_string(),
        latitude: Some(49.75),
        longitude: Some(5.95),
        corrected_latitude: None,
        corrected_longitude: None,
        solved_state: SolvedState::NotSolved,
        description: Some(format!("Puzzle text {}", id)),
    }
}

/// Records with ids `1..=n`
pub fn records(n: i64) -> Vec<Record> {
    (1..=n).map(record).collect()
}

/// Single-plugin payload reporting the reference coordinate
pub fn coordinates_payload() -> Value {
    json!({
        "text_output": "NORD 49 45 558 EST 5 58 554",
        "coordinates": { "exists": true, "ddm": REFERENCE_DDM, "certain": true }
    })
}

/// Single-plugin payload without coordinates
pub fn empty_payload() -> Value {
    json!({ "text_output": "NOTHING HERE" })
}
