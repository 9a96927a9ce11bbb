//! Geocache record as supplied by the caller

use serde::{Deserialize, Serialize};

/// Solving progress the backend tracks for a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolvedState {
    #[default]
    NotSolved,
    InProgress,
    Solved,
}

/// Puzzle record (geocache)
///
/// Read-only to the batch pipeline; the only write path back to the backend is
/// the persistence gateway's coordinate update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub cache_type: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub corrected_latitude: Option<f64>,
    #[serde(default)]
    pub corrected_longitude: Option<f64>,
    #[serde(default)]
    pub solved_state: SolvedState,
    /// Puzzle listing text
    #[serde(default)]
    pub description: Option<String>,
}

impl Record {
    /// Text handed to the plugin: the listing description, or the name when
    /// the record has no description.
    pub fn invocation_text(&self) -> &str {
        match self.description.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.name,
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_record(id: i64) -> Record {
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
        description: None,
    }
}
