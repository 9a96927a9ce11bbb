//! Batch run state
//!
//! A [`BatchRun`] is created when execution starts and replaced when the next
//! run starts. Its rows are appended once per processed record, in processing
//! order; afterwards only `saved` / `save_error` change (manual save).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use super::{CoordinateCandidate, DetailedResult, InvocationMode, NormalizedResult, Record};
use crate::services::persistence_gateway::SaveOutcome;

/// Caller-chosen options for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Process every record (true) or only the first one (false)
    #[serde(default = "default_apply_to_all")]
    pub apply_to_all: bool,
    /// Write detected coordinates back to the backend as they are found
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default)]
    pub mode: InvocationMode,
    /// Plugin-specific parameters spread into the execute body
    #[serde(default)]
    pub extra: Map<String, Value>,
}

fn default_apply_to_all() -> bool {
    true
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            apply_to_all: true,
            auto_save: false,
            mode: InvocationMode::default(),
            extra: Map::new(),
        }
    }
}

/// Row outcome as shown in the results view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowStatus {
    Detected,
    NotDetected,
    Error,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Detected => write!(f, "detected"),
            RowStatus::NotDetected => write!(f, "not detected"),
            RowStatus::Error => write!(f, "error"),
        }
    }
}

/// One processed record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub record_id: i64,
    pub code: String,
    pub name: String,
    pub detection_text: String,
    pub coordinates: CoordinateCandidate,
    pub detailed_results: Vec<DetailedResult>,
    pub status: RowStatus,
    pub saved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultRow {
    /// Build the row for `record` from its normalized plugin result
    pub fn from_result(record: &Record, result: NormalizedResult) -> Self {
        let is_error = result.is_error();
        let error = result.failure.as_ref().map(|f| f.message.clone());
        let status = if is_error {
            RowStatus::Error
        } else if result.main_detection.coordinates.exists {
            RowStatus::Detected
        } else {
            RowStatus::NotDetected
        };

        Self {
            record_id: record.id,
            code: record.code.clone(),
            name: record.name.clone(),
            detection_text: result.main_detection.text,
            coordinates: result.main_detection.coordinates,
            detailed_results: result.detailed_results,
            status,
            saved: false,
            save_error: None,
            is_error,
            error,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.coordinates.exists
    }

    /// Record the outcome of a save attempt
    pub fn apply_save(&mut self, outcome: &SaveOutcome) {
        self.saved = outcome.success;
        self.save_error = outcome.error.clone();
    }
}

/// State of one batch execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRun {
    pub run_id: Uuid,
    pub plugin_name: String,
    pub options: BatchOptions,
    /// Working set (all selected records, or only the first)
    pub records: Vec<Record>,
    /// Records processed so far
    pub cursor: usize,
    pub running: bool,
    /// True once a stop request ended the run early
    pub stopped: bool,
    pub rows: Vec<ResultRow>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for BatchRun {
    fn default() -> Self {
        Self {
            run_id: Uuid::nil(),
            plugin_name: String::new(),
            options: BatchOptions::default(),
            records: Vec::new(),
            cursor: 0,
            running: false,
            stopped: false,
            rows: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }
}

impl BatchRun {
    /// Create a running batch over the working set selected by `options`
    pub fn new(records: Vec<Record>, plugin_name: String, options: BatchOptions) -> Self {
        let records = if options.apply_to_all {
            records
        } else {
            records.into_iter().take(1).collect()
        };

        Self {
            run_id: Uuid::new_v4(),
            plugin_name,
            options,
            records,
            cursor: 0,
            running: true,
            stopped: false,
            rows: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Percentage complete (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total() > 0 {
            (self.cursor as f64 / self.total() as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Append the row for the record just processed and advance the cursor
    ///
    /// Returns the row's index.
    pub fn append_row(&mut self, row: ResultRow) -> usize {
        self.rows.push(row);
        self.cursor += 1;
        self.rows.len() - 1
    }

    /// True from creation until the run loop finishes, including after a stop
    /// request while the last record is still in flight
    pub fn is_active(&self) -> bool {
        !self.run_id.is_nil() && self.ended_at.is_none()
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.running = false;
        self.ended_at = Some(Utc::now());
    }

    pub fn detected_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_detected()).count()
    }

    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error).count()
    }

    pub fn row_mut(&mut self, record_id: i64) -> Option<&mut ResultRow> {
        self.rows.iter_mut().find(|r| r.record_id == record_id)
    }

    pub fn row(&self, record_id: i64) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.record_id == record_id)
    }
}
