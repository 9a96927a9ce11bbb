//! Data models for cwr-batch
//!
//! - Records read from the backend (read-only to the batch pipeline)
//! - Per-record plugin invocations
//! - Normalized plugin results and coordinate candidates
//! - Batch run state and result rows

pub mod batch_run;
pub mod detection;
pub mod invocation;
pub mod record;

pub use batch_run::{BatchOptions, BatchRun, ResultRow, RowStatus};
pub use detection::{
    CoordinateCandidate, DetailedResult, FailureKind, MainDetection, NormalizedResult,
    ResultFailure, NO_RESULT_TEXT,
};
pub use invocation::{is_valid_plugin_name, InvocationMode, InvocationRequest};
pub use record::{Record, SolvedState};
