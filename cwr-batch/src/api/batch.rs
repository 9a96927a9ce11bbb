//! Batch control API
//!
//! POST /batch/start, POST /batch/stop, GET /batch/status, GET /batch/rows,
//! POST /batch/rows/:record_id/save

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{BatchOptions, BatchRun, Record, ResultRow};
use crate::services::SaveOutcome;
use crate::AppState;

/// POST /batch/start request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchRequest {
    pub records: Vec<Record>,
    pub plugin_name: String,
    #[serde(default)]
    pub options: BatchOptions,
}

/// POST /batch/start response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchResponse {
    pub run_id: Uuid,
    pub plugin_name: String,
    pub total: usize,
}

/// GET /batch/status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusResponse {
    pub run_id: Uuid,
    pub plugin_name: String,
    pub running: bool,
    pub stopped: bool,
    pub cursor: usize,
    pub total: usize,
    pub percentage: f64,
    pub detected: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<&BatchRun> for BatchStatusResponse {
    fn from(run: &BatchRun) -> Self {
        Self {
            run_id: run.run_id,
            plugin_name: run.plugin_name.clone(),
            running: run.running,
            stopped: run.stopped,
            cursor: run.cursor,
            total: run.total(),
            percentage: run.percentage(),
            detected: run.detected_count(),
            errors: run.error_count(),
            started_at: run.started_at,
            ended_at: run.ended_at,
        }
    }
}

/// POST /batch/stop response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBatchResponse {
    /// False when no run was active
    pub stop_requested: bool,
    pub cursor: usize,
    pub total: usize,
}

/// GET /batch/rows response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRowsResponse {
    pub run_id: Uuid,
    pub running: bool,
    pub rows: Vec<ResultRow>,
}

/// POST /batch/start
///
/// Starts a run in the background. 202 Accepted with the run id; 409 while
/// another run is active.
pub async fn start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartBatchRequest>,
) -> ApiResult<(StatusCode, Json<StartBatchResponse>)> {
    let total = if request.options.apply_to_all {
        request.records.len()
    } else {
        request.records.len().min(1)
    };

    let run_id = state
        .orchestrator
        .launch(request.records, &request.plugin_name, request.options)
        .await?;

    tracing::info!(run_id = %run_id, plugin = %request.plugin_name, total, "Batch accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartBatchResponse {
            run_id,
            plugin_name: request.plugin_name,
            total,
        }),
    ))
}

/// POST /batch/stop
pub async fn stop_batch(State(state): State<AppState>) -> Json<StopBatchResponse> {
    let stop_requested = state.orchestrator.stop().await;
    let run = state.orchestrator.snapshot().await;

    Json(StopBatchResponse {
        stop_requested,
        cursor: run.cursor,
        total: run.total(),
    })
}

/// GET /batch/status
pub async fn batch_status(State(state): State<AppState>) -> Json<BatchStatusResponse> {
    let run = state.orchestrator.snapshot().await;
    Json(BatchStatusResponse::from(&run))
}

/// GET /batch/rows
pub async fn batch_rows(State(state): State<AppState>) -> Json<BatchRowsResponse> {
    let run = state.orchestrator.snapshot().await;
    Json(BatchRowsResponse {
        run_id: run.run_id,
        running: run.running,
        rows: run.rows,
    })
}

/// POST /batch/rows/:record_id/save
///
/// Manual save (or retry) of a detected row's coordinate.
pub async fn save_row(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
) -> ApiResult<Json<SaveOutcome>> {
    let outcome = state.orchestrator.save_row(record_id).await?;
    Ok(Json(outcome))
}

pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batch/start", post(start_batch))
        .route("/batch/stop", post(stop_batch))
        .route("/batch/status", get(batch_status))
        .route("/batch/rows", get(batch_rows))
        .route("/batch/rows/:record_id/save", post(save_row))
}
