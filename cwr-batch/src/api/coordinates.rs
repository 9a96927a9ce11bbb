//! Detected coordinates held by this context

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use cwr_common::events::CoordinateUpdate;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /coordinates response
#[derive(Debug, Serialize)]
pub struct CoordinatesResponse {
    pub coordinates: Vec<CoordinateUpdate>,
}

/// GET /coordinates
pub async fn list_coordinates(State(state): State<AppState>) -> Json<CoordinatesResponse> {
    Json(CoordinatesResponse {
        coordinates: state.coordinates.all(),
    })
}

/// GET /coordinates/:record_id
pub async fn get_coordinate(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
) -> ApiResult<Json<CoordinateUpdate>> {
    state
        .coordinates
        .latest(record_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No coordinate for record {}", record_id)))
}

pub fn coordinate_routes() -> Router<AppState> {
    Router::new()
        .route("/coordinates", get(list_coordinates))
        .route("/coordinates/:record_id", get(get_coordinate))
}
