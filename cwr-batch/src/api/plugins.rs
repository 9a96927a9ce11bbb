//! Plugin catalog proxy

use axum::{extract::State, routing::get, Json, Router};

use crate::error::ApiResult;
use crate::services::PluginInfo;
use crate::AppState;

/// GET /plugins
///
/// Solver plugins offered by the backend (JSON endpoint, markup fallback).
pub async fn list_plugins(State(state): State<AppState>) -> ApiResult<Json<Vec<PluginInfo>>> {
    match state.catalog.list().await {
        Ok(plugins) => Ok(Json(plugins)),
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            Err(e.into())
        }
    }
}

pub fn plugin_routes() -> Router<AppState> {
    Router::new().route("/plugins", get(list_plugins))
}
