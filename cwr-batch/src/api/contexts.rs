//! Nested execution contexts
//!
//! Other contexts register a message endpoint here to receive
//! `coordinate-updated` messages through the event bridge.

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::event_bridge::{MessagePort, WebhookPort};
use crate::AppState;

/// POST / DELETE /contexts request
#[derive(Debug, Deserialize)]
pub struct RegisterContextRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterContextResponse {
    pub registered: String,
    pub nested_contexts: usize,
}

/// GET /contexts response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextsResponse {
    pub embedded: bool,
    pub parent: Option<String>,
    pub nested: Vec<String>,
    pub direct_receiver: bool,
}

/// POST /contexts
///
/// Registering a URL again replaces the earlier registration.
pub async fn register_context(
    State(state): State<AppState>,
    Json(request): Json<RegisterContextRequest>,
) -> ApiResult<(StatusCode, Json<RegisterContextResponse>)> {
    let url = request.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ApiError::BadRequest(format!(
            "Context URL must be http(s): {}",
            url
        )));
    }

    let port = WebhookPort::new(state.http_client.clone(), url);
    let nested_contexts = state.topology.add_child(Arc::new(port));
    tracing::info!(url = %url, nested_contexts, "Nested context registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterContextResponse {
            registered: url.to_string(),
            nested_contexts,
        }),
    ))
}

/// DELETE /contexts
///
/// Unregisters the nested context posting to `url`; 404 when unknown.
pub async fn unregister_context(
    State(state): State<AppState>,
    Json(request): Json<RegisterContextRequest>,
) -> ApiResult<StatusCode> {
    let url = request.url.trim();
    let description = WebhookPort::new(state.http_client.clone(), url).describe();
    if !state.topology.remove_child(&description) {
        return Err(ApiError::NotFound(format!("No nested context at {}", url)));
    }

    tracing::info!(url = %url, "Nested context unregistered");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /contexts
pub async fn list_contexts(State(state): State<AppState>) -> Json<ContextsResponse> {
    let topology = &state.topology;
    Json(ContextsResponse {
        embedded: topology.is_embedded(),
        parent: topology.parent().map(|p| p.describe()),
        nested: topology.child_descriptions(),
        direct_receiver: topology.receiver().is_some(),
    })
}

pub fn context_routes() -> Router<AppState> {
    Router::new().route(
        "/contexts",
        get(list_contexts)
            .post(register_context)
            .delete(unregister_context),
    )
}
