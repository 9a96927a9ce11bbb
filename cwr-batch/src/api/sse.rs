//! Server-Sent Events stream of batch and coordinate events

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams every `GeoEvent` on the local bus:
/// - coordinate-updated
/// - batch-started / batch-progress / batch-row-appended / batch-completed
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    cwr_common::sse::create_event_sse_stream(crate::config::MODULE_NAME, &state.event_bus)
}
