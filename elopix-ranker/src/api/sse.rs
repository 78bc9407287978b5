//! Server-Sent Events for the ranking UI

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events - SSE stream of pair, outcome, blacklist, progress and save
/// events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    elopix_common::sse::event_bus_stream(&state.events, "elopix-ranker")
}
