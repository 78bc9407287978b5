//! elopix-ranker library
//!
//! Pairwise image ranking: the rating core, the prefetch pipeline, the
//! interactive session and its HTTP surface.

pub mod api;
pub mod assets;
pub mod catalog;
pub mod error;
pub mod prefetch;
pub mod ranking;
pub mod session;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use elopix_common::events::EventBus;
use ranking::{PersistenceController, SharedRanking};
use session::RankingSession;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Interactive session; one decision at a time
    pub session: Arc<Mutex<RankingSession>>,
    /// Rating state, also read by the prefetch producer
    pub ranking: SharedRanking,
    pub persistence: PersistenceController,
    /// Event bus for SSE broadcasting
    pub events: EventBus,
    /// Default `n` for the top-ranked listing
    pub top_rank_count: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        session: RankingSession,
        ranking: SharedRanking,
        persistence: PersistenceController,
        events: EventBus,
        top_rank_count: usize,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            ranking,
            persistence,
            events,
            top_rank_count,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::ui_routes())
        .merge(api::pair_routes())
        .merge(api::ranking_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
