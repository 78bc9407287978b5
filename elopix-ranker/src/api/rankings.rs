//! Ranking, progress and save endpoints

use crate::error::ApiResult;
use crate::ranking::{Progress, RankedItem, SaveSummary};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use elopix_common::events::RankEvent;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    /// Number of items (defaults to the configured top_rank_count)
    pub n: Option<usize>,
}

/// GET /api/v1/rankings/top?n=
///
/// Best rated items that are still in the catalog and not blacklisted.
pub async fn top_ranked(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> Json<Vec<RankedItem>> {
    let n = query.n.unwrap_or(state.top_rank_count);
    Json(state.session.lock().await.top_ranked(n).await)
}

/// GET /api/v1/rankings
///
/// Every rated item, blacklisted and missing ones included.
pub async fn all_rankings(State(state): State<AppState>) -> Json<Vec<RankedItem>> {
    Json(state.session.lock().await.all_rankings().await)
}

/// GET /api/v1/progress
pub async fn progress(State(state): State<AppState>) -> Json<Progress> {
    Json(state.session.lock().await.progress().await)
}

/// POST /api/v1/save
///
/// Writes the ratings and blacklist documents now.
pub async fn save(State(state): State<AppState>) -> ApiResult<Json<SaveSummary>> {
    let summary = state.persistence.save(&state.ranking).await?;
    state.events.emit_lossy(RankEvent::RatingsSaved {
        items: summary.items,
        blacklisted: summary.blacklisted,
        timestamp: chrono::Utc::now(),
    });
    Ok(Json(summary))
}

/// Build ranking routes
pub fn ranking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/rankings/top", get(top_ranked))
        .route("/api/v1/rankings", get(all_rankings))
        .route("/api/v1/progress", get(progress))
        .route("/api/v1/save", post(save))
}
