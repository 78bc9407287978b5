//! Comparison pair endpoints
//!
//! Every decision names the pair it was made on; a stale or repeated
//! decision gets 404 PAIR_NOT_FOUND.

use crate::error::{ApiResult, Error};
use crate::ranking::{ComparisonPair, Side};
use crate::session::Outcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// One side of a presented pair
#[derive(Debug, Serialize)]
pub struct PairItem {
    pub id: String,
    /// URL of the prepared asset
    pub asset_url: String,
}

#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub pair_id: Uuid,
    pub left: PairItem,
    pub right: PairItem,
}

impl From<ComparisonPair> for PairResponse {
    fn from(pair: ComparisonPair) -> Self {
        let item = |side: Side, id: String| PairItem {
            id,
            asset_url: format!("/api/v1/pairs/{}/{}/asset", pair.pair_id, side),
        };
        Self {
            pair_id: pair.pair_id,
            left: item(Side::Left, pair.left.clone()),
            right: item(Side::Right, pair.right.clone()),
        }
    }
}

/// Body of winner and blacklist requests
#[derive(Debug, Deserialize)]
pub struct SideRequest {
    pub side: Side,
}

/// POST /api/v1/pairs/next
pub async fn next_pair(State(state): State<AppState>) -> ApiResult<Json<PairResponse>> {
    let pair = state.session.lock().await.request_next_pair().await?;
    Ok(Json(pair.into()))
}

/// GET /api/v1/pairs/current
pub async fn current_pair(State(state): State<AppState>) -> ApiResult<Json<PairResponse>> {
    let pair = state
        .session
        .lock()
        .await
        .current()
        .cloned()
        .ok_or_else(|| Error::NotFound("no pair is being presented".to_string()))?;
    Ok(Json(pair.into()))
}

/// POST /api/v1/pairs/:pair_id/winner
///
/// **Request:** `{"side": "left"}`
/// **Response:** the winner and loser with their new ratings
pub async fn report_winner(
    State(state): State<AppState>,
    Path(pair_id): Path<Uuid>,
    Json(request): Json<SideRequest>,
) -> ApiResult<Json<Outcome>> {
    debug!("Winner {} for pair {}", request.side, pair_id);
    let outcome = state.session.lock().await.report_winner(pair_id, request.side).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/pairs/:pair_id/blacklist
///
/// **Request:** `{"side": "right"}`
/// **Response:** the pair with a replacement on that side
pub async fn blacklist_side(
    State(state): State<AppState>,
    Path(pair_id): Path<Uuid>,
    Json(request): Json<SideRequest>,
) -> ApiResult<Json<PairResponse>> {
    debug!("Blacklist {} side of pair {}", request.side, pair_id);
    let pair = state
        .session
        .lock()
        .await
        .blacklist_and_replace(pair_id, request.side)
        .await?;
    Ok(Json(pair.into()))
}

/// GET /api/v1/pairs/:pair_id/:side/asset
pub async fn pair_asset(
    State(state): State<AppState>,
    Path((pair_id, side)): Path<(Uuid, Side)>,
) -> ApiResult<impl IntoResponse> {
    let asset = state.session.lock().await.asset(pair_id, side)?;
    Ok((
        [
            (header::CONTENT_TYPE, asset.mime),
            (header::CACHE_CONTROL, "no-store"),
        ],
        asset.bytes.clone(),
    ))
}

/// Build pair routes
pub fn pair_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/pairs/next", post(next_pair))
        .route("/api/v1/pairs/current", get(current_pair))
        .route("/api/v1/pairs/:pair_id/winner", post(report_winner))
        .route("/api/v1/pairs/:pair_id/blacklist", post(blacklist_side))
        .route("/api/v1/pairs/:pair_id/:side/asset", get(pair_asset))
}
