//! UI route - single HTML page driving the session
//!
//! Arrow keys pick a winner, Shift+arrow blacklists that side, Escape saves.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

const INDEX_HTML: &str = include_str!("ui.html");

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(root_page))
}

async fn root_page() -> impl IntoResponse {
    Html(INDEX_HTML)
}
