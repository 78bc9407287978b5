//! Error types for elopix-ranker
//!
//! `Error` is the ranking-core error returned by store, selection, pipeline
//! and session operations. `ApiError` maps it onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Main error type for elopix-ranker
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer than two items are eligible for comparison
    #[error("Not enough eligible items to compare ({eligible} eligible)")]
    InsufficientCandidates { eligible: usize },

    /// Item identity unknown to the rating store
    #[error("Item not found: {0}")]
    NotFound(String),

    /// Decision references a pair that is not currently presented
    #[error("Pair not found: {0}")]
    PairNotFound(Uuid),

    /// Asset loader could not prepare an item for display
    #[error("Failed to prepare asset {path:?}: {reason}")]
    AssetPreparation { path: PathBuf, reason: String },

    /// Ratings or blacklist document could not be read or written
    #[error("Persistence error for {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: elopix_common::Error,
    },

    /// Catalog scan failed
    #[error("Scan error: {0}")]
    Scan(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a common-library failure on `path` as a persistence error
    pub fn persistence(path: impl Into<PathBuf>, source: impl Into<elopix_common::Error>) -> Self {
        Error::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// Convenience Result type using elopix-ranker Error
pub type Result<T> = std::result::Result<T, Error>;

/// API error type
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::InsufficientCandidates { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_CANDIDATES"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::PairNotFound(_) => (StatusCode::NOT_FOUND, "PAIR_NOT_FOUND"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::AssetPreparation { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "ASSET_ERROR"),
            Error::Persistence { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            Error::Scan(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SCAN_ERROR"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.0.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for HTTP handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
