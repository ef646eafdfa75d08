//! HTTP surface: thin axum handlers over the retrieval coordinator.

pub mod handlers;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::{FetchError, SelectError};
use crate::formats::FormatSelector;
use crate::retrieval::RetrievalCoordinator;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: RetrievalCoordinator,
    pub selector: Arc<FormatSelector>,
}

/// Builds the router. Any origin may call the API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/stream/{video_id}", get(handlers::get_streams))
        .route("/streams/{video_id}", get(handlers::get_streams))
        .route("/m3u8/{video_id}", get(handlers::get_manifest_streams))
        .route("/best/{video_id}", get(handlers::get_best_stream))
        .route("/cache", get(handlers::list_cache))
        .route("/cache/{video_id}", axum::routing::delete(handlers::delete_cache))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidVideoId => Self::bad_request(err.to_string()),
            FetchError::Extraction(_) | FetchError::Timeout(_) => {
                warn!("Responding 500: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<SelectError> for ApiError {
    fn from(err: SelectError) -> Self {
        Self::not_found(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "detail": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
