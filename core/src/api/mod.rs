//! HTTP surface served by the `genstudio` binary.
//!
//! Versioned handler modules (currently `v1`) sit behind a single router that
//! also serves generated media under `/uploads` and, optionally, a static
//! frontend build.

use std::path::Path;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::errors::GenError;
use crate::media::PUBLIC_PREFIX;

pub mod v1;

pub use v1::ApiState;

/// Build the application router.
pub fn create_router(state: ApiState, uploads_dir: &Path, static_dir: Option<&Path>) -> Router {
    let router = v1::routes()
        .nest_service(PUBLIC_PREFIX, ServeDir::new(uploads_dir))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    router.layer(TraceLayer::new_for_http()).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Error body returned by every handler: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GenError> for ApiError {
    fn from(err: GenError) -> Self {
        match &err {
            GenError::Validation(_) => ApiError::bad_request(err.to_string()),
            GenError::NotFound(_) => ApiError::not_found(err.to_string()),
            GenError::AllProvidersExhausted { .. } => ApiError::internal(err.to_string()),
            _ => {
                log::error!("[{}] {err} ({})", err.code(), err.explain());
                ApiError::internal("Generation storage failed")
            }
        }
    }
}
