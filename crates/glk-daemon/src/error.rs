//! Maps `glk_core::CoreError` to HTTP responses. The one place in the
//! daemon that knows about status codes — handlers themselves only ever
//! see `CoreError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use glk_core::CoreError;

use crate::api_types::ErrorResponse;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.0.category();
        let status = match category {
            "bad_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "unprocessable" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(error = %self.0, category, "request failed");

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                category,
            }),
        )
            .into_response()
    }
}

/// Anything that reaches a handler as a bare `anyhow::Error` (a transaction
/// begin/commit failure, an unexpected `sqlx::Error`) is always a 500 —
/// services never let these leak as a more specific status.
pub struct InternalError(pub anyhow::Error);

impl From<anyhow::Error> for InternalError {
    fn from(err: anyhow::Error) -> Self {
        InternalError(err)
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "internal error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal error".to_string(),
                category: "server_error",
            }),
        )
            .into_response()
    }
}
