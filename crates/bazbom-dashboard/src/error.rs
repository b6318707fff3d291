//! `DepscanError` lives in `bazbom-core`, `IntoResponse` in `axum` — neither
//! is local to this crate, so the conversion needs a thin wrapper (§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bazbom_core::DepscanError;
use serde_json::json;

pub struct ApiError(pub DepscanError);

impl From<DepscanError> for ApiError {
    fn from(e: DepscanError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            DepscanError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "busy"),
            DepscanError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            DepscanError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            DepscanError::Cancelled => (StatusCode::CONFLICT, "cancelled"),
            DepscanError::Parse { .. } | DepscanError::Resolver(_) => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = Json(json!({ "error": code, "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}
