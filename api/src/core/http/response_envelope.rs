//! Error envelope. Success bodies are the flat per-action contracts; errors
//! share `{code, message}` with the mapped status.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiError {
    /// Stable, machine-readable error code (e.g. "BAD_REQUEST").
    pub code: &'static str,
    /// Human-friendly error message.
    pub message: String,
}

impl ApiError {
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

pub fn bad_request(message: impl Into<String>) -> Response {
    ApiError {
        code: "BAD_REQUEST",
        message: message.into(),
    }
    .into_response_with_status(StatusCode::BAD_REQUEST)
}

pub fn unauthorized() -> Response {
    ApiError {
        code: "UNAUTHORIZED",
        message: "Invalid or missing request signature.".to_string(),
    }
    .into_response_with_status(StatusCode::UNAUTHORIZED)
}

pub fn server_error(message: impl Into<String>) -> Response {
    ApiError {
        code: "INTERNAL_ERROR",
        message: message.into(),
    }
    .into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
}
