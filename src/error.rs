// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! The same enum describes both HTTP-surface failures and the task-scoped
//! failures reported by the event pipeline.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Malformed event payload: {0}")]
    Parse(String),

    #[error("No token record for athlete {0}")]
    RecordNotFound(u64),

    #[error("Token refresh rejected: {0}")]
    UpstreamAuth(String),

    #[error("Upstream call timed out: {0}")]
    UpstreamTimeout(&'static str),

    #[error("Token store error: {0}")]
    Persistence(String),

    #[error("Upstream API error: {0}")]
    UpstreamApi(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker included in `UpstreamApi` messages when Strava answers 429.
    pub const RATE_LIMITED: &'static str = "Rate limit exceeded";

    /// Stable machine-readable code, used in batch reports and JSON bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Parse(_) => "parse_error",
            AppError::RecordNotFound(_) => "record_not_found",
            AppError::UpstreamAuth(_) => "upstream_auth_error",
            AppError::UpstreamTimeout(_) => "upstream_timeout",
            AppError::Persistence(_) => "persistence_error",
            AppError::UpstreamApi(_) => "upstream_api_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamAuth(_) | AppError::UpstreamApi(_) => StatusCode::BAD_GATEWAY,
            AppError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Persistence(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Store and internal failures are logged, not echoed to the caller.
        let details = match &self {
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Token store error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            AppError::Unauthorized => None,
            other => Some(other.to_string()),
        };

        let body = ErrorResponse {
            error: self.kind().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
