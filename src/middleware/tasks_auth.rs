// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks authentication middleware.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

/// Header Cloud Tasks sets on every delivery.
pub const QUEUE_NAME_HEADER: &str = "x-cloudtasks-queuename";

/// Require the Cloud Tasks queue header for `/tasks/*` routes.
///
/// Cloud Run strips this header from external requests, so its presence
/// (with our queue name) means the request came from Cloud Tasks.
pub async fn require_tasks_auth(request: Request, next: Next) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get(QUEUE_NAME_HEADER);
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::EVENT_QUEUE_NAME)
        .unwrap_or(false);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            path = %request.uri().path(),
            "Security Alert: Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
