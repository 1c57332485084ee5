// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook routes for Strava events.
//!
//! Ingress stays thin: it answers the subscription handshake and enqueues
//! raw event bodies. Parsing and filtering happen in the pipeline.

use crate::error::AppError;
use crate::services::queue::message_for;
use crate::AppState;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook", get(verify).post(handle_event))
}

/// Strava webhook verification query params.
#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode", default)]
    mode: String,
    #[serde(rename = "hub.challenge", default)]
    challenge: String,
    #[serde(rename = "hub.verify_token", default)]
    verify_token: String,
}

/// Verification response.
#[derive(Serialize)]
struct VerifyResponse {
    #[serde(rename = "hub.challenge")]
    challenge: String,
}

/// Verify webhook subscription (GET).
async fn verify(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, AppError> {
    let expected = state.config.webhook_verify_token.as_bytes();
    let matches: bool = params.verify_token.as_bytes().ct_eq(expected).into();

    if !matches {
        tracing::warn!(
            mode = %params.mode,
            "Webhook verification failed: invalid token"
        );
        return Err(AppError::Unauthorized);
    }

    tracing::info!(mode = %params.mode, "Webhook subscription verified");
    Ok(Json(VerifyResponse {
        challenge: params.challenge,
    }))
}

/// Handle incoming webhook events (POST).
///
/// The body is queued verbatim. A 500 makes Strava retry the delivery.
async fn handle_event(State(state): State<Arc<AppState>>, body: String) -> StatusCode {
    let message = message_for(body);
    let message_id = message.message_id.clone();

    tracing::info!(
        message_id = %message_id,
        bytes = message.body.len(),
        "Webhook event received"
    );

    match state.queue.enqueue(message).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!(message_id = %message_id, error = %e, "Failed to queue webhook event");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
