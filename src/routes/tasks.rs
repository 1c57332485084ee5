// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks, not directly by users.
//! The queue header is checked by `require_tasks_auth`.

use crate::error::AppError;
use crate::models::QueueBatch;
use crate::services::pipeline::BatchSummary;
use crate::services::queue::PROCESS_BATCH_PATH;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(PROCESS_BATCH_PATH, post(process_batch))
}

/// Process a delivered batch of webhook events.
///
/// Returns 500 if any message failed so the whole batch is redelivered.
async fn process_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueueBatch>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchSummary>), AppError> {
    let Json(batch) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    tracing::info!(
        count = batch.records.len(),
        "Processing batch from Cloud Task"
    );

    let outcome = state.pipeline.process_batch(batch.records).await;
    let summary = outcome.summary();

    if outcome.is_success() {
        Ok((StatusCode::OK, Json(summary)))
    } else {
        tracing::error!(
            failed = summary.failed,
            total = summary.total,
            "Batch failed, requesting redelivery"
        );
        // Return 500 to trigger Cloud Tasks retry
        Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(summary)))
    }
}
