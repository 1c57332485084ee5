// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batch processing deadline shared by every external call in a batch.

use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Run `call`, failing with `UpstreamTimeout(step)` once the deadline passes.
    ///
    /// The abandoned future is dropped; in-flight requests are not cancelled
    /// on the remote side.
    pub async fn run<T, F>(&self, step: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout_at(self.at, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(step, "Deadline exceeded");
                Err(AppError::UpstreamTimeout(step))
            }
        }
    }
}
