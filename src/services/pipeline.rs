// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event pipeline: turns a delivered batch of webhook events into weather
//! annotations.
//!
//! Handles the core workflow for each message:
//! 1. Parse the event and drop anything that is not a new activity
//! 2. Make sure the owner's access token is valid
//! 3. Fetch the activity; stop if it has no start coordinates
//! 4. Look up the weather at the start time and place
//! 5. Re-check the token, then write the description
//!
//! Every message runs in its own task. A failure in one never stops the
//! others, but any failure marks the batch as failed so the transport
//! redelivers it. All steps are therefore safe to repeat.

use crate::error::AppError;
use crate::models::{AnnotationTask, QueueMessage, WebhookEvent};
use crate::services::broker::{EnsureOutcome, TokenBroker, TokenLease};
use crate::services::deadline::Deadline;
use crate::services::strava::ActivityApi;
use crate::services::weather::WeatherApi;
use crate::time_utils::parse_rfc3339_utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Terminal state of one message.
#[derive(Debug)]
pub enum TaskState {
    /// Not a new activity (or not a tracked athlete); nothing was called.
    Filtered,
    /// Activity has no start coordinates; nothing to annotate.
    NoCoordinates,
    /// Description written.
    Annotated,
    /// Description already matched; update skipped.
    AlreadyAnnotated,
    Failed(AppError),
}

impl TaskState {
    pub fn is_success(&self) -> bool {
        !matches!(self, TaskState::Failed(_))
    }
}

/// Outcome of one message, with how often the token was checked and refreshed.
#[derive(Debug)]
pub struct TaskReport {
    pub message_id: String,
    pub state: TaskState,
    pub token_checks: u32,
    pub refreshes: u32,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn error(&self) -> Option<&AppError> {
        match &self.state {
            TaskState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Reports for a whole batch, in delivery order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<TaskReport>,
}

impl BatchOutcome {
    /// The batch succeeds only if every message did.
    pub fn is_success(&self) -> bool {
        self.reports.iter().all(TaskReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.iter().filter(|r| !r.is_success())
    }

    pub fn summary(&self) -> BatchSummary {
        let failures: Vec<TaskFailure> = self
            .failures()
            .filter_map(|r| {
                r.error().map(|e| TaskFailure {
                    message_id: r.message_id.clone(),
                    error: e.kind().to_string(),
                    details: e.to_string(),
                })
            })
            .collect();

        BatchSummary {
            total: self.reports.len(),
            succeeded: self.reports.len() - failures.len(),
            failed: failures.len(),
            failures,
        }
    }
}

/// JSON report returned to the transport.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Serialize)]
pub struct TaskFailure {
    pub message_id: String,
    pub error: String,
    pub details: String,
}

#[derive(Debug, Default)]
struct TokenStats {
    checks: u32,
    refreshes: u32,
}

/// Processes delivered batches. Cheap to clone; clients are shared.
#[derive(Clone)]
pub struct EventPipeline {
    broker: TokenBroker,
    activities: Arc<dyn ActivityApi>,
    weather: Arc<dyn WeatherApi>,
    tracked_athlete_ids: Arc<[u64]>,
    batch_deadline: Duration,
}

impl EventPipeline {
    pub fn new(
        broker: TokenBroker,
        activities: Arc<dyn ActivityApi>,
        weather: Arc<dyn WeatherApi>,
        tracked_athlete_ids: Vec<u64>,
        batch_deadline: Duration,
    ) -> Self {
        Self {
            broker,
            activities,
            weather,
            tracked_athlete_ids: tracked_athlete_ids.into(),
            batch_deadline,
        }
    }

    /// Process every message concurrently and wait for all of them.
    ///
    /// There is no cap on fan-out: a batch of N messages runs N tasks.
    pub async fn process_batch(&self, messages: Vec<QueueMessage>) -> BatchOutcome {
        let deadline = Deadline::after(self.batch_deadline);
        let count = messages.len();
        tracing::info!(count, "Processing batch");

        let message_ids: Vec<String> = messages.iter().map(|m| m.message_id.clone()).collect();
        let mut tasks = JoinSet::new();
        for (index, message) in messages.into_iter().enumerate() {
            let pipeline = self.clone();
            tasks.spawn(async move { (index, pipeline.process_message(message, deadline).await) });
        }

        let mut slots: Vec<Option<TaskReport>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => tracing::error!(error = %e, "Event task aborted"),
            }
        }

        let reports: Vec<TaskReport> = slots
            .into_iter()
            .zip(message_ids)
            .map(|(slot, message_id)| {
                slot.unwrap_or_else(|| TaskReport {
                    message_id,
                    state: TaskState::Failed(AppError::Internal(anyhow::anyhow!(
                        "Event task aborted"
                    ))),
                    token_checks: 0,
                    refreshes: 0,
                })
            })
            .collect();

        let outcome = BatchOutcome { reports };
        let summary = outcome.summary();
        if outcome.is_success() {
            tracing::info!(count, "Batch processed");
        } else {
            tracing::warn!(
                count,
                failed = summary.failed,
                "Batch processed with failures"
            );
        }
        outcome
    }

    /// Process a single message to a terminal state.
    pub async fn process_message(&self, message: QueueMessage, deadline: Deadline) -> TaskReport {
        let span = tracing::info_span!("event", message_id = %message.message_id);
        let mut stats = TokenStats::default();

        let state = match self
            .run(&message.body, &deadline, &mut stats)
            .instrument(span.clone())
            .await
        {
            Ok(state) => state,
            Err(e) => TaskState::Failed(e),
        };

        span.in_scope(|| match &state {
            TaskState::Failed(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Event failed")
            }
            other => tracing::info!(state = ?other, "Event processed"),
        });

        TaskReport {
            message_id: message.message_id,
            state,
            token_checks: stats.checks,
            refreshes: stats.refreshes,
        }
    }

    async fn run(
        &self,
        body: &str,
        deadline: &Deadline,
        stats: &mut TokenStats,
    ) -> Result<TaskState, AppError> {
        let event = WebhookEvent::parse(body).map_err(|e| AppError::Parse(e.to_string()))?;

        let Some(task) = event.annotation_task(&self.tracked_athlete_ids) else {
            tracing::debug!(
                object_type = %event.object_type,
                aspect_type = %event.aspect_type,
                owner_id = event.owner_id,
                "Ignoring event that is not a tracked activity creation"
            );
            return Ok(TaskState::Filtered);
        };

        tracing::info!(
            athlete_id = task.owner_id,
            activity_id = task.activity_id,
            "Annotating new activity"
        );

        let mut lease = self.broker.load(task.owner_id, deadline).await?;
        let result = self.annotate(task, &mut lease, deadline, stats).await;

        // Refreshed tokens must be durable (or their failure seen) before
        // the task counts as done.
        lease.settle(deadline).await;
        let state = result?;
        if let Some(e) = lease.take_persistence_error() {
            return Err(e);
        }
        Ok(state)
    }

    async fn annotate(
        &self,
        task: AnnotationTask,
        lease: &mut TokenLease,
        deadline: &Deadline,
        stats: &mut TokenStats,
    ) -> Result<TaskState, AppError> {
        self.check_token(lease, deadline, stats).await?;

        let activity = deadline
            .run(
                "activity fetch",
                self.activities
                    .get_activity(lease.access_token(), task.activity_id),
            )
            .await?;

        let Some((lat, lon)) = activity.start_coordinates() else {
            tracing::info!(
                activity_id = task.activity_id,
                "Activity has no start coordinates, nothing to annotate"
            );
            return Ok(TaskState::NoCoordinates);
        };

        let started_at = parse_rfc3339_utc(&activity.start_date).map_err(|e| {
            AppError::UpstreamApi(format!(
                "Invalid start_date {:?} for activity {}: {}",
                activity.start_date, task.activity_id, e
            ))
        })?;

        let description = deadline
            .run("weather lookup", self.weather.describe(lat, lon, started_at))
            .await?;

        // Slow upstreams can outlast the token; check again before writing.
        self.check_token(lease, deadline, stats).await?;

        if activity.description.as_deref() == Some(description.as_str()) {
            tracing::debug!(
                activity_id = task.activity_id,
                "Activity already annotated (idempotent skip)"
            );
            return Ok(TaskState::AlreadyAnnotated);
        }

        deadline
            .run(
                "activity update",
                self.activities.update_activity_description(
                    lease.access_token(),
                    task.activity_id,
                    &description,
                ),
            )
            .await?;

        tracing::info!(
            activity_id = task.activity_id,
            description = %description,
            "Activity annotated"
        );
        Ok(TaskState::Annotated)
    }

    async fn check_token(
        &self,
        lease: &mut TokenLease,
        deadline: &Deadline,
        stats: &mut TokenStats,
    ) -> Result<(), AppError> {
        stats.checks += 1;
        let outcome = self.broker.ensure_valid(lease, deadline).await?;
        if outcome == EnsureOutcome::Refreshed {
            stats.refreshes += 1;
        }
        Ok(())
    }
}
