// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Event queue: hands accepted webhook events to the pipeline.
//!
//! In production events go through Cloud Tasks, which delivers each one to
//! `/tasks/process-batch` and redelivers it when the handler answers 5xx.
//! The inline backend runs the pipeline in-process for local development.

use crate::error::{AppError, Result};
use crate::models::{QueueBatch, QueueMessage};
use crate::services::pipeline::EventPipeline;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Path the transport delivers batches to.
pub const PROCESS_BATCH_PATH: &str = "/tasks/process-batch";

/// Build a queue message for a raw webhook body.
///
/// The id is derived from the body, so a redelivered webhook keeps its id.
pub fn message_for(body: impl Into<String>) -> QueueMessage {
    let body = body.into();
    let digest = Sha256::digest(body.as_bytes());
    let mut message_id = hex::encode(digest);
    message_id.truncate(16);
    QueueMessage { message_id, body }
}

/// Accepts messages for asynchronous processing.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue(&self, message: QueueMessage) -> Result<()>;
}

/// Cloud Tasks queue targeting this service.
pub struct CloudTasksQueue {
    project_id: String,
    location: String,
    queue_name: String,
    service_url: String,
}

impl CloudTasksQueue {
    pub fn new(project_id: &str, region: &str, service_url: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::EVENT_QUEUE_NAME.to_string(),
            service_url: service_url.trim_end_matches('/').to_string(),
        }
    }

    fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        )
    }
}

#[async_trait]
impl EventQueue for CloudTasksQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, Task};

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks client error: {}", e)))?;

        let message_id = message.message_id.clone();
        let batch = QueueBatch {
            records: vec![message],
        };
        let body = serde_json::to_vec(&batch)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}{}", self.service_url, PROCESS_BATCH_PATH))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]));

        let task = Task::default().set_http_request(http_request);

        client
            .create_task()
            .set_parent(self.queue_path())
            .set_task(task)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Cloud Tasks create error: {}", e)))?;

        tracing::info!(message_id = %message_id, "Event queued");
        Ok(())
    }
}

/// Runs each message through the pipeline on a background task.
///
/// There is no redelivery: failures are only logged.
pub struct InlineQueue {
    pipeline: EventPipeline,
}

impl InlineQueue {
    pub fn new(pipeline: EventPipeline) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl EventQueue for InlineQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<()> {
        let pipeline = self.pipeline.clone();
        tokio::spawn(async move {
            let outcome = pipeline.process_batch(vec![message]).await;
            for failure in outcome.failures() {
                tracing::warn!(
                    message_id = %failure.message_id,
                    "Inline event failed; it will not be redelivered"
                );
            }
        });
        Ok(())
    }
}
