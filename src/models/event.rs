// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava webhook events and the tasks derived from them.

use serde::{Deserialize, Serialize};

/// Strava webhook event payload.
///
/// Strava also sends `subscription_id` and `updates`; they are not needed
/// here and are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub object_type: String, // "activity" or "athlete"
    pub object_id: u64,
    pub aspect_type: String, // "create", "update", "delete"
    pub owner_id: u64,
    pub event_time: i64,
}

impl WebhookEvent {
    /// Parse a raw queue message body.
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    /// Only newly created activities get a weather annotation.
    pub fn is_activity_create(&self) -> bool {
        self.object_type == "activity" && self.aspect_type == "create"
    }

    /// Build the annotation task for an actionable event.
    ///
    /// `tracked` restricts annotation to the listed athletes; an empty list
    /// accepts every owner.
    pub fn annotation_task(&self, tracked: &[u64]) -> Option<AnnotationTask> {
        if !self.is_activity_create() {
            return None;
        }
        if !tracked.is_empty() && !tracked.contains(&self.owner_id) {
            return None;
        }
        Some(AnnotationTask {
            owner_id: self.owner_id,
            activity_id: self.object_id,
        })
    }
}

/// Work item for one new activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationTask {
    pub owner_id: u64,
    pub activity_id: u64,
}

/// One message as delivered by the queue transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub message_id: String,
    /// Raw webhook JSON, exactly as received by ingress
    pub body: String,
}

/// Batch body posted to the task handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBatch {
    pub records: Vec<QueueMessage>,
}
