// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod event;
pub mod token;
pub mod weather;

pub use activity::Activity;
pub use event::{AnnotationTask, QueueBatch, QueueMessage, WebhookEvent};
pub use token::{AccessFacet, RefreshFacet, TokenRecord};
pub use weather::WeatherResponse;
