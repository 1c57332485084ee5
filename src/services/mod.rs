// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod broker;
pub mod deadline;
pub mod pipeline;
pub mod queue;
pub mod strava;
pub mod weather;

pub use broker::{EnsureOutcome, TokenBroker, TokenLease};
pub use deadline::Deadline;
pub use pipeline::{BatchOutcome, EventPipeline, TaskReport, TaskState};
pub use queue::{CloudTasksQueue, EventQueue, InlineQueue};
pub use strava::{ActivityApi, IdentityProvider, StravaClient};
pub use weather::{OpenWeatherClient, WeatherApi};
