// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-WX: annotate new Strava activities with the weather at their start
//!
//! This crate provides the webhook ingress, the event pipeline that turns
//! queued events into activity descriptions, and the token broker that keeps
//! each athlete's Strava credentials valid.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{EventPipeline, EventQueue};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub pipeline: EventPipeline,
    pub queue: Arc<dyn EventQueue>,
}
