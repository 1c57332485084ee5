// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava-WX API Server
//!
//! Receives Strava webhooks and annotates newly created activities with the
//! weather at their start.

use std::sync::Arc;
use strava_wx::{
    config::{Config, QueueBackend},
    db::FirestoreDb,
    services::{
        CloudTasksQueue, EventPipeline, EventQueue, InlineQueue, OpenWeatherClient, StravaClient,
        TokenBroker,
    },
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        policy = ?config.refresh_policy,
        queue = ?config.queue_backend,
        "Starting Strava-WX API"
    );

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Clients are built once and shared by every task
    let strava = Arc::new(StravaClient::new(
        config.strava_client_id.clone(),
        config.strava_client_secret.clone(),
        config.strava_api_url.clone(),
        config.strava_oauth_url.clone(),
    ));
    let weather = Arc::new(OpenWeatherClient::new(
        config.weather_api_url.clone(),
        config.weather_api_key.clone(),
    ));

    let broker = TokenBroker::new(
        Arc::new(db),
        strava.clone(),
        config.refresh_policy,
        config.refresh_margin,
    );
    let pipeline = EventPipeline::new(
        broker,
        strava,
        weather,
        config.tracked_athlete_ids.clone(),
        config.batch_deadline,
    );

    let queue: Arc<dyn EventQueue> = match config.queue_backend {
        QueueBackend::CloudTasks => {
            tracing::info!(
                project = %config.gcp_project_id,
                region = %config.gcp_region,
                "Cloud Tasks queue initialized"
            );
            Arc::new(CloudTasksQueue::new(
                &config.gcp_project_id,
                &config.gcp_region,
                &config.api_url,
            ))
        }
        QueueBackend::Inline => {
            tracing::warn!("Using inline queue: failed events will not be redelivered");
            Arc::new(InlineQueue::new(pipeline.clone()))
        }
    };

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        pipeline,
        queue,
    });

    // Build router
    let app = strava_wx::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strava_wx=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
