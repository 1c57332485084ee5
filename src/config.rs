// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read from the environment once at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Cloud Tasks queue that delivers webhook events to the worker endpoint.
pub const EVENT_QUEUE_NAME: &str = "webhook-events";

/// How concurrent refreshes for the same athlete are coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Per-athlete lock around read-check-refresh-write.
    #[default]
    Serialized,
    /// No coordination; concurrent tasks may each refresh and race on writes.
    Unguarded,
}

impl FromStr for RefreshPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serialized" => Ok(Self::Serialized),
            "unguarded" => Ok(Self::Unguarded),
            _ => Err(ConfigError::Invalid("TOKEN_REFRESH_POLICY", s.to_string())),
        }
    }
}

/// Where ingress sends accepted webhook events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueBackend {
    /// Google Cloud Tasks, delivering to `/tasks/process-batch`.
    #[default]
    CloudTasks,
    /// Run the pipeline in-process (local development).
    Inline,
}

impl FromStr for QueueBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud_tasks" | "cloudtasks" => Ok(Self::CloudTasks),
            "inline" => Ok(Self::Inline),
            _ => Err(ConfigError::Invalid("QUEUE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth base URL (token endpoint lives under it)
    pub strava_oauth_url: String,
    /// OpenWeatherMap base URL
    pub weather_api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region for Cloud Tasks
    pub gcp_region: String,
    /// Public URL of this service (Cloud Tasks target)
    pub api_url: String,
    /// Server port
    pub port: u16,
    /// Enqueue backend used by webhook ingress
    pub queue_backend: QueueBackend,
    /// Refresh coordination policy
    pub refresh_policy: RefreshPolicy,
    /// Refresh this long before the recorded expiry
    pub refresh_margin: Duration,
    /// Overall processing deadline for one delivered batch
    pub batch_deadline: Duration,
    /// Athletes whose activities are annotated; empty means everyone
    pub tracked_athlete_ids: Vec<u64>,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// OpenWeatherMap API key
    pub weather_api_key: String,
    /// Webhook verification token
    pub webhook_verify_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| "https://www.strava.com/api/v3".to_string()),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| "https://www.strava.com/oauth".to_string()),
            weather_api_url: env::var("WEATHER_API_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            queue_backend: optional("QUEUE_BACKEND")?.unwrap_or_default(),
            refresh_policy: optional("TOKEN_REFRESH_POLICY")?.unwrap_or_default(),
            refresh_margin: Duration::from_secs(
                optional("TOKEN_REFRESH_MARGIN_SECS")?.unwrap_or(0),
            ),
            batch_deadline: Duration::from_secs(optional("BATCH_DEADLINE_SECS")?.unwrap_or(60)),
            tracked_athlete_ids: parse_id_list(
                &env::var("TRACKED_ATHLETE_IDS").unwrap_or_default(),
            )?,

            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            weather_api_key: required("WEATHER_API_KEY")?,
            webhook_verify_token: required("WEBHOOK_VERIFY_TOKEN")?,
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_api_url: "http://127.0.0.1:9/api/v3".to_string(),
            strava_oauth_url: "http://127.0.0.1:9/oauth".to_string(),
            weather_api_url: "http://127.0.0.1:9".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            api_url: "http://localhost:8080".to_string(),
            port: 8080,
            queue_backend: QueueBackend::Inline,
            refresh_policy: RefreshPolicy::Serialized,
            refresh_margin: Duration::ZERO,
            batch_deadline: Duration::from_secs(5),
            tracked_athlete_ids: Vec::new(),
            strava_client_secret: "test_secret".to_string(),
            weather_api_key: "test_weather_key".to_string(),
            webhook_verify_token: "test_verify_token".to_string(),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name, raw)),
        _ => Ok(None),
    }
}

/// Parse a comma-separated list of athlete IDs.
fn parse_id_list(raw: &str) -> Result<Vec<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ConfigError::Invalid("TRACKED_ATHLETE_IDS", s.to_string()))
        })
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
