// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test harness: counting fakes behind the service traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strava_wx::config::{Config, RefreshPolicy};
use strava_wx::db::{FirestoreDb, MemoryStore};
use strava_wx::error::AppError;
use strava_wx::models::{Activity, QueueMessage, TokenRecord};
use strava_wx::routes::create_router;
use strava_wx::services::strava::TokenRefreshResponse;
use strava_wx::services::{
    ActivityApi, EventPipeline, EventQueue, IdentityProvider, TokenBroker, WeatherApi,
};
use strava_wx::time_utils::now_epoch;
use strava_wx::AppState;

pub const ATHLETE_ID: u64 = 55440166;
pub const ACTIVITY_ID: u64 = 42;
pub const WEATHER_DESCRIPTION: &str =
    "☀️ Clear, 61°F, Feels like 60°F, Humidity 40%, Wind 5mph from NW";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Token record that expired a minute ago.
#[allow(dead_code)]
pub fn expired_record(athlete_id: u64) -> TokenRecord {
    TokenRecord {
        athlete_id,
        access_token: "stale-access".to_string(),
        expires_at: now_epoch() - 60,
        refresh_token: Some("refresh-0".to_string()),
    }
}

/// Token record valid for another hour.
#[allow(dead_code)]
pub fn fresh_record(athlete_id: u64) -> TokenRecord {
    TokenRecord {
        athlete_id,
        access_token: "fresh-access".to_string(),
        expires_at: now_epoch() + 3600,
        refresh_token: Some("refresh-0".to_string()),
    }
}

/// Raw webhook body as Strava sends it.
#[allow(dead_code)]
pub fn event_body(object_type: &str, aspect_type: &str, owner_id: u64, object_id: u64) -> String {
    serde_json::json!({
        "object_type": object_type,
        "object_id": object_id,
        "aspect_type": aspect_type,
        "owner_id": owner_id,
        "subscription_id": 120475,
        "event_time": 1_716_400_000,
        "updates": {}
    })
    .to_string()
}

#[allow(dead_code)]
pub fn message(id: &str, body: impl Into<String>) -> QueueMessage {
    QueueMessage {
        message_id: id.to_string(),
        body: body.into(),
    }
}

/// Message for a new activity owned by the default athlete.
#[allow(dead_code)]
pub fn create_message(id: &str, activity_id: u64) -> QueueMessage {
    message(
        id,
        event_body("activity", "create", ATHLETE_ID, activity_id),
    )
}

/// Identity provider that mints sequential tokens valid for an hour.
#[derive(Default)]
pub struct FakeIdentity {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    /// When false the refresh token comes back unchanged.
    pub rotate: AtomicBool,
    pub delay: Mutex<Duration>,
    pub seen_refresh_tokens: Mutex<Vec<String>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        let identity = Self::default();
        identity.rotate.store(true, Ordering::SeqCst);
        identity
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen_refresh_tokens
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamAuth(
                "HTTP 400 Bad Request: invalid_grant".to_string(),
            ));
        }

        let refresh_token = if self.rotate.load(Ordering::SeqCst) {
            format!("refresh-{}", n)
        } else {
            refresh_token.to_string()
        };

        Ok(TokenRefreshResponse {
            access_token: format!("access-{}", n),
            refresh_token,
            expires_at: now_epoch() + 21_600,
        })
    }
}

/// Activity API backed by per-id stored activities.
///
/// Unknown ids start as a copy of the template. Updates are applied to
/// the stored activity so reruns see them.
pub struct FakeActivities {
    pub template: Activity,
    pub activities: Mutex<HashMap<u64, Activity>>,
    pub get_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub tokens_used: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(u64, String)>>,
    pub fail_ids: Mutex<HashSet<u64>>,
}

impl FakeActivities {
    pub fn with_coordinates() -> Self {
        Self::new(Activity {
            start_date: "2024-05-22T14:30:00Z".to_string(),
            start_latlng: vec![37.3861, -122.0839],
            description: None,
        })
    }

    pub fn new(template: Activity) -> Self {
        Self {
            template,
            activities: Mutex::new(HashMap::new()),
            get_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            tokens_used: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            fail_ids: Mutex::new(HashSet::new()),
        }
    }

    #[allow(dead_code)]
    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn update_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Current description of a stored activity.
    #[allow(dead_code)]
    pub fn description(&self, activity_id: u64) -> Option<String> {
        self.activities
            .lock()
            .unwrap()
            .get(&activity_id)
            .and_then(|a| a.description.clone())
    }
}

#[async_trait]
impl ActivityApi for FakeActivities {
    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<Activity, AppError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_used
            .lock()
            .unwrap()
            .push(access_token.to_string());

        if self.fail_ids.lock().unwrap().contains(&activity_id) {
            return Err(AppError::UpstreamApi("HTTP 404 Not Found".to_string()));
        }
        Ok(self
            .activities
            .lock()
            .unwrap()
            .entry(activity_id)
            .or_insert_with(|| self.template.clone())
            .clone())
    }

    async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens_used
            .lock()
            .unwrap()
            .push(access_token.to_string());
        self.updates
            .lock()
            .unwrap()
            .push((activity_id, description.to_string()));
        self.activities
            .lock()
            .unwrap()
            .entry(activity_id)
            .or_insert_with(|| self.template.clone())
            .description = Some(description.to_string());
        Ok(())
    }
}

/// Weather API returning a fixed description.
#[derive(Default)]
pub struct FakeWeather {
    pub calls: AtomicUsize,
    pub delay: Mutex<Duration>,
    pub fail: AtomicBool,
}

impl FakeWeather {
    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherApi for FakeWeather {
    async fn describe(&self, _lat: f64, _lon: f64, _at: DateTime<Utc>) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::UpstreamApi("Weather HTTP 503".to_string()));
        }
        Ok(WEATHER_DESCRIPTION.to_string())
    }
}

/// Pipeline wired to fakes, with handles to every fake.
pub struct Harness {
    pub store: MemoryStore,
    pub identity: Arc<FakeIdentity>,
    pub activities: Arc<FakeActivities>,
    pub weather: Arc<FakeWeather>,
    pub policy: RefreshPolicy,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            store: MemoryStore::new(),
            identity: Arc::new(FakeIdentity::new()),
            activities: Arc::new(FakeActivities::with_coordinates()),
            weather: Arc::new(FakeWeather::default()),
            policy,
        }
    }

    pub fn broker(&self) -> TokenBroker {
        TokenBroker::new(
            Arc::new(self.store.clone()),
            self.identity.clone(),
            self.policy,
            Duration::ZERO,
        )
    }

    pub fn pipeline(&self) -> EventPipeline {
        self.pipeline_with(Vec::new(), Duration::from_secs(5))
    }

    pub fn pipeline_with(&self, tracked: Vec<u64>, deadline: Duration) -> EventPipeline {
        EventPipeline::new(
            self.broker(),
            self.activities.clone(),
            self.weather.clone(),
            tracked,
            deadline,
        )
    }

    /// Network calls to Strava and the weather service combined.
    pub fn network_calls(&self) -> usize {
        self.identity.calls() + self.activities.gets() + self.activities.update_count()
            + self.weather.calls()
    }
}

/// Queue that records messages instead of sending them.
#[derive(Default)]
pub struct RecordingQueue {
    pub messages: Mutex<Vec<QueueMessage>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EventQueue for RecordingQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("queue unavailable")));
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Create a test app wired to fakes and a recording queue.
#[allow(dead_code)]
pub fn create_test_app(harness: &Harness) -> (axum::Router, Arc<AppState>, Arc<RecordingQueue>) {
    let config = Config::test_default();
    let queue = Arc::new(RecordingQueue::default());

    let state = Arc::new(AppState {
        pipeline: harness.pipeline_with(config.tracked_athlete_ids.clone(), config.batch_deadline),
        config,
        queue: queue.clone(),
    });

    (create_router(state.clone()), state, queue)
}
