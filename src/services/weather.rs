// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenWeatherMap client for historical conditions at an activity's start.

use crate::error::AppError;
use crate::models::WeatherResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Looks up a human-readable weather description for a place and time.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn describe(&self, lat: f64, lon: f64, at: DateTime<Utc>) -> Result<String, AppError>;
}

/// OpenWeatherMap One Call 3.0 client (imperial units).
#[derive(Clone)]
pub struct OpenWeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(base_url: impl Into<String>, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    async fn describe(&self, lat: f64, lon: f64, at: DateTime<Utc>) -> Result<String, AppError> {
        let url = format!("{}/data/3.0/onecall/timemachine", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("dt", at.timestamp().to_string()),
                ("appid", self.api_key.clone()),
                ("units", "imperial".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamApi(format!("Weather request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamApi(format!(
                "Weather HTTP {}: {}",
                status, body
            )));
        }

        let weather: WeatherResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamApi(format!("Weather JSON parse error: {}", e)))?;

        weather
            .describe()
            .map_err(|e| AppError::UpstreamApi(e.to_string()))
    }
}
