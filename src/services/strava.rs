// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for refreshing tokens and reading/updating activities.
//!
//! Handles:
//! - OAuth refresh-token exchange
//! - Activity fetching
//! - Activity description updates
//! - Rate limit detection (reported so the transport redelivers)

use crate::error::AppError;
use crate::models::Activity;
use async_trait::async_trait;
use serde::Deserialize;

/// Token refresh response from Strava.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds
    pub expires_at: i64,
}

/// Exchanges a refresh token for a new access/refresh pair.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError>;
}

/// Reads and annotates activities on behalf of an athlete.
#[async_trait]
pub trait ActivityApi: Send + Sync {
    async fn get_activity(&self, access_token: &str, activity_id: u64)
        -> Result<Activity, AppError>;

    async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError>;
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        api_url: impl Into<String>,
        oauth_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            oauth_url: oauth_url.into().trim_end_matches('/').to_string(),
            client_id,
            client_secret,
        }
    }

    /// Check response status and return error if not successful.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Rate limit - transport redelivery will retry later
        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return Err(AppError::UpstreamApi(AppError::RATE_LIMITED.to_string()));
        }

        // Unauthorized - token expired or revoked between check and use
        if status.as_u16() == 401 {
            return Err(AppError::UpstreamApi(format!(
                "Strava rejected access token: {}",
                body
            )));
        }

        Err(AppError::UpstreamApi(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl IdentityProvider for StravaClient {
    /// Refresh an expired access token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamAuth(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token refresh failed");
            return Err(AppError::UpstreamAuth(format!("HTTP {}: {}", status, body)));
        }

        response.json().await.map_err(|e| {
            AppError::UpstreamAuth(format!("Failed to parse token response: {}", e))
        })
    }
}

#[async_trait]
impl ActivityApi for StravaClient {
    /// Get a detailed activity by ID.
    async fn get_activity(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<Activity, AppError> {
        let url = format!("{}/activities/{}", self.api_url, activity_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamApi(e.to_string()))?;

        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::UpstreamApi(format!("JSON parse error: {}", e)))
    }

    /// Update an activity's description.
    async fn update_activity_description(
        &self,
        access_token: &str,
        activity_id: u64,
        description: &str,
    ) -> Result<(), AppError> {
        let url = format!("{}/activities/{}", self.api_url, activity_id);

        let body = serde_json::json!({
            "description": description
        });

        let response = self
            .http
            .put(&url)
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamApi(e.to_string()))?;

        Self::check_response(response).await?;
        Ok(())
    }
}
