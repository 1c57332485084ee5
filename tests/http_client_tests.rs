// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava and OpenWeatherMap clients against a mock HTTP server.

use chrono::{TimeZone, Utc};
use serde_json::json;
use strava_wx::error::AppError;
use strava_wx::services::{
    ActivityApi, IdentityProvider, OpenWeatherClient, StravaClient, WeatherApi,
};
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn strava(server: &MockServer) -> StravaClient {
    StravaClient::new(
        "client-id".to_string(),
        "client-secret".to_string(),
        format!("{}/api/v3", server.uri()),
        format!("{}/oauth", server.uri()),
    )
}

mod strava_client {
    use super::*;

    #[tokio::test]
    async fn test_refresh_token_posts_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "new-access",
                "expires_at": 1_716_421_600,
                "expires_in": 21600,
                "refresh_token": "new-refresh"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = strava(&server).refresh_token("old-refresh").await.unwrap();
        assert_eq!(tokens.access_token, "new-access");
        assert_eq!(tokens.refresh_token, "new-refresh");
        assert_eq!(tokens.expires_at, 1_716_421_600);
    }

    #[tokio::test]
    async fn test_refresh_rejection_is_upstream_auth() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "Bad Request",
                "errors": [{"resource": "RefreshToken", "field": "refresh_token", "code": "invalid"}]
            })))
            .mount(&server)
            .await;

        let result = strava(&server).refresh_token("revoked").await;
        assert!(matches!(result, Err(AppError::UpstreamAuth(_))));
    }

    #[tokio::test]
    async fn test_get_activity_uses_bearer_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/activities/42"))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "name": "Morning Ride",
                "start_date": "2024-05-22T14:30:00Z",
                "start_latlng": [37.3861, -122.0839],
                "description": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let activity = strava(&server).get_activity("access-1", 42).await.unwrap();
        assert_eq!(activity.start_coordinates(), Some((37.3861, -122.0839)));
        assert_eq!(activity.description, None);
    }

    #[tokio::test]
    async fn test_update_description_puts_json() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/api/v3/activities/42"))
            .and(header("Authorization", "Bearer access-1"))
            .and(body_json(json!({"description": "☀️ Sunny, 72°F"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        strava(&server)
            .update_activity_description("access-1", 42, "☀️ Sunny, 72°F")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/activities/42"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = strava(&server).get_activity("access-1", 42).await;
        match result {
            Err(AppError::UpstreamApi(msg)) => assert_eq!(msg, AppError::RATE_LIMITED),
            other => panic!("expected rate limit error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_activity_is_upstream_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/activities/7"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Record Not Found"))
            .mount(&server)
            .await;

        let result = strava(&server).get_activity("access-1", 7).await;
        match result {
            Err(AppError::UpstreamApi(msg)) => assert!(msg.contains("404")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }
}

mod weather_client {
    use super::*;

    #[tokio::test]
    async fn test_describe_queries_timemachine() {
        let server = MockServer::start().await;
        let at = Utc.with_ymd_and_hms(2024, 5, 22, 14, 30, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall/timemachine"))
            .and(query_param("lat", "37.3861"))
            .and(query_param("lon", "-122.0839"))
            .and(query_param("dt", at.timestamp().to_string()))
            .and(query_param("appid", "wx-key"))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lat": 37.3861,
                "lon": -122.0839,
                "timezone": "America/Los_Angeles",
                "data": [{
                    "dt": at.timestamp(),
                    "sunrise": at.timestamp() - 3600,
                    "sunset": at.timestamp() + 3600,
                    "temp": 71.6,
                    "feels_like": 70.2,
                    "humidity": 40,
                    "wind_speed": 8.4,
                    "wind_deg": 315,
                    "weather": [{"id": 800, "main": "Clear", "description": "clear sky"}]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(server.uri(), "wx-key".to_string());
        let description = client.describe(37.3861, -122.0839, at).await.unwrap();
        assert_eq!(
            description,
            "☀️ Sunny, 72°F, Feels like 70°F, Humidity 40%, Wind 8mph from NW"
        );
    }

    #[tokio::test]
    async fn test_empty_data_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall/timemachine"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(server.uri(), "wx-key".to_string());
        let result = client.describe(0.0, 0.0, Utc::now()).await;
        assert!(matches!(result, Err(AppError::UpstreamApi(_))));
    }

    #[tokio::test]
    async fn test_http_error_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall/timemachine"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(server.uri(), "bad-key".to_string());
        let result = client.describe(0.0, 0.0, Utc::now()).await;
        match result {
            Err(AppError::UpstreamApi(msg)) => assert!(msg.contains("401")),
            other => panic!("expected upstream error, got {:?}", other),
        }
    }
}
