use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tower::ServiceExt;

use shadow_pv_estimator::config::Config;
use shadow_pv_estimator::error::ProviderError;
use shadow_pv_estimator::models::weather::{ForecastEntry, WeatherConditions};
use shadow_pv_estimator::services::weather_provider::{ProviderFuture, WeatherProvider};
use shadow_pv_estimator::shared_state::{AppState, SharedState};

/// Overcast everywhere, forecast every 3 h for five days from now.
struct OvercastProvider;

fn overcast() -> WeatherConditions {
    WeatherConditions {
        cloud_cover: 100.0,
        weather_code: 804,
        description: "overcast clouds".to_string(),
        icon: "04d".to_string(),
    }
}

impl WeatherProvider for OvercastProvider {
    fn fetch_current_weather(&self, _lat: f64, _lon: f64) -> ProviderFuture<'_, WeatherConditions> {
        Box::pin(async { Ok(overcast()) })
    }

    fn fetch_weather_forecast(&self, _lat: f64, _lon: f64) -> ProviderFuture<'_, Vec<ForecastEntry>> {
        Box::pin(async {
            let now = Utc::now();
            Ok((1..=40)
                .map(|i| ForecastEntry {
                    timestamp: now + ChronoDuration::hours(3 * i),
                    conditions: overcast(),
                })
                .collect())
        })
    }
}

struct DownProvider;

impl WeatherProvider for DownProvider {
    fn fetch_current_weather(&self, _lat: f64, _lon: f64) -> ProviderFuture<'_, WeatherConditions> {
        Box::pin(async { Err(ProviderError::InvalidResponse("503 Service Unavailable".to_string())) })
    }

    fn fetch_weather_forecast(&self, _lat: f64, _lon: f64) -> ProviderFuture<'_, Vec<ForecastEntry>> {
        Box::pin(async { Err(ProviderError::InvalidResponse("503 Service Unavailable".to_string())) })
    }
}

fn app(provider: Arc<dyn WeatherProvider>) -> axum::Router {
    let config: Config = serde_json::from_str(r#"{"server": {"port": 0}, "defaults": {
        "location": {"latitude": 45.5, "longitude": 9.19, "altitude": 144, "timezone": "Europe/Rome"},
        "panel": {"tilt": 5, "azimuth": 152, "area": 6.25, "efficiency": 0.142},
        "shadow": {"azimuths": "0, 180, 360", "elevations": "80, 10, 80"},
        "step_minutes": 30
    }}"#)
    .unwrap();
    let state = AppState::new(provider, Duration::from_secs(2), None);
    shadow_pv_estimator::app(SharedState::new(state, config))
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn defaults_echo_the_configuration() {
    let (status, body) = send(app(Arc::new(OvercastProvider)), get("/api/defaults")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step_minutes"], 30);
    assert_eq!(body["location"]["timezone"], "Europe/Rome");
    assert_eq!(body["shadow"]["azimuths"], "0, 180, 360");
}

#[tokio::test]
async fn shadow_lookup_follows_the_profile() {
    let (status, body) = send(
        app(Arc::new(OvercastProvider)),
        get("/api/shadow?azimuth=180&elevation=5"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["horizon_elevation"], 10.0);
    assert_eq!(body["shadowed"], true);

    let (_, body) = send(
        app(Arc::new(OvercastProvider)),
        get("/api/shadow?azimuth=180&elevation=15"),
    )
    .await;
    assert_eq!(body["shadowed"], false);
}

#[tokio::test]
async fn malformed_shadow_profile_is_a_bad_request() {
    let (status, body) = send(
        app(Arc::new(OvercastProvider)),
        get("/api/shadow?azimuth=10&elevation=5&azimuths=0,360&elevations=10"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Configuration error"));
}

#[tokio::test]
async fn estimate_today_has_weather_for_the_rest_of_the_day() {
    let (status, body) = send(app(Arc::new(OvercastProvider)), post_json("/api/estimate", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let day = &body["day"];
    assert_eq!(day["step_minutes"], 30);
    let samples = day["samples"].as_array().unwrap();
    assert!(samples.len() >= 46);
    // Earlier today has no weather; later today is covered by the forecast.
    for sample in samples {
        assert!(sample["weather_power_w"].is_number() || sample["gap"] == "NO_HISTORICAL_DATA");
    }
    assert_eq!(body["instant"]["weather"]["status"], "COVERED");
    assert_eq!(body["instant"]["weather"]["cloud_cover"], 100.0);
}

#[tokio::test]
async fn estimate_six_days_ahead_reports_no_forecast_data() {
    let when = (Utc::now() + ChronoDuration::days(6)).to_rfc3339();
    let (status, body) = send(
        app(Arc::new(OvercastProvider)),
        post_json("/api/estimate", serde_json::json!({ "datetime": when })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instant"]["weather"]["status"], "NO_FORECAST_DATA");
    assert_eq!(body["instant"]["weather_power_w"], Value::Null);
    assert_eq!(body["instant"]["weather_gap"], "NO_FORECAST_DATA");
    assert_eq!(body["day"]["weather_energy_kwh"], Value::Null);
    assert!(body["day"]["clearsky_energy_kwh"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn provider_outage_keeps_clear_sky_and_marks_weather_unavailable() {
    let (status, body) = send(
        app(Arc::new(DownProvider)),
        post_json("/api/estimate", serde_json::json!({ "datetime": "2025-06-21T12:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instant"]["weather"]["status"], "UNAVAILABLE");
    assert_eq!(body["instant"]["weather_gap"], "WEATHER_UNAVAILABLE");
    assert!(body["instant"]["clearsky_power_w"].as_f64().unwrap() > 0.0);
    let samples = body["day"]["samples"].as_array().unwrap();
    assert_eq!(samples.len(), 48);
    assert!(samples.iter().all(|s| s["gap"] == "WEATHER_UNAVAILABLE"));
}

#[tokio::test]
async fn invalid_panel_override_is_rejected() {
    let (status, body) = send(
        app(Arc::new(OvercastProvider)),
        post_json(
            "/api/estimate",
            serde_json::json!({ "panel": { "tilt": 5, "azimuth": 152, "area": 6.25, "efficiency": 14.2 } }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("efficiency"));
}

#[tokio::test]
async fn meter_without_configuration_is_unavailable() {
    let (status, body) = send(app(Arc::new(OvercastProvider)), get("/api/meter")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
    assert_eq!(body["reason"], "meter not configured");
}
