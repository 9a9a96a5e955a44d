use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{Config, DefaultsConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::models::api::{
    parse_instant, DefaultsResponse, ErrorResponse, EstimateParams, EstimateResponse, MeterResponse,
    ShadowQuery, ShadowResponse,
};
use crate::services::report_service::{self, EstimateInputs};
use crate::services::shadow_profile::ShadowProfile;
use crate::services::weather_provider::fetch_weather;
use crate::shared_state::AppState;

fn error_response(e: PipelineError) -> axum::response::Response {
    let status = match e {
        PipelineError::Configuration(_) => StatusCode::BAD_REQUEST,
        PipelineError::DataGap { .. } => StatusCode::NOT_FOUND,
        PipelineError::UpstreamUnavailable(_) | PipelineError::WeatherUnavailable => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

fn resolve_inputs(
    params: &EstimateParams,
    defaults: &DefaultsConfig,
    now: DateTime<Utc>,
) -> PipelineResult<EstimateInputs> {
    let location = params.location.as_ref().unwrap_or(&defaults.location).to_location()?;
    let panel = params.panel.as_ref().unwrap_or(&defaults.panel).to_panel()?;
    let profile = params.shadow.as_ref().unwrap_or(&defaults.shadow).to_profile()?;
    let instant = parse_instant(params.datetime.as_deref(), location.timezone(), now)?;
    Ok(EstimateInputs {
        location,
        panel,
        profile,
        step_minutes: params.step_minutes.unwrap_or(defaults.step_minutes),
        instant,
    })
}

/// GET /api/defaults
/// Configured default location, panel, shadow profile and sampling step
#[utoipa::path(
    get,
    path = "/api/defaults",
    responses(
        (status = 200, description = "Defaults applied to omitted request fields", body = DefaultsResponse)
    )
)]
pub async fn get_defaults(State(config): State<Arc<Config>>) -> impl IntoResponse {
    Json(config.defaults.to_response()).into_response()
}

/// POST /api/estimate
/// Clear-sky and weather-adjusted PV output for an instant and its whole local day
///
/// Weather is fetched once per call (observation + forecast). When the provider
/// is unreachable the clear-sky figures are still returned and every
/// weather-adjusted value is `null` with gap `WEATHER_UNAVAILABLE`.
#[utoipa::path(
    post,
    path = "/api/estimate",
    request_body = EstimateParams,
    responses(
        (status = 200, description = "Instant and day report", body = EstimateResponse),
        (status = 400, description = "Invalid location, panel, shadow profile or datetime", body = ErrorResponse)
    )
)]
pub async fn post_estimate(
    State(state): State<AppState>,
    State(config): State<Arc<Config>>,
    Json(params): Json<EstimateParams>,
) -> impl IntoResponse {
    let now = Utc::now();
    let inputs = match resolve_inputs(&params, &config.defaults, now) {
        Ok(inputs) => inputs,
        Err(e) => {
            debug!("[ESTIMATE] rejected request: {}", e);
            return error_response(e);
        }
    };

    let feed = fetch_weather(state.weather.as_ref(), &inputs.location, now, state.weather_timeout).await;
    let instant = inputs.instant;

    match report_service::estimate(&*state.pipeline, inputs, &feed) {
        Ok(report) => {
            info!(
                "[ESTIMATE] {} | clear sky {:.2} kWh | weather {} | {} / {} samples covered",
                instant,
                report.day.clearsky_energy_kwh,
                report
                    .day
                    .weather_energy_kwh
                    .map(|kwh| format!("{kwh:.2} kWh"))
                    .unwrap_or_else(|| "n/a".to_string()),
                report.day.covered_samples,
                report.day.samples.len()
            );
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/shadow
/// Skyline elevation at a sun azimuth and whether that sun position is shadowed
#[utoipa::path(
    get,
    path = "/api/shadow",
    params(ShadowQuery),
    responses(
        (status = 200, description = "Profile lookup", body = ShadowResponse),
        (status = 400, description = "Malformed shadow profile", body = ErrorResponse)
    )
)]
pub async fn get_shadow(
    State(config): State<Arc<Config>>,
    Query(query): Query<ShadowQuery>,
) -> impl IntoResponse {
    let shadow = &config.defaults.shadow;
    let azimuths = query.azimuths.as_deref().unwrap_or(&shadow.azimuths);
    let elevations = query.elevations.as_deref().unwrap_or(&shadow.elevations);

    let profile = match ShadowProfile::parse(azimuths, elevations) {
        Ok(p) => p,
        Err(e) => return error_response(e),
    };

    Json(ShadowResponse {
        azimuth: query.azimuth,
        elevation: query.elevation,
        horizon_elevation: profile.elevation_at(query.azimuth),
        shadowed: profile.is_shadowed(query.azimuth, query.elevation),
    })
    .into_response()
}

/// GET /api/meter
/// Current PV production and grid exchange from the home meter
#[utoipa::path(
    get,
    path = "/api/meter",
    responses(
        (status = 200, description = "Meter reading, or `available: false` with a reason", body = MeterResponse)
    )
)]
pub async fn get_meter(State(state): State<AppState>) -> impl IntoResponse {
    let Some(meter) = state.meter.as_ref() else {
        return Json(MeterResponse {
            available: false,
            pv_power_w: None,
            grid_power_w: None,
            reason: Some("meter not configured".to_string()),
        })
        .into_response();
    };

    match meter.read().await {
        Ok(reading) => Json(MeterResponse {
            available: true,
            pv_power_w: Some(reading.pv_power_w),
            grid_power_w: Some(reading.grid_power_w),
            reason: None,
        })
        .into_response(),
        Err(e) => {
            warn!("[METER] read failed: {}", e);
            Json(MeterResponse {
                available: false,
                pv_power_w: None,
                grid_power_w: None,
                reason: Some(e.to_string()),
            })
            .into_response()
        }
    }
}
