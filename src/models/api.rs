use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{GapReason, PipelineError, PipelineResult};
use crate::models::power::SolarPosition;
use crate::models::site::{GeoLocation, PanelConfig, truncate_to_minute};
use crate::services::shadow_profile::ShadowProfile;
use crate::services::weather_series::Coverage;

// ─── Input groups (also used by the `defaults` config section) ──────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LocationParams {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    /// IANA zone, e.g. `Europe/Rome`
    pub timezone: String,
}

impl LocationParams {
    pub fn to_location(&self) -> PipelineResult<GeoLocation> {
        GeoLocation::new(self.latitude, self.longitude, self.altitude, &self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PanelParams {
    pub tilt: f64,
    pub azimuth: f64,
    /// m²
    pub area: f64,
    /// Fraction, e.g. 0.142 for 14.2 %
    pub efficiency: f64,
}

impl PanelParams {
    pub fn to_panel(&self) -> PipelineResult<PanelConfig> {
        PanelConfig::new(self.tilt, self.azimuth, self.area, self.efficiency)
    }
}

/// Horizon profile as two comma-separated lists of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShadowParams {
    pub azimuths: String,
    pub elevations: String,
}

impl ShadowParams {
    pub fn to_profile(&self) -> PipelineResult<ShadowProfile> {
        ShadowProfile::parse(&self.azimuths, &self.elevations)
    }
}

// ─── POST /api/estimate ──────────────────────────────────────────────────────

/// Estimate request. Every group left out falls back to the configured default.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EstimateParams {
    /// RFC 3339, or local `YYYY-MM-DDTHH:MM` in the location timezone. Defaults to now.
    pub datetime: Option<String>,
    pub location: Option<LocationParams>,
    pub panel: Option<PanelParams>,
    pub shadow: Option<ShadowParams>,
    /// Day series sampling step in minutes
    pub step_minutes: Option<u32>,
}

/// Resolves the requested instant, truncated to the minute.
pub fn parse_instant(text: Option<&str>, tz: Tz, now: DateTime<Utc>) -> PipelineResult<DateTime<Utc>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(truncate_to_minute(now));
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(truncate_to_minute(dt.with_timezone(&Utc)));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| PipelineError::config(format!("unrecognized datetime '{text}'")))?;
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| PipelineError::config(format!("{text} does not exist in {tz}")))?;
    Ok(truncate_to_minute(local.with_timezone(&Utc)))
}

/// Coverage of one instant, plus the case where no weather could be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeatherStatus {
    NoHistoricalData,
    Covered,
    NoForecastData,
    Unavailable,
}

impl From<Coverage> for WeatherStatus {
    fn from(c: Coverage) -> Self {
        match c {
            Coverage::NoHistoricalData => WeatherStatus::NoHistoricalData,
            Coverage::Covered => WeatherStatus::Covered,
            Coverage::NoForecastData => WeatherStatus::NoForecastData,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherReport {
    pub status: WeatherStatus,
    /// Minute of the current observation
    pub observed_at: Option<DateTime<Utc>>,
    /// Last instant forecast data can cover
    pub forecast_horizon: Option<DateTime<Utc>>,
    /// Only reported for cloud-group conditions (codes 8xx)
    pub cloud_cover: Option<f64>,
    pub weather_code: Option<u16>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    /// Why the provider could not be used
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct InstantReport {
    pub datetime: DateTime<Utc>,
    pub sun: SolarPosition,
    pub shadowed: bool,
    pub weather: WeatherReport,
    pub clearsky_power_w: f64,
    /// `null` when the instant has no weather data; see `weather_gap`
    pub weather_power_w: Option<f64>,
    pub weather_gap: Option<GapReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DaySample {
    pub time: DateTime<Utc>,
    pub clearsky_power_w: f64,
    pub weather_power_w: Option<f64>,
    pub gap: Option<GapReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DayReport {
    /// Local calendar day in the location timezone
    pub date: NaiveDate,
    pub step_minutes: u32,
    pub clearsky_energy_kwh: f64,
    /// Sum over covered samples only; `null` when none is covered
    pub weather_energy_kwh: Option<f64>,
    pub covered_samples: usize,
    pub sun_hours: f64,
    pub samples: Vec<DaySample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EstimateResponse {
    pub instant: InstantReport,
    pub day: DayReport,
}

// ─── GET /api/shadow ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShadowQuery {
    /// Sun azimuth, degrees clockwise from north
    pub azimuth: f64,
    /// Sun elevation, degrees
    pub elevation: f64,
    /// Profile azimuths; defaults to the configured profile
    pub azimuths: Option<String>,
    pub elevations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShadowResponse {
    pub azimuth: f64,
    pub elevation: f64,
    /// Skyline elevation at `azimuth`
    pub horizon_elevation: f64,
    pub shadowed: bool,
}

// ─── GET /api/defaults, GET /api/meter ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DefaultsResponse {
    pub location: LocationParams,
    pub panel: PanelParams,
    pub shadow: ShadowParams,
    pub step_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MeterResponse {
    pub available: bool,
    /// PV production, W
    pub pv_power_w: Option<f64>,
    /// Grid exchange, W (positive = export)
    pub grid_power_w: Option<f64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
