use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Why a weather-adjusted value is missing for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapReason {
    /// The instant is earlier than the current observation.
    NoHistoricalData,
    /// The instant is later than the forecast horizon.
    NoForecastData,
    /// The weather provider could not be reached or returned nothing usable.
    WeatherUnavailable,
}

impl std::fmt::Display for GapReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            GapReason::NoHistoricalData => "no historical weather data available",
            GapReason::NoForecastData => "beyond the forecast horizon",
            GapReason::WeatherUnavailable => "weather provider unavailable",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream weather data unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("No weather data for {instant}: {reason}")]
    DataGap {
        instant: DateTime<Utc>,
        reason: GapReason,
    },

    #[error("Cloud cover unavailable for the requested window")]
    WeatherUnavailable,
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }
}

/// Failures of the upstream HTTP clients (weather provider, home meter).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl From<ProviderError> for PipelineError {
    fn from(e: ProviderError) -> Self {
        PipelineError::UpstreamUnavailable(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
