use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult, ProviderError};
use crate::models::site::{GeoLocation, TimeIndex, truncate_to_minute};
use crate::models::weather::{
    ForecastEntry, OwCurrentResponse, OwForecastResponse, WeatherConditions, WeatherObservation,
};
use crate::services::weather_series::WeatherSeries;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Source of the current observation and the ~3 h forecast grid.
pub trait WeatherProvider: Send + Sync {
    fn fetch_current_weather(&self, lat: f64, lon: f64) -> ProviderFuture<'_, WeatherConditions>;

    /// Ordered by timestamp, up to five days ahead.
    fn fetch_weather_forecast(&self, lat: f64, lon: f64) -> ProviderFuture<'_, Vec<ForecastEntry>>;
}

// ─── Fetched payload ─────────────────────────────────────────

/// Raw result of one fetch cycle, reusable for any time index.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherFeed {
    Available {
        observation: WeatherObservation,
        forecast: Vec<ForecastEntry>,
    },
    Unavailable {
        reason: String,
    },
}

impl WeatherFeed {
    /// Merged series on `target`; an unavailable feed stays an error, never clear sky.
    pub fn series(&self, target: &TimeIndex) -> PipelineResult<WeatherSeries> {
        match self {
            WeatherFeed::Available {
                observation,
                forecast,
            } => Ok(WeatherSeries::build(target, observation, forecast)),
            WeatherFeed::Unavailable { reason } => {
                Err(PipelineError::UpstreamUnavailable(reason.clone()))
            }
        }
    }

    pub fn observation(&self) -> Option<&WeatherObservation> {
        match self {
            WeatherFeed::Available { observation, .. } => Some(observation),
            WeatherFeed::Unavailable { .. } => None,
        }
    }
}

/// Issues the two upstream calls (observation + forecast), each bounded by
/// `timeout`. Any failure degrades to `WeatherFeed::Unavailable`.
pub async fn fetch_weather(
    provider: &dyn WeatherProvider,
    location: &GeoLocation,
    now: DateTime<Utc>,
    timeout: Duration,
) -> WeatherFeed {
    let (lat, lon) = (location.latitude(), location.longitude());

    let (current, forecast) = tokio::join!(
        with_timeout(timeout, provider.fetch_current_weather(lat, lon)),
        with_timeout(timeout, provider.fetch_weather_forecast(lat, lon)),
    );

    match (current, forecast) {
        (Ok(conditions), Ok(mut forecast)) => {
            forecast.sort_by_key(|entry| entry.timestamp);
            debug!(
                "[WEATHER] lat={} lon={} cloud={}% forecast_points={}",
                lat,
                lon,
                conditions.cloud_cover,
                forecast.len()
            );
            WeatherFeed::Available {
                observation: WeatherObservation {
                    observed_at: truncate_to_minute(now),
                    conditions,
                },
                forecast,
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!("[WEATHER] provider unavailable for lat={} lon={}: {}", lat, lon, e);
            WeatherFeed::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}

async fn with_timeout<T>(timeout: Duration, fut: ProviderFuture<'_, T>) -> Result<T, ProviderError> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ProviderError::Timeout)?
}

// ─── OpenWeather client ──────────────────────────────────────

#[derive(Clone)]
pub struct OpenWeatherClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Initializing OpenWeather client: {}", base_url);
        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    fn url(&self, endpoint: &str, lat: f64, lon: f64) -> Result<String, ProviderError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredentials("OpenWeather API key not configured".to_string())
        })?;
        Ok(format!(
            "{}/{}?lat={}&lon={}&appid={}&units=metric",
            self.base_url, endpoint, lat, lon, key
        ))
    }

    async fn current(&self, lat: f64, lon: f64) -> Result<WeatherConditions, ProviderError> {
        let url = self.url("weather", lat, lon)?;
        let resp: OwCurrentResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let cloud_cover = resp.clouds.all;
        let condition = resp
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("current weather without conditions".to_string()))?;
        Ok(condition.into_conditions(cloud_cover))
    }

    async fn forecast(&self, lat: f64, lon: f64) -> Result<Vec<ForecastEntry>, ProviderError> {
        let url = self.url("forecast", lat, lon)?;
        let resp: OwForecastResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.list
            .into_iter()
            .map(|item| {
                let timestamp = DateTime::from_timestamp(item.dt, 0).ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("forecast timestamp {} out of range", item.dt))
                })?;
                let condition = item.weather.into_iter().next().ok_or_else(|| {
                    ProviderError::InvalidResponse(format!("forecast entry {} without conditions", item.dt))
                })?;
                Ok(ForecastEntry {
                    timestamp,
                    conditions: condition.into_conditions(item.clouds.all),
                })
            })
            .collect()
    }
}

impl WeatherProvider for OpenWeatherClient {
    fn fetch_current_weather(&self, lat: f64, lon: f64) -> ProviderFuture<'_, WeatherConditions> {
        Box::pin(self.current(lat, lon))
    }

    fn fetch_weather_forecast(&self, lat: f64, lon: f64) -> ProviderFuture<'_, Vec<ForecastEntry>> {
        Box::pin(self.forecast(lat, lon))
    }
}
