use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use crate::config::Config;
use crate::error::ProviderError;
use crate::services::meter_client::MeterClient;
use crate::services::pipeline::Pipeline;
use crate::services::weather_provider::{OpenWeatherClient, WeatherProvider};

/// Read-only per-process handles. Request data never lives here.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub weather: Arc<dyn WeatherProvider>,
    pub weather_timeout: Duration,
    pub meter: Option<Arc<MeterClient>>,
}

impl AppState {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        weather_timeout: Duration,
        meter: Option<MeterClient>,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::default()),
            weather,
            weather_timeout,
            meter: meter.map(Arc::new),
        }
    }

    /// Real upstream clients from the configuration. A meter with missing
    /// credentials is left out rather than failing startup.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(config.weather.timeout_s);
        let weather = OpenWeatherClient::new(
            config.weather.base_url.clone(),
            config.weather.api_key.clone(),
            timeout,
        )?;
        let meter = match &config.meter {
            Some(m) => match MeterClient::new(m.base_url.clone(), m.auth_key.clone(), m.device_id.clone(), timeout) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!("[METER] disabled: {}", e);
                    None
                }
            },
            None => None,
        };
        Ok(Self::new(Arc::new(weather), timeout, meter))
    }
}

/// Router state. Handlers extract `State<AppState>` and/or `State<Arc<Config>>`
/// via `FromRef<SharedState>`.
#[derive(Clone)]
pub struct SharedState {
    pub app: AppState,
    pub config: Arc<Config>,
}

impl SharedState {
    pub fn new(app: AppState, config: Config) -> Self {
        Self {
            app,
            config: Arc::new(config),
        }
    }
}

impl FromRef<SharedState> for AppState {
    fn from_ref(state: &SharedState) -> Self {
        state.app.clone()
    }
}

impl FromRef<SharedState> for Arc<Config> {
    fn from_ref(state: &SharedState) -> Self {
        state.config.clone()
    }
}
