use serde::Deserialize;

use crate::models::api::{DefaultsResponse, LocationParams, PanelParams, ShadowParams};

fn default_port() -> u16 { 8080 }
fn default_weather_url() -> String { "https://api.openweathermap.org/data/2.5".to_string() }
fn default_timeout_s() -> u64 { 10 }
fn default_meter_url() -> String { "https://shelly-50-eu.shelly.cloud".to_string() }
fn default_step_minutes() -> u32 { 1 }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Home meter; the endpoint reports "unavailable" when absent.
    #[serde(default)]
    pub meter: Option<MeterConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_url")]
    pub base_url: String,
    /// Overridden by `OPENWEATHER_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: default_weather_url(),
            api_key: None,
            timeout_s: default_timeout_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MeterConfig {
    #[serde(default = "default_meter_url")]
    pub base_url: String,
    /// Overridden by `SHELLY_AUTH_KEY`
    #[serde(default)]
    pub auth_key: String,
    /// Overridden by `SHELLY_DEVICE_ID`
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    pub location: LocationParams,
    pub panel: PanelParams,
    pub shadow: ShadowParams,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            location: LocationParams {
                latitude: 45.5,
                longitude: 9.19,
                altitude: 144.0,
                timezone: "Europe/Rome".to_string(),
            },
            panel: PanelParams {
                tilt: 5.0,
                azimuth: 152.0,
                area: 6.25,
                efficiency: 0.142,
            },
            shadow: ShadowParams {
                azimuths: "0, 151.9, 152, 209.9, 210, 287.9, 288, 360".to_string(),
                elevations: "80, 80, 10, 10, 14, 14, 10, 10".to_string(),
            },
            step_minutes: default_step_minutes(),
        }
    }
}

impl DefaultsConfig {
    pub fn to_response(&self) -> DefaultsResponse {
        DefaultsResponse {
            location: self.location.clone(),
            panel: self.panel.clone(),
            shadow: self.shadow.clone(),
            step_minutes: self.step_minutes,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Secrets may live in the environment instead of the file.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("OPENWEATHER_API_KEY").filter(|k| !k.is_empty()) {
            self.weather.api_key = Some(key);
        }
        let auth_key = var("SHELLY_AUTH_KEY").filter(|k| !k.is_empty());
        let device_id = var("SHELLY_DEVICE_ID").filter(|k| !k.is_empty());
        if auth_key.is_some() || device_id.is_some() {
            let meter = self.meter.get_or_insert_with(|| MeterConfig {
                base_url: default_meter_url(),
                auth_key: String::new(),
                device_id: String::new(),
            });
            if let Some(key) = auth_key {
                meter.auth_key = key;
            }
            if let Some(id) = device_id {
                meter.device_id = id;
            }
        }
    }

    /// Defaults go through the same constructors as request overrides.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.defaults.location.to_location()?;
        self.defaults.panel.to_panel()?;
        self.defaults.shadow.to_profile()?;
        if self.defaults.step_minutes == 0 {
            return Err("defaults.step_minutes must be at least 1".into());
        }
        Ok(())
    }
}
