use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ─── Domain records ──────────────────────────────────────────────────────────

/// Cloud and condition fields shared by observations and forecast entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherConditions {
    /// Cloud cover percentage (0 … 100)
    pub cloud_cover: f64,
    pub weather_code: u16,
    pub description: String,
    pub icon: String,
}

/// Instantaneous "actual" observation, stamped with the minute it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherObservation {
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub conditions: WeatherConditions,
}

/// One point of the coarse (~3 h) forecast grid.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ForecastEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub conditions: WeatherConditions,
}

/// Merged per-instant value. Categorical fields stay unset until the first
/// known condition has been seen.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WeatherRecord {
    pub cloud_cover: f64,
    pub weather_code: Option<u16>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl WeatherRecord {
    /// Clouds group of the OpenWeather condition table (801 … 804, plus 800 clear).
    pub fn is_cloud_group(&self) -> bool {
        self.weather_code.is_some_and(|code| code / 100 == 8)
    }

    pub fn icon_url(&self) -> Option<String> {
        self.icon
            .as_ref()
            .map(|icon| format!("https://openweathermap.org/img/wn/{icon}@2x.png"))
    }
}

// ─── OpenWeather wire types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OwCurrentResponse {
    pub clouds: OwClouds,
    pub weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwForecastResponse {
    pub list: Vec<OwForecastItem>,
}

#[derive(Debug, Deserialize)]
pub struct OwForecastItem {
    /// Unix seconds, UTC
    pub dt: i64,
    pub clouds: OwClouds,
    pub weather: Vec<OwCondition>,
}

#[derive(Debug, Deserialize)]
pub struct OwClouds {
    pub all: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwCondition {
    pub id: u16,
    pub description: String,
    pub icon: String,
}

impl OwCondition {
    pub fn into_conditions(self, cloud_cover: f64) -> WeatherConditions {
        WeatherConditions {
            cloud_cover,
            weather_code: self.id,
            description: self.description,
            icon: self.icon,
        }
    }
}
