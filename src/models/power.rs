use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GapReason;
use crate::services::power_service;

// ─── Solar geometry ──────────────────────────────────────────────────────────

/// Sun position for one instant, degrees. Azimuth is clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SolarPosition {
    pub azimuth: f64,
    /// Geometric elevation, no refraction
    pub elevation: f64,
    pub apparent_elevation: f64,
    pub apparent_zenith: f64,
}

// ─── Irradiance ──────────────────────────────────────────────────────────────

/// DNI / GHI / DHI triple in W/m².
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, ToSchema)]
pub struct Irradiance {
    pub dni: f64,
    pub ghi: f64,
    pub dhi: f64,
}

impl Irradiance {
    pub const DARK: Irradiance = Irradiance {
        dni: 0.0,
        ghi: 0.0,
        dhi: 0.0,
    };
}

// ─── Power ───────────────────────────────────────────────────────────────────

/// Clear-sky power per instant (W). Always fully defined.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSeries {
    pub times: Vec<DateTime<Utc>>,
    pub watts: Vec<f64>,
    pub step_minutes: f64,
}

impl PowerSeries {
    pub fn energy_kwh(&self) -> f64 {
        power_service::energy(&self.watts, self.step_minutes)
    }

    pub fn at(&self, instant: DateTime<Utc>) -> Option<f64> {
        self.times
            .binary_search(&instant)
            .ok()
            .map(|i| self.watts[i])
    }
}

/// Weather-adjusted power for one instant: a value, or the reason it has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerSample {
    Watts(f64),
    Missing(GapReason),
}

impl PowerSample {
    pub fn watts(&self) -> Option<f64> {
        match self {
            PowerSample::Watts(w) => Some(*w),
            PowerSample::Missing(_) => None,
        }
    }

    pub fn gap(&self) -> Option<GapReason> {
        match self {
            PowerSample::Watts(_) => None,
            PowerSample::Missing(reason) => Some(*reason),
        }
    }
}

/// Weather-adjusted power series; instants outside weather coverage are `Missing`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPowerSeries {
    pub times: Vec<DateTime<Utc>>,
    pub samples: Vec<PowerSample>,
    pub step_minutes: f64,
}

impl WeatherPowerSeries {
    pub fn covered(&self) -> usize {
        self.samples.iter().filter(|s| s.watts().is_some()).count()
    }

    /// Energy over covered samples only; `None` when nothing is covered.
    pub fn energy_kwh(&self) -> Option<f64> {
        let watts: Vec<f64> = self.samples.iter().filter_map(PowerSample::watts).collect();
        if watts.is_empty() {
            return None;
        }
        Some(power_service::energy(&watts, self.step_minutes))
    }

    pub fn at(&self, instant: DateTime<Utc>) -> Option<PowerSample> {
        self.times
            .binary_search(&instant)
            .ok()
            .map(|i| self.samples[i])
    }
}
