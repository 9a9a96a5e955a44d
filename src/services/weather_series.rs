//! Aligns one "actual" observation and the coarse forecast grid onto an
//! arbitrary time index.
//!
//! Merge rules:
//!  1. the target index is restricted to `[observation minute, observation + 5 days]`
//!  2. observation and forecast rows are merged by timestamp (observation wins on ties)
//!  3. cloud cover is interpolated linearly in time, held flat past either end
//!  4. weather code / description / icon are forward-filled only
//!  5. the result is reindexed onto the restricted target instants

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GapReason;
use crate::models::site::TimeIndex;
use crate::models::weather::{ForecastEntry, WeatherConditions, WeatherObservation, WeatherRecord};

pub const FORECAST_HORIZON_DAYS: i64 = 5;

/// Where an instant sits relative to the weather data window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coverage {
    NoHistoricalData,
    Covered,
    NoForecastData,
}

impl Coverage {
    /// Gap reported for an instant in this state; `None` when covered.
    pub fn gap(self) -> Option<GapReason> {
        match self {
            Coverage::NoHistoricalData => Some(GapReason::NoHistoricalData),
            Coverage::Covered => None,
            Coverage::NoForecastData => Some(GapReason::NoForecastData),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSeries {
    times: Vec<DateTime<Utc>>,
    records: Vec<WeatherRecord>,
    actual: Option<WeatherObservation>,
}

#[derive(Debug, Default, Clone)]
struct MergeRow {
    cloud_cover: Option<f64>,
    conditions: Option<WeatherConditions>,
}

impl WeatherSeries {
    pub fn build(target: &TimeIndex, actual: &WeatherObservation, forecast: &[ForecastEntry]) -> Self {
        let window_start = actual.observed_at;
        let window_end = window_start + Duration::days(FORECAST_HORIZON_DAYS);

        let restricted: Vec<DateTime<Utc>> = target
            .instants()
            .iter()
            .copied()
            .filter(|t| *t >= window_start && *t <= window_end)
            .collect();

        if restricted.is_empty() {
            return Self {
                times: Vec::new(),
                records: Vec::new(),
                actual: Some(actual.clone()),
            };
        }

        let mut table: BTreeMap<DateTime<Utc>, MergeRow> =
            restricted.iter().map(|t| (*t, MergeRow::default())).collect();

        let seed = table.entry(actual.observed_at).or_default();
        seed.cloud_cover = Some(actual.conditions.cloud_cover);
        seed.conditions = Some(actual.conditions.clone());

        for entry in forecast {
            let row = table.entry(entry.timestamp).or_default();
            if row.cloud_cover.is_none() && entry.conditions.cloud_cover.is_finite() {
                row.cloud_cover = Some(entry.conditions.cloud_cover);
            }
            if row.conditions.is_none() {
                row.conditions = Some(entry.conditions.clone());
            }
        }

        let known: Vec<(DateTime<Utc>, f64)> = table
            .iter()
            .filter_map(|(t, row)| row.cloud_cover.map(|c| (*t, c)))
            .collect();

        let mut merged: BTreeMap<DateTime<Utc>, WeatherRecord> = BTreeMap::new();
        let mut held: Option<WeatherConditions> = None;
        for (t, row) in &table {
            if let Some(conditions) = &row.conditions {
                held = Some(conditions.clone());
            }
            merged.insert(
                *t,
                WeatherRecord {
                    cloud_cover: interpolate_in_time(&known, *t),
                    weather_code: held.as_ref().map(|c| c.weather_code),
                    description: held.as_ref().map(|c| c.description.clone()),
                    icon: held.as_ref().map(|c| c.icon.clone()),
                },
            );
        }

        let records = restricted
            .iter()
            .filter_map(|t| merged.remove(t))
            .collect();

        Self {
            times: restricted,
            records,
            actual: Some(actual.clone()),
        }
    }

    /// Zero cloud cover at every instant of `target`; only the clear-sky path uses this.
    pub fn clear_sky(target: &TimeIndex) -> Self {
        let records = target
            .instants()
            .iter()
            .map(|_| WeatherRecord {
                cloud_cover: 0.0,
                weather_code: None,
                description: None,
                icon: None,
            })
            .collect();
        Self {
            times: target.instants().to_vec(),
            records,
            actual: None,
        }
    }

    /// No instant of the requested index has weather data.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn cloud_cover(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.cloud_cover).collect()
    }

    pub fn actual(&self) -> Option<&WeatherObservation> {
        self.actual.as_ref()
    }

    /// `[first_valid, last_valid]` of the requested index.
    pub fn valid_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((*self.times.first()?, *self.times.last()?))
    }

    pub fn forecast_horizon(&self) -> Option<DateTime<Utc>> {
        self.actual
            .as_ref()
            .map(|a| a.observed_at + Duration::days(FORECAST_HORIZON_DAYS))
    }

    pub fn record_at(&self, instant: DateTime<Utc>) -> Option<&WeatherRecord> {
        self.times
            .binary_search(&instant)
            .ok()
            .map(|i| &self.records[i])
    }

    pub fn coverage(&self, instant: DateTime<Utc>) -> Coverage {
        match self.valid_range() {
            Some((first, last)) => {
                if instant < first {
                    Coverage::NoHistoricalData
                } else if instant > last {
                    Coverage::NoForecastData
                } else {
                    Coverage::Covered
                }
            }
            None => match &self.actual {
                Some(actual) if instant < actual.observed_at => Coverage::NoHistoricalData,
                _ => Coverage::NoForecastData,
            },
        }
    }
}

/// Time-weighted linear interpolation over sorted `known` points, holding the
/// end values flat outside them. `known` is never empty here: the observation
/// always contributes one point.
fn interpolate_in_time(known: &[(DateTime<Utc>, f64)], t: DateTime<Utc>) -> f64 {
    let hi = known.partition_point(|(kt, _)| *kt < t);
    if hi < known.len() && known[hi].0 == t {
        return known[hi].1;
    }
    if hi == 0 {
        return known.first().map(|k| k.1).unwrap_or(0.0);
    }
    if hi == known.len() {
        return known[hi - 1].1;
    }
    let (t1, v1) = known[hi - 1];
    let (t2, v2) = known[hi];
    let span = (t2 - t1).num_milliseconds() as f64;
    let offset = (t - t1).num_milliseconds() as f64;
    v1 + (v2 - v1) * offset / span
}
