//! Turns one pipeline run into the instant + day report served by the API.

use chrono::{DateTime, Utc};

use crate::error::PipelineResult;
use crate::models::api::{DayReport, DaySample, EstimateResponse, InstantReport, WeatherReport, WeatherStatus};
use crate::models::site::{GeoLocation, PanelConfig, TimeIndex};
use crate::services::pipeline::{EstimateRequest, Pipeline};
use crate::services::shadow_profile::ShadowProfile;
use crate::services::solar_algorithm::SolarEngine;
use crate::services::weather_provider::WeatherFeed;

/// Resolved inputs of one estimate call.
#[derive(Debug, Clone)]
pub struct EstimateInputs {
    pub location: GeoLocation,
    pub panel: PanelConfig,
    pub profile: ShadowProfile,
    pub step_minutes: u32,
    pub instant: DateTime<Utc>,
}

pub fn estimate<E: SolarEngine>(
    pipeline: &Pipeline<E>,
    inputs: EstimateInputs,
    feed: &WeatherFeed,
) -> PipelineResult<EstimateResponse> {
    let tz = inputs.location.timezone();
    let date = inputs.instant.with_timezone(&tz).date_naive();
    let index = TimeIndex::day(date, tz, inputs.step_minutes)?;

    let day_req = EstimateRequest {
        location: inputs.location,
        panel: inputs.panel,
        profile: inputs.profile,
        index,
    };
    let instant_req = day_req.at(inputs.instant);

    let instant = instant_report(pipeline, &instant_req, inputs.instant, feed);

    let clearsky = pipeline.clearsky_output(&day_req);
    let weather = pipeline.weather_output(&day_req, feed);
    let samples = clearsky
        .times
        .iter()
        .zip(&clearsky.watts)
        .zip(&weather.samples)
        .map(|((time, clearsky_w), sample)| DaySample {
            time: *time,
            clearsky_power_w: *clearsky_w,
            weather_power_w: sample.watts(),
            gap: sample.gap(),
        })
        .collect();

    Ok(EstimateResponse {
        instant,
        day: DayReport {
            date,
            step_minutes: inputs.step_minutes,
            clearsky_energy_kwh: clearsky.energy_kwh(),
            weather_energy_kwh: weather.energy_kwh(),
            covered_samples: weather.covered(),
            sun_hours: round2(pipeline.sun_hours(&day_req)),
            samples,
        },
    })
}

fn instant_report<E: SolarEngine>(
    pipeline: &Pipeline<E>,
    req: &EstimateRequest,
    instant: DateTime<Utc>,
    feed: &WeatherFeed,
) -> InstantReport {
    let sun = pipeline.sun_position(instant, &req.location);
    let shadowed = req.profile.is_shadowed(sun.azimuth, sun.elevation);
    let clearsky_power_w = pipeline.clearsky_output(req).watts[0];
    let weather_sample = pipeline.weather_output(req, feed).samples[0];

    InstantReport {
        datetime: instant,
        sun,
        shadowed,
        weather: weather_report(&req.index, instant, feed),
        clearsky_power_w,
        weather_power_w: weather_sample.watts(),
        weather_gap: weather_sample.gap(),
    }
}

fn weather_report(index: &TimeIndex, instant: DateTime<Utc>, feed: &WeatherFeed) -> WeatherReport {
    let series = match feed.series(index) {
        Ok(series) => series,
        Err(e) => {
            return WeatherReport {
                status: WeatherStatus::Unavailable,
                observed_at: None,
                forecast_horizon: None,
                cloud_cover: None,
                weather_code: None,
                description: None,
                icon_url: None,
                reason: Some(e.to_string()),
            };
        }
    };

    let record = series.record_at(instant);
    WeatherReport {
        status: series.coverage(instant).into(),
        observed_at: series.actual().map(|a| a.observed_at),
        forecast_horizon: series.forecast_horizon(),
        cloud_cover: record.filter(|r| r.is_cloud_group()).map(|r| r.cloud_cover),
        weather_code: record.and_then(|r| r.weather_code),
        description: record.and_then(|r| r.description.clone()),
        icon_url: record.and_then(|r| r.icon_url()),
        reason: None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GapReason;
    use crate::models::weather::{ForecastEntry, WeatherConditions, WeatherObservation};
    use crate::services::solar_algorithm::BirdClearSky;
    use chrono::{Duration, TimeZone};

    fn pipeline() -> Pipeline {
        Pipeline::new(BirdClearSky::default())
    }

    fn inputs(instant: DateTime<Utc>) -> EstimateInputs {
        EstimateInputs {
            location: GeoLocation::new(45.5, 9.19, 144.0, "Europe/Rome").unwrap(),
            panel: PanelConfig::new(5.0, 152.0, 6.25, 0.142).unwrap(),
            profile: ShadowProfile::parse("0, 151.9, 152, 209.9, 210, 287.9, 288, 360", "80, 80, 10, 10, 14, 14, 10, 10")
                .unwrap(),
            step_minutes: 15,
            instant,
        }
    }

    fn broken_clouds(cloud_cover: f64) -> WeatherConditions {
        WeatherConditions {
            cloud_cover,
            weather_code: 803,
            description: "broken clouds".to_string(),
            icon: "04d".to_string(),
        }
    }

    #[test]
    fn partial_day_keeps_clear_sky_and_marks_gaps() {
        let observed_at = Utc.with_ymd_and_hms(2025, 6, 21, 10, 0, 0).unwrap();
        let feed = WeatherFeed::Available {
            observation: WeatherObservation {
                observed_at,
                conditions: broken_clouds(70.0),
            },
            forecast: vec![ForecastEntry {
                timestamp: observed_at + Duration::hours(3),
                conditions: broken_clouds(90.0),
            }],
        };

        let report = estimate(&pipeline(), inputs(observed_at), &feed).unwrap();

        assert_eq!(report.day.samples.len(), 96);
        // Local midnight (22:00 UTC the day before) up to 10:00 UTC is history.
        assert_eq!(report.day.samples[0].gap, Some(GapReason::NoHistoricalData));
        assert_eq!(report.day.covered_samples, 96 - 48);
        let weather_kwh = report.day.weather_energy_kwh.unwrap();
        assert!(weather_kwh > 0.0 && weather_kwh < report.day.clearsky_energy_kwh);

        let instant = &report.instant;
        assert_eq!(instant.weather.status, WeatherStatus::Covered);
        assert_eq!(instant.weather.cloud_cover, Some(70.0));
        assert_eq!(
            instant.weather.icon_url.as_deref(),
            Some("https://openweathermap.org/img/wn/04d@2x.png")
        );
        assert!(instant.weather_power_w.unwrap() < instant.clearsky_power_w);
    }

    #[test]
    fn unavailable_weather_still_reports_clear_sky() {
        let at = Utc.with_ymd_and_hms(2025, 6, 21, 10, 0, 0).unwrap();
        let feed = WeatherFeed::Unavailable {
            reason: "Upstream request timed out".to_string(),
        };
        let report = estimate(&pipeline(), inputs(at), &feed).unwrap();

        assert_eq!(report.instant.weather.status, WeatherStatus::Unavailable);
        assert_eq!(report.instant.weather_gap, Some(GapReason::WeatherUnavailable));
        assert!(report.instant.clearsky_power_w > 0.0);
        assert_eq!(report.day.weather_energy_kwh, None);
        assert!(report.day.clearsky_energy_kwh > 0.0);
        assert!(report.day.sun_hours > 0.0 && report.day.sun_hours < 16.0);
    }
}
