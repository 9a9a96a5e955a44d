//! Estimation pipeline: solar geometry and clear sky from the engine, then
//! cloud/shadow adjustment, transposition and power.
//!
//! Two outputs are published for any time index:
//!  * clear-sky output: zero cloud everywhere, shadow still applied, always defined
//!  * weather output: real merged weather; instants outside its window are `Missing`
//!
//! Solar position and clear-sky irradiance are computed once per run for the
//! whole index; the weather path works on the covered slice of them.

use chrono::{DateTime, Utc};

use crate::error::{GapReason, PipelineError, PipelineResult};
use crate::models::power::{Irradiance, PowerSample, PowerSeries, SolarPosition, WeatherPowerSeries};
use crate::models::site::{GeoLocation, PanelConfig, TimeIndex};
use crate::services::irradiance_adjuster;
use crate::services::power_service;
use crate::services::shadow_profile::ShadowProfile;
use crate::services::solar_algorithm::{BirdClearSky, SolarEngine};
use crate::services::weather_provider::WeatherFeed;
use crate::services::weather_series::WeatherSeries;

/// Everything one computation needs, passed explicitly per call.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRequest {
    pub location: GeoLocation,
    pub panel: PanelConfig,
    pub profile: ShadowProfile,
    pub index: TimeIndex,
}

impl EstimateRequest {
    /// Same site and panel, reduced to a single instant.
    pub fn at(&self, instant: DateTime<Utc>) -> EstimateRequest {
        EstimateRequest {
            location: self.location.clone(),
            panel: self.panel,
            profile: self.profile.clone(),
            index: TimeIndex::single(instant),
        }
    }
}

struct SolarInputs {
    positions: Vec<SolarPosition>,
    clearsky: Vec<Irradiance>,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline<E: SolarEngine = BirdClearSky> {
    engine: E,
}

impl<E: SolarEngine> Pipeline<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn solar_inputs(&self, req: &EstimateRequest) -> SolarInputs {
        let positions = self.engine.solar_position(&req.index, &req.location);
        let clearsky = self.engine.clearsky(&req.index, &req.location);
        assert_eq!(positions.len(), req.index.len(), "engine returned misaligned solar positions");
        assert_eq!(clearsky.len(), req.index.len(), "engine returned misaligned clear-sky series");
        SolarInputs {
            positions,
            clearsky,
        }
    }

    pub fn sun_position(&self, instant: DateTime<Utc>, location: &GeoLocation) -> SolarPosition {
        let positions = self.engine.solar_position(&TimeIndex::single(instant), location);
        assert_eq!(positions.len(), 1, "engine returned misaligned solar positions");
        positions[0]
    }

    pub fn is_shadowed(&self, instant: DateTime<Utc>, location: &GeoLocation, profile: &ShadowProfile) -> bool {
        let pos = self.sun_position(instant, location);
        profile.is_shadowed(pos.azimuth, pos.elevation)
    }

    /// Power with cloud cover forced to zero. Never depends on weather.
    pub fn clearsky_output(&self, req: &EstimateRequest) -> PowerSeries {
        let inputs = self.solar_inputs(req);
        let zero_cloud = WeatherSeries::clear_sky(&req.index).cloud_cover();

        let adjusted = irradiance_adjuster::adjust_aligned(
            &req.index,
            &inputs.clearsky,
            &zero_cloud,
            &inputs.positions,
            &req.profile,
        );
        let poa = self
            .engine
            .total_irradiance(&req.panel, &adjusted, &inputs.positions);

        PowerSeries {
            times: req.index.instants().to_vec(),
            watts: power_service::power(&poa, &req.panel),
            step_minutes: req.index.step_minutes(),
        }
    }

    /// Weather-adjusted power. Fails soft: every instant without weather data
    /// carries its gap reason instead of a value.
    pub fn weather_output(&self, req: &EstimateRequest, feed: &WeatherFeed) -> WeatherPowerSeries {
        match feed.series(&req.index) {
            Ok(series) => self.weather_from_series(req, &series),
            Err(_) => self.all_missing(req, GapReason::WeatherUnavailable),
        }
    }

    /// Weather-adjusted power at one instant. A gap is an error here since
    /// there is no series to carry it.
    pub fn weather_output_at(
        &self,
        req: &EstimateRequest,
        feed: &WeatherFeed,
        instant: DateTime<Utc>,
    ) -> PipelineResult<f64> {
        let single = req.at(instant);
        let series = feed.series(&single.index)?;
        match self.weather_from_series(&single, &series).samples[0] {
            PowerSample::Watts(w) => Ok(w),
            PowerSample::Missing(reason) => Err(PipelineError::DataGap { instant, reason }),
        }
    }

    pub fn clearsky_output_at(&self, req: &EstimateRequest, instant: DateTime<Utc>) -> f64 {
        self.clearsky_output(&req.at(instant)).watts[0]
    }

    /// Hours in the index with the sun above the horizon and clear of the skyline.
    pub fn sun_hours(&self, req: &EstimateRequest) -> f64 {
        let positions = self.engine.solar_position(&req.index, &req.location);
        let visible: Vec<bool> = positions
            .iter()
            .map(|p| p.elevation > 0.0 && !req.profile.is_shadowed(p.azimuth, p.elevation))
            .collect();
        power_service::sun_hours(&visible, req.index.step_minutes())
    }

    fn weather_from_series(&self, req: &EstimateRequest, series: &WeatherSeries) -> WeatherPowerSeries {
        let gap_of = |t: DateTime<Utc>| series.coverage(t).gap().unwrap_or(GapReason::WeatherUnavailable);

        let covered = series
            .valid_range()
            .and_then(|(first, last)| Some((req.index.position(first)?, req.index.position(last)?)));
        let Some((start, end)) = covered else {
            return WeatherPowerSeries {
                times: req.index.instants().to_vec(),
                samples: req
                    .index
                    .instants()
                    .iter()
                    .map(|t| PowerSample::Missing(gap_of(*t)))
                    .collect(),
                step_minutes: req.index.step_minutes(),
            };
        };

        let inputs = self.solar_inputs(req);
        let window = req.index.slice(start..=end);
        let positions = &inputs.positions[start..=end];

        let adjusted = match irradiance_adjuster::adjust(
            &window,
            &inputs.clearsky[start..=end],
            &series.cloud_cover(),
            positions,
            &req.profile,
        ) {
            Ok(adjusted) => adjusted,
            Err(_) => return self.all_missing(req, GapReason::WeatherUnavailable),
        };
        let poa = self.engine.total_irradiance(&req.panel, &adjusted, positions);
        let watts = power_service::power(&poa, &req.panel);

        let samples = req
            .index
            .instants()
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if (start..=end).contains(&i) {
                    PowerSample::Watts(watts[i - start])
                } else {
                    PowerSample::Missing(gap_of(*t))
                }
            })
            .collect();

        WeatherPowerSeries {
            times: req.index.instants().to_vec(),
            samples,
            step_minutes: req.index.step_minutes(),
        }
    }

    fn all_missing(&self, req: &EstimateRequest, reason: GapReason) -> WeatherPowerSeries {
        WeatherPowerSeries {
            times: req.index.instants().to_vec(),
            samples: vec![PowerSample::Missing(reason); req.index.len()],
            step_minutes: req.index.step_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::weather::{ForecastEntry, WeatherConditions, WeatherObservation};
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, TimeZone};
    use std::cell::Cell;

    /// Sun fixed due south at 40°, constant clear sky; POA equals GHI.
    #[derive(Default)]
    struct FlatEngine {
        position_calls: Cell<usize>,
    }

    impl SolarEngine for FlatEngine {
        fn solar_position(&self, index: &TimeIndex, _location: &GeoLocation) -> Vec<SolarPosition> {
            self.position_calls.set(self.position_calls.get() + 1);
            vec![
                SolarPosition {
                    azimuth: 180.0,
                    elevation: 40.0,
                    apparent_elevation: 40.0,
                    apparent_zenith: 50.0,
                };
                index.len()
            ]
        }

        fn clearsky(&self, index: &TimeIndex, _location: &GeoLocation) -> Vec<Irradiance> {
            vec![
                Irradiance {
                    dni: 800.0,
                    ghi: 600.0,
                    dhi: 86.0,
                };
                index.len()
            ]
        }

        fn total_irradiance(&self, _panel: &PanelConfig, irradiance: &[Irradiance], _positions: &[SolarPosition]) -> Vec<f64> {
            irradiance.iter().map(|i| i.ghi).collect()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 21, 10, 0, 0).unwrap()
    }

    fn conditions(cloud_cover: f64) -> WeatherConditions {
        WeatherConditions {
            cloud_cover,
            weather_code: 802,
            description: "scattered clouds".to_string(),
            icon: "03d".to_string(),
        }
    }

    fn feed() -> WeatherFeed {
        WeatherFeed::Available {
            observation: WeatherObservation {
                observed_at: now(),
                conditions: conditions(40.0),
            },
            forecast: vec![ForecastEntry {
                timestamp: now() + Duration::hours(3),
                conditions: conditions(40.0),
            }],
        }
    }

    fn request(index: TimeIndex, profile: ShadowProfile) -> EstimateRequest {
        EstimateRequest {
            location: GeoLocation::new(45.5, 9.19, 144.0, "Europe/Rome").unwrap(),
            panel: PanelConfig::new(5.0, 152.0, 10.0, 0.1).unwrap(),
            profile,
            index,
        }
    }

    fn open_horizon() -> ShadowProfile {
        ShadowProfile::new(vec![(0.0, -10.0), (360.0, -10.0)]).unwrap()
    }

    fn minutes(from: DateTime<Utc>, count: i64) -> TimeIndex {
        TimeIndex::from_instants((0..count).map(|i| from + Duration::minutes(i)).collect()).unwrap()
    }

    #[test]
    fn clearsky_ignores_weather_entirely() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(minutes(now() - Duration::days(30), 3), open_horizon());
        let out = pipeline.clearsky_output(&req);
        // 600 W/m² × 10 m² × 0.1
        assert_eq!(out.watts, vec![600.0; 3]);
        assert_relative_eq!(out.energy_kwh(), 0.03, epsilon = 1e-12);
    }

    #[test]
    fn solar_inputs_are_computed_once_per_run() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(minutes(now() - Duration::minutes(5), 20), open_horizon());
        pipeline.weather_output(&req, &feed());
        assert_eq!(pipeline.engine().position_calls.get(), 1);
    }

    #[test]
    fn weather_output_marks_instants_outside_the_window() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(minutes(now() - Duration::minutes(2), 5), open_horizon());
        let out = pipeline.weather_output(&req, &feed());

        assert_eq!(out.samples[0], PowerSample::Missing(GapReason::NoHistoricalData));
        assert_eq!(out.samples[1], PowerSample::Missing(GapReason::NoHistoricalData));
        // ghi × (1 − 0.75 × 0.4) = 420 W/m²
        for sample in &out.samples[2..] {
            assert_relative_eq!(sample.watts().unwrap(), 420.0, epsilon = 1e-9);
        }
        assert_eq!(out.covered(), 3);
    }

    #[test]
    fn unavailable_feed_never_falls_back_to_clear_sky() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(minutes(now(), 4), open_horizon());
        let feed = WeatherFeed::Unavailable {
            reason: "timed out".to_string(),
        };
        let out = pipeline.weather_output(&req, &feed);
        assert!(out
            .samples
            .iter()
            .all(|s| *s == PowerSample::Missing(GapReason::WeatherUnavailable)));
        assert_eq!(out.energy_kwh(), None);

        let err = pipeline.weather_output_at(&req, &feed, now()).unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable(_)));
        assert_eq!(pipeline.clearsky_output_at(&req, now()), 600.0);
    }

    #[test]
    fn six_days_ahead_is_a_data_gap() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(TimeIndex::single(now()), open_horizon());
        let far = now() + Duration::days(6);
        match pipeline.weather_output_at(&req, &feed(), far) {
            Err(PipelineError::DataGap { instant, reason }) => {
                assert_eq!(instant, far);
                assert_eq!(reason, GapReason::NoForecastData);
            }
            other => panic!("expected a data gap, got {other:?}"),
        }
    }

    #[test]
    fn shadow_only_removes_the_beam() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let wall = ShadowProfile::new(vec![(0.0, 60.0), (360.0, 60.0)]).unwrap();
        assert!(pipeline.is_shadowed(now(), &request(TimeIndex::single(now()), wall.clone()).location, &wall));

        // POA here is GHI, which the shadow does not touch.
        let out = pipeline.clearsky_output(&request(TimeIndex::single(now()), wall));
        assert_eq!(out.watts, vec![600.0]);
    }

    #[test]
    fn sun_hours_skip_shadowed_samples() {
        let pipeline = Pipeline::new(FlatEngine::default());
        let req = request(minutes(now(), 90), open_horizon());
        assert_relative_eq!(pipeline.sun_hours(&req), 1.5);

        let wall = ShadowProfile::new(vec![(0.0, 60.0), (360.0, 60.0)]).unwrap();
        assert_eq!(pipeline.sun_hours(&request(minutes(now(), 90), wall)), 0.0);
    }

    #[test]
    fn clearsky_energy_matches_raw_poa_integral() {
        let engine = BirdClearSky::default();
        let pipeline = Pipeline::new(engine);
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let req = request(TimeIndex::day(date, chrono_tz::Europe::Rome, 1).unwrap(), open_horizon());

        let positions = engine.solar_position(&req.index, &req.location);
        let clearsky = engine.clearsky(&req.index, &req.location);
        let poa = engine.total_irradiance(&req.panel, &clearsky, &positions);
        let raw_kwh: f64 = poa.iter().map(|g| g * 10.0 * 0.1).sum::<f64>() / 60.0 / 1000.0;

        let out = pipeline.clearsky_output(&req);
        assert!(raw_kwh > 1.0);
        assert_relative_eq!(out.energy_kwh(), raw_kwh, max_relative = 1e-9);
    }

    #[test]
    fn weather_dni_never_exceeds_clear_sky() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let engine = BirdClearSky::default();
        let index = TimeIndex::day(date, chrono_tz::Europe::Rome, 10).unwrap();
        let location = GeoLocation::new(45.5, 9.19, 144.0, "Europe/Rome").unwrap();
        let positions = engine.solar_position(&index, &location);
        let clearsky = engine.clearsky(&index, &location);
        let profile = ShadowProfile::parse("0, 151.9, 152, 209.9, 210, 287.9, 288, 360", "80, 80, 10, 10, 14, 14, 10, 10").unwrap();

        for cloud in [0.0, 35.0, 100.0] {
            let adjusted = irradiance_adjuster::adjust(&index, &clearsky, &vec![cloud; index.len()], &positions, &profile).unwrap();
            for (a, c) in adjusted.iter().zip(&clearsky) {
                assert!(a.dni <= c.dni);
            }
        }
    }
}
