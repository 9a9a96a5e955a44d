use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{PipelineError, PipelineResult};

// ─── Location ────────────────────────────────────────────────────────────────

/// Geographic site the estimate is computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    timezone: Tz,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timezone: &str) -> PipelineResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(PipelineError::config(format!(
                "latitude must be within -90..90, got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(PipelineError::config(format!(
                "longitude must be within -180..180, got {longitude}"
            )));
        }
        if !altitude.is_finite() {
            return Err(PipelineError::config("altitude must be a finite number"));
        }
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| PipelineError::config(format!("unknown timezone '{timezone}'")))?;

        Ok(Self {
            latitude,
            longitude,
            altitude,
            timezone,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

// ─── Panel ───────────────────────────────────────────────────────────────────

/// Fixed-tilt panel geometry and conversion efficiency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelConfig {
    tilt: f64,
    azimuth: f64,
    area: f64,
    efficiency: f64,
}

impl PanelConfig {
    /// * `tilt` – degrees from horizontal (0 … 90)
    /// * `azimuth` – degrees clockwise from north (0 … 360)
    /// * `area` – m², strictly positive
    /// * `efficiency` – fraction (0 … 1), not percent
    pub fn new(tilt: f64, azimuth: f64, area: f64, efficiency: f64) -> PipelineResult<Self> {
        if !(0.0..=90.0).contains(&tilt) {
            return Err(PipelineError::config(format!("panel tilt must be within 0..90°, got {tilt}")));
        }
        if !(0.0..=360.0).contains(&azimuth) {
            return Err(PipelineError::config(format!(
                "panel azimuth must be within 0..360°, got {azimuth}"
            )));
        }
        if !(area.is_finite() && area > 0.0) {
            return Err(PipelineError::config(format!("panel area must be > 0 m², got {area}")));
        }
        if !(0.0..=1.0).contains(&efficiency) {
            return Err(PipelineError::config(format!(
                "panel efficiency must be a fraction within 0..1, got {efficiency}"
            )));
        }
        Ok(Self {
            tilt,
            azimuth,
            area,
            efficiency,
        })
    }

    pub fn tilt(&self) -> f64 {
        self.tilt
    }

    pub fn azimuth(&self) -> f64 {
        self.azimuth
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }
}

// ─── Time index ──────────────────────────────────────────────────────────────

/// Strictly increasing sequence of instants, optionally on a fixed step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    instants: Vec<DateTime<Utc>>,
    step: Option<Duration>,
}

impl TimeIndex {
    /// One-element index for instant queries.
    pub fn single(instant: DateTime<Utc>) -> Self {
        Self {
            instants: vec![instant],
            step: None,
        }
    }

    /// Arbitrary instants; rejected unless strictly increasing.
    pub fn from_instants(instants: Vec<DateTime<Utc>>) -> PipelineResult<Self> {
        if instants.windows(2).any(|w| w[1] <= w[0]) {
            return Err(PipelineError::config("time index must be strictly increasing"));
        }
        Ok(Self { instants, step: None })
    }

    /// Local calendar day `[midnight, next midnight)` in `tz`, sampled every `step_minutes`.
    pub fn day(date: NaiveDate, tz: Tz, step_minutes: u32) -> PipelineResult<Self> {
        if step_minutes == 0 || step_minutes > 24 * 60 {
            return Err(PipelineError::config(format!(
                "sampling step must be within 1..1440 minutes, got {step_minutes}"
            )));
        }
        let start = local_midnight(date, tz)?;
        let next_day = date
            .succ_opt()
            .ok_or_else(|| PipelineError::config(format!("no day after {date}")))?;
        let end = local_midnight(next_day, tz)?;

        let step = Duration::minutes(i64::from(step_minutes));
        let mut instants = Vec::with_capacity(((end - start).num_minutes() / step.num_minutes()) as usize);
        let mut t = start;
        while t < end {
            instants.push(t);
            t += step;
        }

        Ok(Self {
            instants,
            step: Some(step),
        })
    }

    pub fn instants(&self) -> &[DateTime<Utc>] {
        &self.instants
    }

    pub fn step(&self) -> Option<Duration> {
        self.step
    }

    /// Step in minutes; a singleton or irregular index counts as one minute.
    pub fn step_minutes(&self) -> f64 {
        self.step.map(|s| s.num_seconds() as f64 / 60.0).unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.instants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instants.is_empty()
    }

    pub fn first(&self) -> Option<DateTime<Utc>> {
        self.instants.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.instants.last().copied()
    }

    pub fn position(&self, instant: DateTime<Utc>) -> Option<usize> {
        self.instants.binary_search(&instant).ok()
    }

    /// Contiguous sub-index; keeps the step.
    pub fn slice(&self, range: std::ops::RangeInclusive<usize>) -> TimeIndex {
        TimeIndex {
            instants: self.instants[range].to_vec(),
            step: self.step,
        }
    }
}

/// Drops seconds and sub-second precision.
pub fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

fn local_midnight(date: NaiveDate, tz: Tz) -> PipelineResult<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| PipelineError::config(format!("invalid date {date}")))?;
    // Midnight can fall into a DST gap in a few zones; take the first valid instant after it.
    let local = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .ok_or_else(|| PipelineError::config(format!("{date} has no local midnight in {tz}")))?;
    Ok(local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_index_has_one_sample_per_minute() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let index = TimeIndex::day(date, chrono_tz::Europe::Rome, 1).unwrap();
        assert_eq!(index.len(), 1440);
        assert_eq!(index.first().unwrap(), Utc.with_ymd_and_hms(2025, 6, 20, 22, 0, 0).unwrap());
        assert_eq!(index.step_minutes(), 1.0);
    }

    #[test]
    fn dst_spring_forward_day_is_shorter() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let index = TimeIndex::day(date, chrono_tz::Europe::Rome, 1).unwrap();
        assert_eq!(index.len(), 23 * 60);
    }

    #[test]
    fn coarse_step_reduces_samples() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        let index = TimeIndex::day(date, chrono_tz::UTC, 15).unwrap();
        assert_eq!(index.len(), 96);
        assert_eq!(index.step_minutes(), 15.0);
    }

    #[test]
    fn non_increasing_instants_are_rejected() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 12, 0, 0).unwrap();
        assert!(TimeIndex::from_instants(vec![t, t]).is_err());
        assert!(TimeIndex::from_instants(vec![t, t + Duration::minutes(1)]).is_ok());
    }

    #[test]
    fn panel_ranges_are_validated() {
        assert!(PanelConfig::new(5.0, 152.0, 6.25, 0.142).is_ok());
        assert!(PanelConfig::new(95.0, 152.0, 6.25, 0.142).is_err());
        assert!(PanelConfig::new(5.0, 400.0, 6.25, 0.142).is_err());
        assert!(PanelConfig::new(5.0, 152.0, 0.0, 0.142).is_err());
        // percent instead of fraction
        assert!(PanelConfig::new(5.0, 152.0, 6.25, 14.2).is_err());
    }

    #[test]
    fn location_rejects_unknown_timezone() {
        assert!(GeoLocation::new(45.5, 9.19, 144.0, "Europe/Rome").is_ok());
        let err = GeoLocation::new(45.5, 9.19, 144.0, "Mars/Olympus").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(GeoLocation::new(91.0, 9.19, 144.0, "UTC").is_err());
    }

    #[test]
    fn truncation_drops_seconds() {
        let t = Utc.with_ymd_and_hms(2025, 6, 21, 12, 34, 56).unwrap();
        assert_eq!(truncate_to_minute(t), Utc.with_ymd_and_hms(2025, 6, 21, 12, 34, 0).unwrap());
    }
}
