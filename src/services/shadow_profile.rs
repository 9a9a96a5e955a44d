//! Horizon obstruction profile: elevation of the skyline as a function of azimuth.
//!
//! Control points are sorted by azimuth and interpolated piecewise-linearly.
//! Azimuths are reduced onto the circle first (`rem_euclid(360)`), so 360°
//! and 0° are the same direction. An azimuth that still falls outside the
//! covered span `[first, last]` reads as an open horizon (elevation 0): the
//! profile carries no obstruction data there and we do not extrapolate.

use crate::error::{PipelineError, PipelineResult};
use crate::models::power::SolarPosition;

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowProfile {
    azimuths: Vec<f64>,
    elevations: Vec<f64>,
}

impl ShadowProfile {
    pub fn new(mut points: Vec<(f64, f64)>) -> PipelineResult<Self> {
        if points.len() < 2 {
            return Err(PipelineError::config(format!(
                "shadow profile needs at least two points, got {}",
                points.len()
            )));
        }
        for &(az, el) in &points {
            if !(0.0..=360.0).contains(&az) {
                return Err(PipelineError::config(format!(
                    "shadow azimuth must be within 0..360°, got {az}"
                )));
            }
            if !(-90.0..=90.0).contains(&el) {
                return Err(PipelineError::config(format!(
                    "shadow elevation must be within -90..90°, got {el}"
                )));
            }
        }

        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if let Some(w) = points.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(PipelineError::config(format!(
                "duplicate shadow azimuth {}",
                w[0].0
            )));
        }

        let (azimuths, elevations) = points.into_iter().unzip();
        Ok(Self {
            azimuths,
            elevations,
        })
    }

    /// Builds a profile from two comma-separated lists, e.g. `"0, 180, 360"` / `"80, 10, 80"`.
    pub fn parse(azimuths: &str, elevations: &str) -> PipelineResult<Self> {
        let azimuths = parse_list(azimuths, "azimuth")?;
        let elevations = parse_list(elevations, "elevation")?;
        if azimuths.len() != elevations.len() {
            return Err(PipelineError::config(format!(
                "shadow profile has {} azimuths but {} elevations",
                azimuths.len(),
                elevations.len()
            )));
        }
        Self::new(azimuths.into_iter().zip(elevations).collect())
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.azimuths.iter().copied().zip(self.elevations.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.azimuths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.azimuths.is_empty()
    }

    /// Skyline elevation at `azimuth`, 0 outside the covered span.
    pub fn elevation_at(&self, azimuth: f64) -> f64 {
        if !azimuth.is_finite() {
            return 0.0;
        }
        let az = normalize_azimuth(azimuth);
        let first = self.azimuths[0];
        let last = self.azimuths[self.azimuths.len() - 1];

        // A profile closing at 360° also covers 0°, and vice versa.
        let az = if az < first && last >= 360.0 {
            az + 360.0
        } else if az > last && first <= 0.0 {
            az - 360.0
        } else {
            az
        };
        if az < first || az > last {
            return 0.0;
        }

        // First control point strictly right of `az`.
        let hi = self.azimuths.partition_point(|&a| a <= az);
        if hi == 0 {
            return self.elevations[0];
        }
        if hi == self.azimuths.len() {
            return self.elevations[hi - 1];
        }
        let lo = hi - 1;
        let (az1, el1) = (self.azimuths[lo], self.elevations[lo]);
        let (az2, el2) = (self.azimuths[hi], self.elevations[hi]);
        el1 + (el2 - el1) * (az - az1) / (az2 - az1)
    }

    pub fn is_shadowed(&self, sun_azimuth: f64, sun_elevation: f64) -> bool {
        sun_elevation < self.elevation_at(sun_azimuth)
    }

    /// Element-wise `is_shadowed` over a series of sun positions (geometric elevation).
    pub fn shadow_mask(&self, positions: &[SolarPosition]) -> Vec<bool> {
        positions
            .iter()
            .map(|p| self.is_shadowed(p.azimuth, p.elevation))
            .collect()
    }
}

fn normalize_azimuth(azimuth: f64) -> f64 {
    if azimuth == 360.0 { 360.0 } else { azimuth.rem_euclid(360.0) }
}

fn parse_list(text: &str, what: &str) -> PipelineResult<Vec<f64>> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                PipelineError::config(format!("shadow {what} '{s}' is not a number"))
            })
        })
        .collect()
}
