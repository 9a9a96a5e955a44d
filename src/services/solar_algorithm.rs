//! ============================================================
//!  Solar geometry, clear-sky & transposition engine
//!
//!  Pipeline:
//!   1. Solar geometry  – declination, equation of time, hour angle,
//!                        elevation, azimuth, refraction
//!   2. Extraterrestrial irradiance – eccentricity-corrected solar constant
//!   3. Clear-sky model  – Bird & Hulstrom simplified: DNI, GHI, DHI
//!   4. Transposition    – isotropic sky + ground reflection → POA global
//! ============================================================

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

use crate::models::power::{Irradiance, SolarPosition};
use crate::models::site::{GeoLocation, PanelConfig, TimeIndex};

// ─── Physical constants ──────────────────────────────────────
const SC: f64 = 1361.0; // Solar constant W/m²
const DEG: f64 = PI / 180.0;
const DEFAULT_ALBEDO: f64 = 0.25;

/// Astronomical / irradiance collaborator of the estimation pipeline.
pub trait SolarEngine {
    fn solar_position(&self, index: &TimeIndex, location: &GeoLocation) -> Vec<SolarPosition>;

    fn clearsky(&self, index: &TimeIndex, location: &GeoLocation) -> Vec<Irradiance>;

    /// Plane-of-array global irradiance, aligned with `irradiance` / `positions`.
    fn total_irradiance(
        &self,
        panel: &PanelConfig,
        irradiance: &[Irradiance],
        positions: &[SolarPosition],
    ) -> Vec<f64>;
}

/// Offline engine: Spencer geometry, simplified Bird clear sky, isotropic transposition.
#[derive(Debug, Clone, Copy)]
pub struct BirdClearSky {
    pub albedo: f64,
}

impl Default for BirdClearSky {
    fn default() -> Self {
        Self {
            albedo: DEFAULT_ALBEDO,
        }
    }
}

impl SolarEngine for BirdClearSky {
    fn solar_position(&self, index: &TimeIndex, location: &GeoLocation) -> Vec<SolarPosition> {
        index
            .instants()
            .iter()
            .map(|t| sun_position(*t, location.latitude(), location.longitude()))
            .collect()
    }

    fn clearsky(&self, index: &TimeIndex, location: &GeoLocation) -> Vec<Irradiance> {
        index
            .instants()
            .iter()
            .map(|t| {
                let pos = sun_position(*t, location.latitude(), location.longitude());
                clearsky_at(*t, &pos, location.altitude())
            })
            .collect()
    }

    fn total_irradiance(
        &self,
        panel: &PanelConfig,
        irradiance: &[Irradiance],
        positions: &[SolarPosition],
    ) -> Vec<f64> {
        irradiance
            .iter()
            .zip(positions)
            .map(|(irr, pos)| {
                poa_global(
                    panel.tilt(),
                    panel.azimuth(),
                    irr,
                    pos.apparent_zenith,
                    pos.azimuth,
                    self.albedo,
                )
            })
            .collect()
    }
}

// ─── 1. Solar geometry ───────────────────────────────────────

/// Fractional year angle (Spencer 1971), radians.
#[inline]
fn day_angle(utc: DateTime<Utc>) -> f64 {
    2.0 * PI * (utc.ordinal() as f64 - 1.0) / 365.0
}

/// Sun position at `utc` for the given site.
pub fn sun_position(utc: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> SolarPosition {
    let b = day_angle(utc);
    let ut_h = utc.hour() as f64
        + utc.minute() as f64 / 60.0
        + (utc.second() as f64 + utc.nanosecond() as f64 * 1e-9) / 3600.0;

    // a) Declination (Spencer 1971)
    let decl = 0.006918 - 0.399912 * b.cos() + 0.070257 * b.sin()
        - 0.006758 * (2.0 * b).cos()
        + 0.000907 * (2.0 * b).sin()
        - 0.002697 * (3.0 * b).cos()
        + 0.00148 * (3.0 * b).sin();

    // b) Equation of Time (minutes)
    let eot_min = 229.18
        * (0.000075 + 0.001868 * b.cos()
            - 0.032077 * b.sin()
            - 0.014615 * (2.0 * b).cos()
            - 0.04089 * (2.0 * b).sin());

    // c) True solar time from UTC and longitude, then hour angle in (-180, 180]
    let lst_h = ut_h + lon_deg / 15.0 + eot_min / 60.0;
    let omega_deg = (15.0 * (lst_h - 12.0) + 180.0).rem_euclid(360.0) - 180.0;
    let omega = omega_deg * DEG;

    // d) Elevation
    let lat = lat_deg * DEG;
    let sin_alpha = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos()).clamp(-1.0, 1.0);
    let alpha_rad = sin_alpha.asin();
    let elevation = alpha_rad / DEG;

    // e) Azimuth, clockwise from north
    let denom = alpha_rad.cos() * lat.cos();
    let cos_az = if denom.abs() > 1e-9 {
        (decl.sin() - sin_alpha * lat.sin()) / denom
    } else {
        // pole or zenith: direction is degenerate, point at the equator side
        if lat_deg >= 0.0 { -1.0 } else { 1.0 }
    };
    let az_abs = cos_az.clamp(-1.0, 1.0).acos() / DEG;
    let azimuth = if omega_deg > 0.0 { 360.0 - az_abs } else { az_abs };

    let apparent_elevation = elevation + refraction(elevation);

    SolarPosition {
        azimuth,
        elevation,
        apparent_elevation,
        apparent_zenith: 90.0 - apparent_elevation,
    }
}

/// Atmospheric refraction (Bennett / Sæmundsson), degrees. Zero well below the horizon.
fn refraction(elevation_deg: f64) -> f64 {
    if elevation_deg < -1.0 {
        return 0.0;
    }
    let h = elevation_deg + 10.3 / (elevation_deg + 5.11);
    1.02 / (h * DEG).tan() / 60.0
}

// ─── 2. Extraterrestrial irradiance ──────────────────────────

fn extraterrestrial(utc: DateTime<Utc>) -> f64 {
    let b = day_angle(utc);
    SC * (1.00011
        + 0.034221 * b.cos()
        + 0.00128 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin())
}

// ─── 3. Clear-sky model ──────────────────────────────────────

/// Clear-sky DNI / GHI / DHI for one instant, evaluated at the apparent sun elevation.
pub fn clearsky_at(utc: DateTime<Utc>, pos: &SolarPosition, altitude_m: f64) -> Irradiance {
    let alpha_deg = pos.apparent_elevation;
    if alpha_deg <= 0.1 {
        return Irradiance::DARK;
    }
    let sin_alpha = (alpha_deg * DEG).sin();
    let e0 = extraterrestrial(utc);

    // Air mass – Kasten & Young (1989), scaled by station pressure
    let am_rel = (1.0 / (sin_alpha + 0.50572 * (alpha_deg + 6.07995_f64).powf(-1.6364))).max(1.0);
    let am = am_rel * pressure_ratio(altitude_m);

    // Rayleigh
    let tr = (-0.0903 * am.powf(0.84) * (1.0 + am - am.powf(1.01))).exp();
    // Ozone (standard column 0.3 atm-cm)
    let to = 1.0 - 0.0013 * am_rel;
    // Aerosol (Linke turbidity 3.0 – typical continental)
    let tk = 3.0_f64;
    let ta = (-0.09 * tk.powf(0.978) * am.powf(0.9455)).exp();
    // Water vapour (precipitable water 1.5 cm)
    let tw = 1.0 - 0.0075 * am_rel.powf(0.65);

    let total_t = tr * to * ta * tw;
    let dni = (0.9762 * e0 * total_t).max(0.0);
    let dhi_sky = (0.79 * e0 * sin_alpha * (1.0 - total_t) * (0.5 * (1.0 - tr) + ba_scatter_coeff(ta))
        / (1.0 - am + am.powf(1.02)))
    .max(0.0);
    let ghi = (dni * sin_alpha + dhi_sky).max(0.0);

    // Closure relation on the same zenith the adjustment step uses.
    let dhi = (ghi - dni * pos.apparent_zenith.to_radians().cos()).max(0.0);

    Irradiance { dni, ghi, dhi }
}

// ─── Helper: back-scatter term for Bird diffuse ──────────────
#[inline]
fn ba_scatter_coeff(ta: f64) -> f64 {
    0.5 * (0.92 - ta.ln().abs() / 10.0).clamp(0.2, 0.5)
}

/// Station / sea-level pressure ratio for the standard atmosphere.
#[inline]
fn pressure_ratio(altitude_m: f64) -> f64 {
    (1.0 - 2.25577e-5 * altitude_m).max(0.0).powf(5.25588)
}

// ─── 4. Transposition ────────────────────────────────────────

/// Global irradiance on a tilted plane (W/m²): beam + isotropic sky diffuse + ground reflected.
pub fn poa_global(
    tilt_deg: f64,
    surface_azimuth_deg: f64,
    irradiance: &Irradiance,
    zenith_deg: f64,
    sun_azimuth_deg: f64,
    albedo: f64,
) -> f64 {
    let tilt = tilt_deg * DEG;
    let zenith = zenith_deg * DEG;
    let cos_aoi = zenith.cos() * tilt.cos()
        + zenith.sin() * tilt.sin() * ((sun_azimuth_deg - surface_azimuth_deg) * DEG).cos();

    let beam = irradiance.dni * cos_aoi.max(0.0);
    let sky_diffuse = irradiance.dhi * (1.0 + tilt.cos()) / 2.0;
    let ground = irradiance.ghi * albedo * (1.0 - tilt.cos()) / 2.0;

    (beam + sky_diffuse + ground).max(0.0)
}
