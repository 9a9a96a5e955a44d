//! Empirical cloud + horizon-shadow attenuation of clear-sky irradiance.
//!
//!   cloud_fraction = cloud_cover / 100
//!   dni' = max(dni · (1 − 1.1 · cf), 0), forced to 0 where the sun is behind the skyline
//!   ghi' = ghi · (1 − 0.75 · cf)
//!   dhi' = max(ghi' − dni' · cos(zenith), 0)
//!
//! The shadow only removes the beam component; diffuse and global respond to clouds alone.

use crate::error::{PipelineError, PipelineResult};
use crate::models::power::{Irradiance, SolarPosition};
use crate::models::site::TimeIndex;
use crate::services::shadow_profile::ShadowProfile;

const DNI_CLOUD_COEFF: f64 = 1.1;
const GHI_CLOUD_COEFF: f64 = 0.75;

/// Adjusts `clearsky` for `cloud_cover` (percent) and the horizon profile.
///
/// All slices must be aligned with `index`; a length mismatch is a bug in the
/// caller and panics. An empty cloud series for a non-empty index means the
/// weather is unavailable: no zero-cloud default is substituted here.
pub fn adjust(
    index: &TimeIndex,
    clearsky: &[Irradiance],
    cloud_cover: &[f64],
    positions: &[SolarPosition],
    profile: &ShadowProfile,
) -> PipelineResult<Vec<Irradiance>> {
    if !index.is_empty() && cloud_cover.is_empty() {
        return Err(PipelineError::WeatherUnavailable);
    }
    Ok(adjust_aligned(index, clearsky, cloud_cover, positions, profile))
}

/// `adjust` without the availability check, for callers that synthesize the
/// cloud series themselves (the clear-sky path).
pub(crate) fn adjust_aligned(
    index: &TimeIndex,
    clearsky: &[Irradiance],
    cloud_cover: &[f64],
    positions: &[SolarPosition],
    profile: &ShadowProfile,
) -> Vec<Irradiance> {
    assert_eq!(clearsky.len(), index.len(), "clear-sky series not aligned with time index");
    assert_eq!(cloud_cover.len(), index.len(), "cloud series not aligned with time index");
    assert_eq!(positions.len(), index.len(), "solar positions not aligned with time index");

    let shadowed = profile.shadow_mask(positions);

    clearsky
        .iter()
        .zip(cloud_cover)
        .zip(positions)
        .zip(shadowed)
        .map(|(((cs, cloud), pos), shadowed)| {
            adjust_instant(cs, *cloud, pos.apparent_zenith, shadowed)
        })
        .collect()
}

pub fn adjust_instant(clearsky: &Irradiance, cloud_cover: f64, zenith_deg: f64, shadowed: bool) -> Irradiance {
    let cloud_fraction = cloud_cover / 100.0;

    let dni = if shadowed {
        0.0
    } else {
        (clearsky.dni * (1.0 - DNI_CLOUD_COEFF * cloud_fraction)).max(0.0)
    };
    let ghi = clearsky.ghi * (1.0 - GHI_CLOUD_COEFF * cloud_fraction);
    let dhi = (ghi - dni * zenith_deg.to_radians().cos()).max(0.0);

    Irradiance {
        dni,
        ghi: ghi.max(0.0),
        dhi,
    }
}
