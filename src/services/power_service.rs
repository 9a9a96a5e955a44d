use crate::models::site::PanelConfig;

/// P = G_poa × area × η   (W)
pub fn power_from_irradiance(poa_w_m2: f64, panel: &PanelConfig) -> f64 {
    (poa_w_m2 * panel.area() * panel.efficiency()).max(0.0)
}

/// Instantaneous DC power for each plane-of-array sample.
pub fn power(poa_irradiance: &[f64], panel: &PanelConfig) -> Vec<f64> {
    poa_irradiance
        .iter()
        .map(|g| power_from_irradiance(*g, panel))
        .collect()
}

/// Energy in kWh of a power series sampled every `step_minutes`.
///
/// Left-rectangle integration: each sample is held flat for one step. On a
/// rising ramp this underestimates and on a falling ramp it overestimates;
/// at 1-minute steps the bias is negligible. Empty series → 0.
pub fn energy(power_w: &[f64], step_minutes: f64) -> f64 {
    let total: f64 = power_w.iter().sum();
    total * step_minutes / 60.0 / 1000.0
}

/// Hours with the sun above the horizon and clear of the skyline.
pub fn sun_hours(visible: &[bool], step_minutes: f64) -> f64 {
    let samples = visible.iter().filter(|v| **v).count() as f64;
    samples * step_minutes / 60.0
}
