//! Home energy meter reading (Shelly cloud).
//!
//! The device exposes two emeters: channel 0 on the PV feed, channel 1 on the
//! grid connection. Both report consumption as positive, so production reads
//! negative and the sign is flipped here.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterReading {
    pub pv_power_w: f64,
    pub grid_power_w: f64,
}

#[derive(Debug, Deserialize)]
struct ShellyStatusResponse {
    data: ShellyData,
}

#[derive(Debug, Deserialize)]
struct ShellyData {
    device_status: ShellyDeviceStatus,
}

#[derive(Debug, Deserialize)]
struct ShellyDeviceStatus {
    #[serde(default)]
    emeters: Vec<ShellyEmeter>,
}

#[derive(Debug, Deserialize)]
struct ShellyEmeter {
    power: f64,
}

#[derive(Clone)]
pub struct MeterClient {
    base_url: String,
    auth_key: String,
    device_id: String,
    client: Client,
}

impl MeterClient {
    pub fn new(
        base_url: impl Into<String>,
        auth_key: impl Into<String>,
        device_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let auth_key = auth_key.into();
        let device_id = device_id.into();
        if auth_key.is_empty() || device_id.is_empty() {
            return Err(ProviderError::MissingCredentials(
                "meter auth key and device id are required".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Initializing meter client: {}", base_url);
        Ok(Self {
            base_url,
            auth_key,
            device_id,
            client,
        })
    }

    pub async fn read(&self) -> Result<MeterReading, ProviderError> {
        let url = format!("{}/device/status", self.base_url);
        let resp: ShellyStatusResponse = self
            .client
            .get(&url)
            .query(&[("auth_key", self.auth_key.as_str()), ("id", self.device_id.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let reading = reading_from_status(resp)?;
        debug!(
            "[METER] PV: {:.0} W | Grid: {:.0} W",
            reading.pv_power_w, reading.grid_power_w
        );
        Ok(reading)
    }
}

fn reading_from_status(resp: ShellyStatusResponse) -> Result<MeterReading, ProviderError> {
    let emeters = resp.data.device_status.emeters;
    if emeters.len() < 2 {
        return Err(ProviderError::InvalidResponse(format!(
            "expected two emeters, got {}",
            emeters.len()
        )));
    }
    Ok(MeterReading {
        pv_power_w: -emeters[0].power,
        grid_power_w: -emeters[1].power,
    })
}
