pub mod irradiance_adjuster;
pub mod meter_client;
pub mod pipeline;
pub mod power_service;
pub mod report_service;
pub mod shadow_profile;
pub mod solar_algorithm;
pub mod weather_provider;
pub mod weather_series;
