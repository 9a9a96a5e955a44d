use utoipa::OpenApi;
use crate::controllers::estimate_controller;
use crate::error::GapReason;
use crate::models::{api, power};

#[derive(OpenApi)]
#[openapi(
    paths(
        estimate_controller::get_defaults,
        estimate_controller::post_estimate,
        estimate_controller::get_shadow,
        estimate_controller::get_meter
    ),
    components(
        schemas(
            api::EstimateParams,
            api::LocationParams,
            api::PanelParams,
            api::ShadowParams,
            api::EstimateResponse,
            api::InstantReport,
            api::DayReport,
            api::DaySample,
            api::WeatherReport,
            api::WeatherStatus,
            api::ShadowResponse,
            api::DefaultsResponse,
            api::MeterResponse,
            api::ErrorResponse,
            power::SolarPosition,
            GapReason
        )
    ),
    tags(
        (name = "shadow-pv-estimator", description = "Shadow-aware PV production estimate API")
    )
)]
pub struct ApiDoc;
