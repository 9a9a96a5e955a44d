use std::net::SocketAddr;

use shadow_pv_estimator::config::Config;
use shadow_pv_estimator::shared_state::{AppState, SharedState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "verbose_log")]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(feature = "verbose_log"))]
const DEFAULT_FILTER: &str = "info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .init();

    // 1. Load configuration
    let path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match Config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load {}: {}", path, e);
            return;
        }
    };
    info!(
        "Configuration loaded: default site {}, {} | weather key {} | meter {}",
        config.defaults.location.latitude,
        config.defaults.location.longitude,
        if config.weather.api_key.is_some() { "set" } else { "missing" },
        if config.meter.is_some() { "configured" } else { "off" }
    );

    // 2. Upstream clients, shared read-only by every request
    let state = match AppState::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build upstream clients: {}", e);
            return;
        }
    };

    // 3. Start Axum HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let app = shadow_pv_estimator::app(SharedState::new(state, config));

    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    if let Err(e) = axum_server::bind(addr).serve(app.into_make_service()).await {
        error!("HTTP server error: {}", e);
    }
}
