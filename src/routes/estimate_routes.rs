use axum::{routing::{get, post}, Router};
use crate::controllers::estimate_controller::{get_defaults, get_meter, get_shadow, post_estimate};
use crate::shared_state::SharedState;

/// Build the `/api/*` sub-router.
/// Handlers extract `State<AppState>` and/or `State<Arc<Config>>` via
/// `FromRef<SharedState>`, so a single `.with_state(shared)` covers both.
pub fn api_routes(shared: SharedState) -> Router {
    Router::new()
        .route("/defaults", get(get_defaults))
        .route("/estimate", post(post_estimate))
        .route("/shadow",   get(get_shadow))
        .route("/meter",    get(get_meter))
        .with_state(shared)
}
