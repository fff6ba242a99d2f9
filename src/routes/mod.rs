use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod health;
mod sdk;
mod sdk_auth;

pub use health::{health, HealthData};
pub use sdk::{EvaluateResponse, FlagState, FlagsetResponse};
pub use sdk_auth::SDK_KEY_HEADER;

use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    let sdk_router = Router::new()
        .route("/evaluate", post(sdk::routes::evaluate))
        .route("/evaluate/{flag_key}", post(sdk::routes::evaluate_flag))
        .route("/flags", get(sdk::routes::flagset))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sdk_auth::require_sdk_key,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/sdk", sdk_router)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Feature flag evaluation service"
}
