use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::EnvironmentSnapshot;

pub const SDK_KEY_HEADER: &str = "x-sdk-key";

/// Extractor for SDK authentication, returns the environment the key belongs to
pub struct SdkEnvironment(pub Arc<EnvironmentSnapshot>);

impl<S> FromRequestParts<S> for SdkEnvironment
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<EnvironmentSnapshot>>()
            .cloned()
            .map(SdkEnvironment)
            .ok_or(ApiError::InvalidSdkKey)
    }
}

/// Middleware to validate the SDK key and inject the environment snapshot
pub async fn require_sdk_key(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let sdk_key = req
        .headers()
        .get(SDK_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingSdkKey)?;

    let environment = state
        .store
        .environment_for_sdk_key(sdk_key)
        .ok_or_else(|| {
            debug!("rejected unknown sdk key");
            ApiError::InvalidSdkKey
        })?;

    req.extensions_mut().insert(environment);
    Ok(next.run(req).await)
}
