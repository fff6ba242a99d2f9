use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{EvaluateRequest, EvaluateResponse, FlagState, FlagsetResponse};
use crate::error::ApiError;
use crate::evaluation::{Evaluation, EvaluationContext, Flag};
use crate::routes::sdk_auth::SdkEnvironment;
use crate::state::AppState;
use crate::store::EnvironmentSnapshot;

/// Evaluate every flag of the caller's environment for one context
pub async fn evaluate(
    State(state): State<AppState>,
    SdkEnvironment(environment): SdkEnvironment,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let context = request.context;

    let flags = environment
        .flags()
        .iter()
        .map(|flag| -> Result<(String, FlagState), ApiError> {
            let evaluation = evaluate_one(&state, &environment, flag, &context)?;
            Ok((
                evaluation.flag_key,
                FlagState {
                    variation_key: evaluation.variation_key,
                    reason: evaluation.reason,
                },
            ))
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    debug!(
        environment = %environment.path(),
        flags = flags.len(),
        "evaluated flagset"
    );

    Ok(Json(EvaluateResponse {
        environment: environment.key.clone(),
        evaluated_at: Utc::now(),
        flags,
    }))
}

/// Evaluate a single flag by key
pub async fn evaluate_flag(
    State(state): State<AppState>,
    SdkEnvironment(environment): SdkEnvironment,
    Path(flag_key): Path<String>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<Evaluation>, ApiError> {
    let flag = environment
        .flag(&flag_key)
        .ok_or_else(|| ApiError::FlagNotFound(flag_key.clone()))?;

    Ok(Json(evaluate_one(&state, &environment, flag, &request.context)?))
}

/// Raw flag definitions for SDK side evaluation, honouring conditional requests
pub async fn flagset(
    SdkEnvironment(environment): SdkEnvironment,
    headers: HeaderMap,
) -> Response {
    let etag = format!("\"{}\"", environment.etag());
    let etag_header = match HeaderValue::from_str(&etag) {
        Ok(value) => value,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    if is_not_modified(&headers, &etag) {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag_header)]).into_response();
    }

    let body = FlagsetResponse {
        environment: environment.key.clone(),
        flags: environment.flags().to_vec(),
    };
    ([(header::ETAG, etag_header)], Json(body)).into_response()
}

// A configuration error fails the flag rather than reaching the SDK as a fallthrough.
fn evaluate_one(
    state: &AppState,
    environment: &EnvironmentSnapshot,
    flag: &Flag,
    context: &EvaluationContext,
) -> Result<Evaluation, ApiError> {
    state
        .evaluator
        .evaluate(flag, environment.salt(), context)
        .into_result()
        .map_err(|source| {
            warn!(
                environment = %environment.path(),
                flag_key = %flag.flag_key,
                error = %source,
                "flag evaluation failed on configuration error"
            );
            ApiError::Misconfigured {
                flag_key: flag.flag_key.clone(),
                source,
            }
        })
}

// Polling SDKs send the last seen tag in `ETag`; browsers use `If-None-Match`.
fn is_not_modified(headers: &HeaderMap, etag: &str) -> bool {
    let etag = etag.trim_matches('"');
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .chain(headers.get_all(header::ETAG).iter())
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/").trim_matches('"'))
        .any(|candidate| candidate == etag || candidate == "*")
}
