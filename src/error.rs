use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::evaluation::EvaluationError;

/// Errors returned to SDK callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing X-SDK-Key header")]
    MissingSdkKey,

    #[error("Invalid SDK key")]
    InvalidSdkKey,

    #[error("Flag '{0}' not found")]
    FlagNotFound(String),

    #[error("Flag '{flag_key}' is misconfigured: {source}")]
    Misconfigured {
        flag_key: String,
        #[source]
        source: EvaluationError,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingSdkKey | ApiError::InvalidSdkKey => StatusCode::UNAUTHORIZED,
            ApiError::FlagNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Misconfigured { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingSdkKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidSdkKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::FlagNotFound("checkout".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_misconfigured_flag_is_a_server_error() {
        let err = ApiError::Misconfigured {
            flag_key: "checkout".to_string(),
            source: EvaluationError::UnsupportedOperator {
                operator: "sounds_like".to_string(),
            },
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("checkout"));
        assert!(err.to_string().contains("sounds_like"));
    }
}
