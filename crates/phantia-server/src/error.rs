// ============================================================================
// Phantia Server - API Errors
// File: crates/phantia-server/src/error.rs
// ============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use phantia_core::StateError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limited: {count} requests in the current window")]
    RateLimited { count: u64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    received: bool,
    error: &'static str,
    message: String,
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        match err {
            e if e.is_retryable() => ApiError::StoreUnavailable(e.to_string()),
            StateError::Key(e) => ApiError::BadRequest(e.to_string()),
            e => ApiError::InternalError(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, error_type) = match &self {
            ApiError::BadRequest(_) => {
                tracing::warn!("{}", message);
                (StatusCode::BAD_REQUEST, "BadRequest")
            }
            ApiError::RateLimited { .. } => {
                tracing::warn!("{}", message);
                (StatusCode::TOO_MANY_REQUESTS, "RateLimited")
            }
            ApiError::StoreUnavailable(_) => {
                tracing::error!("{}", message);
                (StatusCode::SERVICE_UNAVAILABLE, "StoreUnavailable")
            }
            ApiError::InternalError(_) => {
                tracing::error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
        };

        let body = Json(ErrorResponse {
            received: false,
            error: error_type,
            message,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phantia_core::{KeyError, StoreError};
    use std::time::Duration;

    #[test]
    fn test_retryable_store_errors_map_to_unavailable() {
        let err: ApiError = StateError::Store(StoreError::Timeout(Duration::from_secs(1))).into();
        assert!(matches!(err, ApiError::StoreUnavailable(_)));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_key_errors_map_to_bad_request() {
        let err: ApiError = StateError::Key(KeyError::EmptyIdentifier).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_command_errors_are_internal() {
        let err: ApiError = StateError::Store(StoreError::Command("WRONGTYPE".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
