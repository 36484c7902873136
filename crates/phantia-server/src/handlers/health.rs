//! Health probe - GET /health

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, warn};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub store: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub services: ServiceStatus,
    /// Seconds since the server started.
    pub uptime: f64,
}

#[derive(Debug, Serialize)]
pub struct HealthError {
    pub status: &'static str,
    pub timestamp: String,
    pub error: String,
}

/// An unreachable store is reported as `disconnected` with 200; only an
/// unexpected reply from the probe yields 503.
pub async fn health_check(State(state): State<AppState>) -> Response {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

    let store = match state.coordinator.ping().await {
        Ok(()) => "connected",
        Err(e) if e.is_retryable() => {
            warn!("Health probe: store unreachable: {}", e);
            "disconnected"
        }
        Err(e) => {
            error!("Health probe failed: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthError {
                    status: "error",
                    timestamp,
                    error: e.to_string(),
                }),
            )
                .into_response();
        }
    };

    Json(HealthResponse {
        status: "ok",
        timestamp,
        services: ServiceStatus { store },
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
    .into_response()
}
