// ============================================================================
// Phantia Server - Webhook Handler
// File: crates/phantia-server/src/handlers/webhook.rs
// ============================================================================
//! Inbound messages - POST /webhook
//!
//! Each message is counted against its sender's rate window and, if admitted,
//! appended to the conversation buffer. Processing happens elsewhere.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use phantia_core::{IngestOutcome, JsonMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "remoteJid", default)]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub message: Option<JsonMap>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    pub received: bool,
    /// Messages now waiting in the sender's buffer.
    pub pending: u64,
}

pub async fn receive(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<WebhookAccepted>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let remote_jid = payload
        .remote_jid
        .filter(|jid| !jid.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("remoteJid is required".into()))?;
    let message = payload
        .message
        .ok_or_else(|| ApiError::BadRequest("message must be a JSON object".into()))?;

    debug!("Webhook message from {}", remote_jid);

    match state.coordinator.ingest(&remote_jid, &message).await? {
        IngestOutcome::Buffered { pending } => {
            info!("Buffered message for {} ({} pending)", remote_jid, pending);
            Ok(Json(WebhookAccepted {
                received: true,
                pending,
            }))
        }
        IngestOutcome::RateLimited { count } => Err(ApiError::RateLimited { count }),
    }
}
