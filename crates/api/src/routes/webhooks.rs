//! Payment gateway webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use payments::WebhookOutcome;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub charge_id: String,
    pub status: &'static str,
    /// Subscribers that received the update; 0 when nothing was broadcast.
    pub delivered: usize,
}

/// POST /webhooks/payment: acknowledges with 200 once the status is stored.
///
/// Malformed payloads are answered with 400 and change nothing. Unknown
/// charges get 404 so the gateway retries.
#[tracing::instrument(skip(state, payload))]
pub async fn payment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Json(payload) = payload?;

    let response = match state.payments.handle_webhook(&payload).await? {
        WebhookOutcome::Updated { charge, delivered } => WebhookResponse {
            charge_id: charge.id.to_string(),
            status: charge.status.as_str(),
            delivered,
        },
        WebhookOutcome::Acknowledged { charge_id, status } => WebhookResponse {
            charge_id: charge_id.to_string(),
            status: status.as_str(),
            delivered: 0,
        },
    };
    Ok(Json(response))
}
