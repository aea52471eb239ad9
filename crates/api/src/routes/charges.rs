//! Charge endpoints, including the live status stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use chrono::{DateTime, Utc};
use common::{ChargeId, OrderId};
use domain::{Charge, Money};
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use super::parse_uuid;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateChargeRequest {
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub token: String,
    pub order_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChargeResponse {
    pub id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: Option<String>,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Charge> for ChargeResponse {
    fn from(charge: Charge) -> Self {
        Self {
            id: charge.id.to_string(),
            amount_cents: charge.amount.cents(),
            currency: charge.currency,
            order_id: charge.order_id.map(|id| id.to_string()),
            status: charge.status.as_str(),
            created_at: charge.created_at,
            updated_at: charge.updated_at,
        }
    }
}

/// POST /charges: create a charge with the payment gateway.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateChargeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChargeResponse>), ApiError> {
    let Json(req) = payload?;

    let order_id = req
        .order_id
        .as_deref()
        .map(|raw| parse_uuid("order_id", raw).map(OrderId::from_uuid))
        .transpose()?;
    let currency = req.currency.as_deref().unwrap_or(&state.currency);

    let charge = state
        .payments
        .create_charge(
            Money::from_cents(req.amount_cents),
            currency,
            &req.token,
            order_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(charge.into())))
}

/// GET /charges/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let charge = state.payments.get_charge(&ChargeId::new(id)).await?;
    Ok(Json(charge.into()))
}

/// GET /charges/{id}/stream: one `data: <status>` event per status change.
///
/// The subscription lives inside the stream, so a client disconnect drops it
/// and unregisters from the hub.
#[tracing::instrument(skip(state))]
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut subscription = state.payments.subscribe(ChargeId::new(id)).await?;
    let gauge = StreamGauge::open();
    tracing::debug!(subscription_id = subscription.id(), "status stream opened");

    let events = async_stream::stream! {
        let _gauge = gauge;
        while let Some(status) = subscription.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(status));
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.sse_keep_alive)))
}

/// Tracks open status streams.
struct StreamGauge;

impl StreamGauge {
    fn open() -> Self {
        metrics::gauge!("charge_stream_subscribers").increment(1.0);
        StreamGauge
    }
}

impl Drop for StreamGauge {
    fn drop(&mut self) {
        metrics::gauge!("charge_stream_subscribers").decrement(1.0);
    }
}
