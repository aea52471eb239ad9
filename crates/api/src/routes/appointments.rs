//! Appointment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, NaiveDate, Utc};
use common::{AppointmentId, OrderId};
use domain::{Appointment, Location};
use serde::{Deserialize, Serialize};

use super::parse_uuid;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PlaceRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
}

#[derive(Deserialize)]
pub struct DateRequest {
    /// `YYYY-MM-DD`
    pub date: NaiveDate,
    pub time_slot: String,
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    pub id: String,
    pub order_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub scheduled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appointment: Appointment) -> Self {
        let scheduled = appointment.is_scheduled();
        Self {
            id: appointment.id.to_string(),
            order_id: appointment.order_id.to_string(),
            buyer_id: appointment.buyer_id.to_string(),
            seller_id: appointment.seller_id.to_string(),
            address: appointment.location.address,
            city: appointment.location.city,
            province: appointment.location.province,
            postal_code: appointment.location.postal_code,
            date: appointment.date,
            time_slot: appointment.time_slot,
            scheduled,
            created_at: appointment.created_at,
        }
    }
}

/// GET /appointments/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appointment_id = AppointmentId::from_uuid(parse_uuid("appointment id", &id)?);
    let appointment = state.orders.get_appointment(appointment_id).await?;
    Ok(Json(appointment.into()))
}

/// GET /orders/{id}/appointment
#[tracing::instrument(skip(state))]
pub async fn get_by_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid("order id", &id)?);
    let appointment = state.orders.get_appointment_by_order(order_id).await?;
    Ok(Json(appointment.into()))
}

/// PUT /appointments/{id}/place
#[tracing::instrument(skip(state, payload))]
pub async fn set_place(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<PlaceRequest>, JsonRejection>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let Json(req) = payload?;
    let appointment_id = AppointmentId::from_uuid(parse_uuid("appointment id", &id)?);

    let location = Location {
        address: req.address,
        city: req.city,
        province: req.province,
        postal_code: req.postal_code,
    };
    let appointment = state
        .orders
        .set_appointment_place(appointment_id, location)
        .await?;
    Ok(Json(appointment.into()))
}

/// PUT /appointments/{id}/date
#[tracing::instrument(skip(state, payload))]
pub async fn set_date(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<DateRequest>, JsonRejection>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let Json(req) = payload?;
    let appointment_id = AppointmentId::from_uuid(parse_uuid("appointment id", &id)?);

    let appointment = state
        .orders
        .set_appointment_date(appointment_id, req.date, req.time_slot)
        .await?;
    Ok(Json(appointment.into()))
}
