//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{AppointmentId, OrderId, UserId};
use domain::{NewOrder, Order, OrderUpdate, RequestedItem};
use serde::{Deserialize, Serialize};

use super::parse_uuid;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub line_items: Vec<LineItemRequest>,
    pub buyer_id: String,
    pub seller_id: String,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub seller_name: String,
    pub payment_method: String,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub payment_method: Option<String>,
    pub appointment_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: i64,
}

#[derive(Deserialize)]
pub struct RoleQuery {
    pub role: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub status: i16,
    pub status_name: String,
    pub line_items: Vec<LineItemResponse>,
    pub buyer_id: String,
    pub buyer_name: String,
    pub seller_id: String,
    pub seller_name: String,
    pub total_price_cents: i64,
    pub appointment_id: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub order_id: String,
    pub status: i16,
    pub status_name: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            status: order.status.code(),
            status_name: order.status.to_string(),
            line_items: order
                .line_items
                .into_iter()
                .map(|item| LineItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            buyer_id: order.buyer_id.to_string(),
            buyer_name: order.buyer_name,
            seller_id: order.seller_id.to_string(),
            seller_name: order.seller_name,
            total_price_cents: order.total_price.cents(),
            appointment_id: order.appointment_id.to_string(),
            payment_method: order.payment_method,
            created_at: order.created_at,
        }
    }
}

// -- Handlers --

/// POST /orders: place an order through the fulfillment saga.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = payload?;

    let request = NewOrder {
        line_items: req
            .line_items
            .into_iter()
            .map(|item| RequestedItem::new(item.product_id, item.quantity))
            .collect(),
        buyer_id: UserId::from_uuid(parse_uuid("buyer_id", &req.buyer_id)?),
        seller_id: UserId::from_uuid(parse_uuid("seller_id", &req.seller_id)?),
        buyer_name: req.buyer_name,
        seller_name: req.seller_name,
        payment_method: req.payment_method,
    };

    let order = state.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid("order id", &id)?);
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// GET /users/{user_id}/orders?role=buyer|seller
#[tracing::instrument(skip(state, query))]
pub async fn list_by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    query: Result<Query<RoleQuery>, QueryRejection>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let Query(query) = query?;
    let user_id = UserId::from_uuid(parse_uuid("user id", &user_id)?);

    let orders = state
        .orders
        .get_orders_by_user(user_id, &query.role)
        .await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// PUT /orders/{id}: replace the descriptive fields of an order.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Json(req) = payload?;
    let order_id = OrderId::from_uuid(parse_uuid("order id", &id)?);

    let appointment_id = req
        .appointment_id
        .as_deref()
        .map(|raw| parse_uuid("appointment_id", raw).map(AppointmentId::from_uuid))
        .transpose()?;

    let update = OrderUpdate {
        buyer_name: req.buyer_name,
        seller_name: req.seller_name,
        payment_method: req.payment_method,
        appointment_id,
    };

    let order = state.orders.update_order(order_id, update).await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/status: `{ "status": 0..=3 }`
#[tracing::instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Json(req) = payload?;
    let order_id = OrderId::from_uuid(parse_uuid("order id", &id)?);

    let status = state
        .orders
        .update_order_status(order_id, req.status)
        .await?;

    Ok(Json(StatusResponse {
        order_id: order_id.to_string(),
        status: status.code(),
        status_name: status.to_string(),
    }))
}

/// DELETE /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = OrderId::from_uuid(parse_uuid("order id", &id)?);
    state.orders.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
