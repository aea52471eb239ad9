//! Seller ledger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::UserId;
use domain::{Money, Transaction};
use serde::{Deserialize, Serialize};

use super::parse_uuid;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WithdrawRequest {
    pub amount_cents: i64,
    pub payment_method: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub seller_id: String,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: String,
    pub kind: &'static str,
    pub amount_cents: i64,
    pub order_id: Option<String>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            kind: tx.kind.as_str(),
            amount_cents: tx.amount.cents(),
            order_id: tx.order_id.map(|id| id.to_string()),
            payment_method: tx.payment_method,
            created_at: tx.created_at,
        }
    }
}

fn seller_id(raw: &str) -> Result<UserId, ApiError> {
    Ok(UserId::from_uuid(parse_uuid("seller id", raw)?))
}

/// GET /sellers/{id}/balance
#[tracing::instrument(skip(state))]
pub async fn balance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let seller_id = seller_id(&id)?;
    let balance = state.orders.seller_balance(seller_id).await?;
    Ok(Json(BalanceResponse {
        seller_id: seller_id.to_string(),
        balance_cents: balance.cents(),
    }))
}

/// GET /sellers/{id}/transactions: oldest first.
#[tracing::instrument(skip(state))]
pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let seller_id = seller_id(&id)?;
    let transactions = state.orders.transactions(seller_id).await?;
    Ok(Json(
        transactions
            .into_iter()
            .map(TransactionResponse::from)
            .collect(),
    ))
}

/// POST /sellers/{id}/withdraw: returns the balance after the debit.
#[tracing::instrument(skip(state, payload))]
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let Json(req) = payload?;
    let seller_id = seller_id(&id)?;

    let balance = state
        .orders
        .withdraw(
            seller_id,
            &req.payment_method,
            Money::from_cents(req.amount_cents),
        )
        .await?;

    Ok(Json(BalanceResponse {
        seller_id: seller_id.to_string(),
        balance_cents: balance.cents(),
    }))
}
