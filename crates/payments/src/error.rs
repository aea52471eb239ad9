//! Payment error types.

use common::ChargeId;
use store::StoreError;
use thiserror::Error;

/// Errors raised by the charge notification hub.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Too many subscribers for charge {charge_id} (limit {limit})")]
    TooManySubscribers { charge_id: ChargeId, limit: usize },
}

/// Errors that can occur while creating charges or handling webhooks.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The charge request failed local validation.
    #[error("Invalid charge request: {0}")]
    InvalidRequest(String),

    /// The gateway refused the charge.
    #[error("Charge rejected by gateway: {0}")]
    Rejected(String),

    /// The gateway could not be reached, timed out or answered garbage.
    #[error("Payment gateway unavailable: {0}")]
    Upstream(String),

    /// The webhook payload does not have the expected shape.
    #[error("Invalid webhook data: {0}")]
    InvalidWebhook(String),

    #[error("Unknown webhook status: {0}")]
    UnknownStatus(String),

    #[error("Charge not found: {0}")]
    ChargeNotFound(ChargeId),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PaymentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ChargeNotFound(id) => PaymentError::ChargeNotFound(id),
            other => PaymentError::Store(other),
        }
    }
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
