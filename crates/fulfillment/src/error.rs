//! Fulfillment error types.

use common::{AppointmentId, OrderId};
use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the order orchestrator.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The request was rejected by a domain rule before anything changed.
    #[error(transparent)]
    Domain(DomainError),

    /// A gateway call outside the creation saga failed.
    #[error(transparent)]
    Store(StoreError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An update tried to link an appointment owned by another order.
    #[error("Appointment {appointment_id} belongs to order {owner}, not {order_id}")]
    AppointmentNotLinked {
        appointment_id: AppointmentId,
        order_id: OrderId,
        owner: OrderId,
    },

    /// A saga step failed; every completed step was compensated.
    #[error("Order creation failed at step '{step}': {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: StoreError,
    },

    /// A saga step failed and at least one compensation failed too. The
    /// final state of the gateways is unknown and must be reconciled.
    #[error("Compensation of step '{step}' failed: {reason} (original failure: {original})")]
    CompensationFailed {
        step: &'static str,
        reason: String,
        original: String,
    },
}

impl FulfillmentError {
    /// Returns the underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            FulfillmentError::Store(e) | FulfillmentError::StepFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        match self {
            FulfillmentError::Domain(e) => !matches!(e, DomainError::InvalidTransition { .. }),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FulfillmentError::OrderNotFound(_))
            || self.store_error().is_some_and(StoreError::is_not_found)
    }

    /// Returns true for stock, balance and status-transition conflicts.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Domain(DomainError::InvalidTransition { .. })
                | FulfillmentError::AppointmentNotLinked { .. }
        ) || self.store_error().is_some_and(StoreError::is_conflict)
    }
}

impl From<DomainError> for FulfillmentError {
    fn from(e: DomainError) -> Self {
        FulfillmentError::Domain(e)
    }
}

// Domain rule violations reported by a gateway surface as domain errors.
impl From<StoreError> for FulfillmentError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Domain(d) => FulfillmentError::Domain(d),
            other => FulfillmentError::Store(other),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
