//! Domain error types.

use thiserror::Error;

use crate::charge::ChargeStatus;
use crate::order::{OrderStatus, ProductId};

/// Validation errors raised by domain rules.
///
/// None of these involve a side effect: they are produced before anything is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// An order needs at least one line item.
    #[error("Order has no line items")]
    EmptyLineItems,

    /// Line item quantity must be positive.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Status code outside the known range.
    #[error("Invalid order status code: {0} (expected 0-3)")]
    InvalidStatus(i64),

    /// Status change that the state machine does not allow.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Role string that is neither buyer nor seller.
    #[error("Invalid user role: {0}")]
    InvalidRole(String),

    /// Money amount that must be positive was not.
    #[error("Invalid amount: {0} (must be greater than 0)")]
    InvalidAmount(i64),

    /// Price arithmetic overflowed.
    #[error("Amount overflow while computing order total")]
    AmountOverflow,

    /// A required text field was empty.
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// Charge status change that would undo a settled outcome.
    #[error("Invalid charge status transition: cannot move from {from} to {to}")]
    InvalidChargeTransition { from: ChargeStatus, to: ChargeStatus },

    /// Gateway reported a charge status this system does not know.
    #[error("Unknown charge status: {0}")]
    UnknownChargeStatus(String),
}
