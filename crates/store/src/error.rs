use common::{AppointmentId, ChargeId, OrderId, UserId};
use domain::{DomainError, Money, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with a storage gateway.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist in the inventory.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough stock to satisfy the requested quantity.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The seller has no ledger account.
    #[error("Seller not found: {0}")]
    SellerNotFound(UserId),

    /// A debit would take the balance below zero.
    #[error("Insufficient balance for seller {seller_id}: requested {requested}, available {available}")]
    InsufficientBalance {
        seller_id: UserId,
        requested: Money,
        available: Money,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(AppointmentId),

    #[error("Charge not found: {0}")]
    ChargeNotFound(ChargeId),

    /// A charge with this gateway id was already recorded.
    #[error("Charge already recorded: {0}")]
    DuplicateCharge(ChargeId),

    /// A domain rule rejected the write.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backend could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a domain record.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for errors that mean "the thing you asked about does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ProductNotFound(_)
                | StoreError::SellerNotFound(_)
                | StoreError::OrderNotFound(_)
                | StoreError::AppointmentNotFound(_)
                | StoreError::ChargeNotFound(_)
        )
    }

    /// Returns true for errors caused by a resource the request competes for.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::InsufficientStock { .. }
                | StoreError::InsufficientBalance { .. }
                | StoreError::DuplicateCharge(_)
                | StoreError::Domain(DomainError::InvalidTransition { .. })
                | StoreError::Domain(DomainError::InvalidChargeTransition { .. })
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
