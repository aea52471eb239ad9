//! Domain layer for the marketplace fulfillment pipeline.
//!
//! This crate holds the records the pipeline moves around and the rules that
//! are independent of any storage or transport:
//! - Order, line items and the order status state machine
//! - Appointment scheduling records
//! - Seller ledger transactions
//! - Payment charges and their gateway-reported status

pub mod appointment;
pub mod charge;
pub mod error;
pub mod ledger;
pub mod order;
pub mod product;
pub mod role;

pub use appointment::{Appointment, Location};
pub use charge::{Charge, ChargeStatus, DEFAULT_CURRENCY};
pub use error::DomainError;
pub use ledger::{Transaction, TransactionKind};
pub use order::{
    LineItem, Money, NewOrder, Order, OrderStatus, OrderUpdate, ProductId, RequestedItem, total_of,
};
pub use product::Product;
pub use role::UserRole;
