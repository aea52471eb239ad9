//! Order fulfillment for the marketplace.
//!
//! [`OrderOrchestrator`] places orders through a saga over the store
//! gateways:
//! 1. Look up prices and check stock
//! 2. Create the appointment
//! 3. Credit the seller
//! 4. Decrement stock
//! 5. Persist the order
//!
//! If a step fails, previously completed steps are compensated in reverse
//! order. The orchestrator also serves status updates, order edits,
//! appointment scheduling and the seller ledger.

pub mod error;
pub mod orchestrator;
pub mod order_fulfillment;
pub mod state;

pub use error::{FulfillmentError, Result};
pub use orchestrator::OrderOrchestrator;
pub use state::{CompletedStep, SagaLog, SagaState};
