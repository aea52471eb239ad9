//! Payments for the marketplace.
//!
//! Charges are created through a [`PaymentGateway`] and recorded as
//! `Pending`. The gateway later reports the outcome through a webhook, which
//! [`PaymentOrchestrator::handle_webhook`] persists and then fans out to live
//! subscribers through the [`ChargeHub`].

pub mod error;
pub mod gateway;
pub mod hub;
pub mod orchestrator;
pub mod webhook;

pub use error::{HubError, PaymentError, Result};
pub use gateway::{
    ChargeRequest, InMemoryPaymentGateway, OmiseConfig, OmiseGateway, PaymentGateway,
};
pub use hub::{ChargeHub, HubConfig, Subscription};
pub use orchestrator::{PaymentOrchestrator, WebhookOutcome};
pub use webhook::WebhookEvent;
