//! Storage gateways for the fulfillment pipeline.
//!
//! Each concern the orchestrators touch (inventory, seller ledger,
//! appointments, orders, charges) sits behind its own trait so the in-memory
//! and PostgreSQL backends are interchangeable.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{
    InMemoryAppointments, InMemoryCharges, InMemoryInventory, InMemoryLedger, InMemoryOrders,
};
pub use postgres::PostgresStore;
pub use store::{AppointmentGateway, ChargeStore, InventoryGateway, LedgerGateway, OrderStore};
