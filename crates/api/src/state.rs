//! Shared application state and backend wiring.

use std::sync::Arc;
use std::time::Duration;

use fulfillment::OrderOrchestrator;
use payments::{ChargeHub, PaymentGateway, PaymentOrchestrator};
use store::{
    AppointmentGateway, ChargeStore, InMemoryAppointments, InMemoryCharges, InMemoryInventory,
    InMemoryLedger, InMemoryOrders, InventoryGateway, LedgerGateway, OrderStore, PostgresStore,
};

use crate::config::Config;

pub type Orders = OrderOrchestrator<
    Arc<dyn InventoryGateway>,
    Arc<dyn LedgerGateway>,
    Arc<dyn AppointmentGateway>,
    Arc<dyn OrderStore>,
>;

pub type Payments = PaymentOrchestrator<Arc<dyn PaymentGateway>, Arc<dyn ChargeStore>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: Orders,
    pub payments: Payments,
    /// Currency used for charges that do not name one.
    pub currency: String,
    pub sse_keep_alive: Duration,
}

impl AppState {
    pub fn new(stores: Stores, gateway: Arc<dyn PaymentGateway>, config: &Config) -> Self {
        let Stores {
            inventory,
            ledger,
            appointments,
            orders,
            charges,
        } = stores;

        Self {
            orders: OrderOrchestrator::new(inventory, ledger, appointments, orders),
            payments: PaymentOrchestrator::new(gateway, charges, ChargeHub::new(config.hub)),
            currency: config.currency.clone(),
            sse_keep_alive: config.sse_keep_alive,
        }
    }
}

/// The storage gateways the orchestrators run on.
pub struct Stores {
    pub inventory: Arc<dyn InventoryGateway>,
    pub ledger: Arc<dyn LedgerGateway>,
    pub appointments: Arc<dyn AppointmentGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub charges: Arc<dyn ChargeStore>,
}

impl Stores {
    /// Every gateway backed by one PostgreSQL pool.
    pub fn postgres(store: PostgresStore) -> Self {
        let store = Arc::new(store);
        Self {
            inventory: store.clone(),
            ledger: store.clone(),
            appointments: store.clone(),
            orders: store.clone(),
            charges: store,
        }
    }
}

/// In-memory backends, kept as concrete handles so callers can seed them.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub inventory: InMemoryInventory,
    pub ledger: InMemoryLedger,
    pub appointments: InMemoryAppointments,
    pub orders: InMemoryOrders,
    pub charges: InMemoryCharges,
}

impl InMemoryBackends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateways sharing state with these handles.
    pub fn stores(&self) -> Stores {
        Stores {
            inventory: Arc::new(self.inventory.clone()),
            ledger: Arc::new(self.ledger.clone()),
            appointments: Arc::new(self.appointments.clone()),
            orders: Arc::new(self.orders.clone()),
            charges: Arc::new(self.charges.clone()),
        }
    }
}
