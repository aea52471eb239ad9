//! In-memory gateway implementations.
//!
//! Each gateway keeps its state behind a `tokio::sync::RwLock`; every
//! check-and-mutate runs under a single write guard, which gives the same
//! atomicity the PostgreSQL guarded updates provide. The `set_fail_on_*`
//! toggles make a gateway reject the next calls so saga compensation can be
//! exercised in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{AppointmentId, ChargeId, OrderId, UserId};
use domain::{
    Appointment, Charge, ChargeStatus, Location, Money, Order, OrderStatus, OrderUpdate, Product,
    ProductId, Transaction, UserRole,
};
use tokio::sync::RwLock;

use crate::store::{AppointmentGateway, ChargeStore, InventoryGateway, LedgerGateway, OrderStore};
use crate::{Result, StoreError};

fn injected(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure on {operation}"))
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InventoryState {
    products: HashMap<ProductId, Product>,
    fail_decrement_for: HashSet<ProductId>,
    fail_on_restock: bool,
}

/// In-memory product catalogue with stock counts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventory {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a product.
    pub async fn seed_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Returns the current stock of a product, if it exists.
    pub async fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock)
    }

    /// Makes `decrement_stock` fail for the given product.
    pub async fn set_fail_on_decrement(&self, product_id: impl Into<ProductId>, fail: bool) {
        let product_id = product_id.into();
        let mut state = self.state.write().await;
        if fail {
            state.fail_decrement_for.insert(product_id);
        } else {
            state.fail_decrement_for.remove(&product_id);
        }
    }

    pub async fn set_fail_on_restock(&self, fail: bool) {
        self.state.write().await.fail_on_restock = fail;
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        self.state
            .read()
            .await
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_decrement_for.contains(product_id) {
            return Err(injected("decrement_stock"));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;

        if !product.has_stock_for(quantity) {
            tracing::warn!(
                %product_id,
                requested = quantity,
                available = product.stock,
                "stock guard rejected decrement"
            );
            return Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(())
    }

    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_restock {
            return Err(injected("restock"));
        }

        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<UserId, Money>,
    transactions: Vec<Transaction>,
    fail_on_credit: bool,
    fail_on_reverse: bool,
}

impl LedgerState {
    fn apply_debit(&mut self, tx: Transaction) -> Result<Transaction> {
        let balance = self
            .balances
            .get_mut(&tx.seller_id)
            .ok_or(StoreError::SellerNotFound(tx.seller_id))?;

        if tx.amount > *balance {
            tracing::warn!(
                seller_id = %tx.seller_id,
                requested = %tx.amount,
                available = %balance,
                "balance guard rejected debit"
            );
            return Err(StoreError::InsufficientBalance {
                seller_id: tx.seller_id,
                requested: tx.amount,
                available: *balance,
            });
        }
        *balance -= tx.amount;
        self.transactions.push(tx.clone());
        Ok(tx)
    }
}

/// In-memory seller balances and transaction log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a seller account with the given starting balance.
    pub async fn seed_seller(&self, seller_id: UserId, balance: Money) {
        self.state.write().await.balances.insert(seller_id, balance);
    }

    pub async fn set_fail_on_credit(&self, fail: bool) {
        self.state.write().await.fail_on_credit = fail;
    }

    pub async fn set_fail_on_reverse(&self, fail: bool) {
        self.state.write().await.fail_on_reverse = fail;
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        let mut state = self.state.write().await;
        if state.fail_on_credit {
            return Err(injected("credit"));
        }

        // The first sale opens the seller's account.
        let balance = state.balances.entry(seller_id).or_insert_with(Money::zero);
        *balance = balance.checked_add(amount)?;

        let tx = Transaction::credit(seller_id, order_id, payment_method, amount);
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn debit(
        &self,
        seller_id: UserId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        let mut state = self.state.write().await;
        state.apply_debit(Transaction::debit(seller_id, None, payment_method, amount))
    }

    async fn reverse_credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        let mut state = self.state.write().await;
        if state.fail_on_reverse {
            return Err(injected("reverse_credit"));
        }
        state.apply_debit(Transaction::debit(
            seller_id,
            Some(order_id),
            payment_method,
            amount,
        ))
    }

    async fn balance(&self, seller_id: UserId) -> Result<Money> {
        self.state
            .read()
            .await
            .balances
            .get(&seller_id)
            .copied()
            .ok_or(StoreError::SellerNotFound(seller_id))
    }

    async fn transactions(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        if !state.balances.contains_key(&seller_id) {
            return Err(StoreError::SellerNotFound(seller_id));
        }
        Ok(state
            .transactions
            .iter()
            .filter(|tx| tx.seller_id == seller_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AppointmentState {
    appointments: HashMap<AppointmentId, Appointment>,
    fail_on_create: bool,
    fail_on_delete: bool,
}

/// In-memory appointment records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointments {
    state: Arc<RwLock<AppointmentState>>,
}

impl InMemoryAppointments {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.appointments.len()
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        self.state.write().await.fail_on_delete = fail;
    }

    async fn modify<F>(&self, appointment_id: AppointmentId, f: F) -> Result<Appointment>
    where
        F: FnOnce(&mut Appointment) -> Result<()> + Send,
    {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&appointment_id)
            .ok_or(StoreError::AppointmentNotFound(appointment_id))?;
        f(appointment)?;
        Ok(appointment.clone())
    }
}

#[async_trait]
impl AppointmentGateway for InMemoryAppointments {
    async fn create(
        &self,
        order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> Result<Appointment> {
        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(injected("create_appointment"));
        }

        let appointment = Appointment::new(order_id, buyer_id, seller_id);
        state
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, appointment_id: AppointmentId) -> Result<Appointment> {
        self.state
            .read()
            .await
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or(StoreError::AppointmentNotFound(appointment_id))
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Appointment> {
        self.state
            .read()
            .await
            .appointments
            .values()
            .find(|a| a.order_id == order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn set_place(
        &self,
        appointment_id: AppointmentId,
        location: Location,
    ) -> Result<Appointment> {
        self.modify(appointment_id, |a| {
            a.set_place(location);
            Ok(())
        })
        .await
    }

    async fn set_date(
        &self,
        appointment_id: AppointmentId,
        date: NaiveDate,
        time_slot: String,
    ) -> Result<Appointment> {
        self.modify(appointment_id, |a| Ok(a.set_date(date, time_slot)?))
            .await
    }

    async fn delete(&self, appointment_id: AppointmentId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_delete {
            return Err(injected("delete_appointment"));
        }
        state
            .appointments
            .remove(&appointment_id)
            .map(|_| ())
            .ok_or(StoreError::AppointmentNotFound(appointment_id))
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct OrderState {
    // Insertion order doubles as creation order.
    orders: Vec<Order>,
    fail_on_create: bool,
}

impl OrderState {
    fn find_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(StoreError::OrderNotFound(order_id))
    }
}

/// In-memory order records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrders {
    state: Arc<RwLock<OrderState>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn create(&self, order: Order) -> Result<Order> {
        let mut state = self.state.write().await;
        if state.fail_on_create {
            return Err(injected("persist_order"));
        }
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned())
    }

    async fn get_by_user(&self, user_id: UserId, role: UserRole) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.involves(user_id, role))
            .cloned()
            .collect())
    }

    async fn delete(&self, order_id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        let before = state.orders.len();
        state.orders.retain(|o| o.id != order_id);
        if state.orders.len() == before {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn update(&self, order_id: OrderId, update: &OrderUpdate) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state.find_mut(order_id)?;
        order.apply_update(update);
        Ok(order.clone())
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderStatus> {
        let mut state = self.state.write().await;
        let order = state.find_mut(order_id)?;
        order.status = order.status.transition_to(status)?;
        Ok(order.status)
    }
}

// ---------------------------------------------------------------------------
// Charges
// ---------------------------------------------------------------------------

/// In-memory charge records keyed by gateway charge id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCharges {
    charges: Arc<RwLock<HashMap<ChargeId, Charge>>>,
}

impl InMemoryCharges {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.charges.read().await.len()
    }
}

#[async_trait]
impl ChargeStore for InMemoryCharges {
    async fn insert(&self, charge: Charge) -> Result<Charge> {
        let mut charges = self.charges.write().await;
        if charges.contains_key(&charge.id) {
            return Err(StoreError::DuplicateCharge(charge.id));
        }
        charges.insert(charge.id.clone(), charge.clone());
        Ok(charge)
    }

    async fn get(&self, charge_id: &ChargeId) -> Result<Option<Charge>> {
        Ok(self.charges.read().await.get(charge_id).cloned())
    }

    async fn update_status(&self, charge_id: &ChargeId, status: ChargeStatus) -> Result<Charge> {
        let mut charges = self.charges.write().await;
        let charge = charges
            .get_mut(charge_id)
            .ok_or_else(|| StoreError::ChargeNotFound(charge_id.clone()))?;
        charge.status = charge.status.transition_to(status)?;
        charge.updated_at = Utc::now();
        Ok(charge.clone())
    }
}
