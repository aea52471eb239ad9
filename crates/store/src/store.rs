use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{AppointmentId, ChargeId, OrderId, UserId};
use domain::{
    Appointment, Charge, ChargeStatus, Location, Money, Order, OrderStatus, OrderUpdate, Product,
    ProductId, Transaction, UserRole,
};

use crate::Result;

/// Product prices and stock levels.
///
/// `decrement_stock` must be an atomic check-and-subtract: two concurrent
/// callers can never both take the last unit.
#[async_trait]
pub trait InventoryGateway: Send + Sync {
    /// Returns the current price, stock and name of a product.
    async fn get_product(&self, product_id: &ProductId) -> Result<Product>;

    /// Takes `quantity` units out of stock, failing with
    /// `InsufficientStock` if fewer are available.
    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()>;

    /// Puts `quantity` units back into stock.
    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<()>;
}

/// Seller balances and their append-only transaction log.
///
/// Every balance change appends exactly one transaction in the same atomic
/// step. The balance never goes negative.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Deposits an order's total into the seller's balance.
    async fn credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction>;

    /// Withdraws from the seller's balance.
    async fn debit(&self, seller_id: UserId, payment_method: &str, amount: Money)
    -> Result<Transaction>;

    /// Reverses an earlier order credit by appending a debit that references the order.
    async fn reverse_credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction>;

    /// Returns the seller's current balance.
    async fn balance(&self, seller_id: UserId) -> Result<Money>;

    /// Returns the seller's transactions in insertion order.
    async fn transactions(&self, seller_id: UserId) -> Result<Vec<Transaction>>;
}

/// Scheduling records, one per order.
#[async_trait]
pub trait AppointmentGateway: Send + Sync {
    /// Creates an unscheduled appointment linked to the order.
    async fn create(&self, order_id: OrderId, buyer_id: UserId, seller_id: UserId)
    -> Result<Appointment>;

    async fn get(&self, appointment_id: AppointmentId) -> Result<Appointment>;

    async fn get_by_order(&self, order_id: OrderId) -> Result<Appointment>;

    async fn set_place(&self, appointment_id: AppointmentId, location: Location)
    -> Result<Appointment>;

    async fn set_date(
        &self,
        appointment_id: AppointmentId,
        date: NaiveDate,
        time_slot: String,
    ) -> Result<Appointment>;

    async fn delete(&self, appointment_id: AppointmentId) -> Result<()>;
}

/// Persisted orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: Order) -> Result<Order>;

    /// Returns None if the order does not exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns the orders where the user is on the given side, oldest first.
    async fn get_by_user(&self, user_id: UserId, role: UserRole) -> Result<Vec<Order>>;

    /// Removes the order. Linked records are left untouched.
    async fn delete(&self, order_id: OrderId) -> Result<()>;

    async fn update(&self, order_id: OrderId, update: &OrderUpdate) -> Result<Order>;

    /// Moves the order to `status`, rejecting transitions the state machine
    /// does not allow. Read and write happen atomically.
    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderStatus>;
}

/// Locally recorded view of gateway charges.
#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn insert(&self, charge: Charge) -> Result<Charge>;

    /// Returns None if the charge was never recorded.
    async fn get(&self, charge_id: &ChargeId) -> Result<Option<Charge>>;

    async fn update_status(&self, charge_id: &ChargeId, status: ChargeStatus) -> Result<Charge>;
}

// Shared handles (`Arc<dyn InventoryGateway>` and friends) are gateways too.

#[async_trait]
impl<T: InventoryGateway + ?Sized> InventoryGateway for Arc<T> {
    async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        (**self).get_product(product_id).await
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        (**self).decrement_stock(product_id, quantity).await
    }

    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        (**self).restock(product_id, quantity).await
    }
}

#[async_trait]
impl<T: LedgerGateway + ?Sized> LedgerGateway for Arc<T> {
    async fn credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        (**self)
            .credit(seller_id, order_id, payment_method, amount)
            .await
    }

    async fn debit(
        &self,
        seller_id: UserId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        (**self).debit(seller_id, payment_method, amount).await
    }

    async fn reverse_credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        (**self)
            .reverse_credit(seller_id, order_id, payment_method, amount)
            .await
    }

    async fn balance(&self, seller_id: UserId) -> Result<Money> {
        (**self).balance(seller_id).await
    }

    async fn transactions(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        (**self).transactions(seller_id).await
    }
}

#[async_trait]
impl<T: AppointmentGateway + ?Sized> AppointmentGateway for Arc<T> {
    async fn create(
        &self,
        order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> Result<Appointment> {
        (**self).create(order_id, buyer_id, seller_id).await
    }

    async fn get(&self, appointment_id: AppointmentId) -> Result<Appointment> {
        (**self).get(appointment_id).await
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Appointment> {
        (**self).get_by_order(order_id).await
    }

    async fn set_place(
        &self,
        appointment_id: AppointmentId,
        location: Location,
    ) -> Result<Appointment> {
        (**self).set_place(appointment_id, location).await
    }

    async fn set_date(
        &self,
        appointment_id: AppointmentId,
        date: NaiveDate,
        time_slot: String,
    ) -> Result<Appointment> {
        (**self).set_date(appointment_id, date, time_slot).await
    }

    async fn delete(&self, appointment_id: AppointmentId) -> Result<()> {
        (**self).delete(appointment_id).await
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn create(&self, order: Order) -> Result<Order> {
        (**self).create(order).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).get(order_id).await
    }

    async fn get_by_user(&self, user_id: UserId, role: UserRole) -> Result<Vec<Order>> {
        (**self).get_by_user(user_id, role).await
    }

    async fn delete(&self, order_id: OrderId) -> Result<()> {
        (**self).delete(order_id).await
    }

    async fn update(&self, order_id: OrderId, update: &OrderUpdate) -> Result<Order> {
        (**self).update(order_id, update).await
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderStatus> {
        (**self).update_status(order_id, status).await
    }
}

#[async_trait]
impl<T: ChargeStore + ?Sized> ChargeStore for Arc<T> {
    async fn insert(&self, charge: Charge) -> Result<Charge> {
        (**self).insert(charge).await
    }

    async fn get(&self, charge_id: &ChargeId) -> Result<Option<Charge>> {
        (**self).get(charge_id).await
    }

    async fn update_status(&self, charge_id: &ChargeId, status: ChargeStatus) -> Result<Charge> {
        (**self).update_status(charge_id, status).await
    }
}
