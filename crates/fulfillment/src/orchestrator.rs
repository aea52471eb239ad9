//! The order orchestrator.

use std::time::Instant;

use chrono::NaiveDate;
use common::{AppointmentId, OrderId, UserId};
use domain::{
    Appointment, DomainError, LineItem, Location, Money, NewOrder, Order, OrderStatus,
    OrderUpdate, Transaction, UserRole,
};
use store::{AppointmentGateway, InventoryGateway, LedgerGateway, OrderStore, StoreError};

use crate::error::{FulfillmentError, Result};
use crate::order_fulfillment::{
    STEP_CREATE_APPOINTMENT, STEP_CREDIT_SELLER, STEP_DECREMENT_STOCK, STEP_PERSIST_ORDER,
    STEP_PRICE_LOOKUP,
};
use crate::state::{CompletedStep, SagaLog};

/// Coordinates order creation across the inventory, ledger, appointment and
/// order gateways, and serves the follow-up order operations.
///
/// Order creation runs as a saga: price lookup, appointment, seller credit,
/// stock decrement, persist. When a step fails, the steps that already took
/// effect are undone in reverse order before the error is returned.
pub struct OrderOrchestrator<I, L, A, O>
where
    I: InventoryGateway,
    L: LedgerGateway,
    A: AppointmentGateway,
    O: OrderStore,
{
    inventory: I,
    ledger: L,
    appointments: A,
    orders: O,
}

impl<I, L, A, O> OrderOrchestrator<I, L, A, O>
where
    I: InventoryGateway,
    L: LedgerGateway,
    A: AppointmentGateway,
    O: OrderStore,
{
    pub fn new(inventory: I, ledger: L, appointments: A, orders: O) -> Self {
        Self {
            inventory,
            ledger,
            appointments,
            orders,
        }
    }

    /// Places an order.
    ///
    /// Returns the persisted order with status `WaitingForLocation`. On
    /// failure every completed step has been compensated, unless the error is
    /// [`FulfillmentError::CompensationFailed`].
    #[tracing::instrument(
        skip(self, request),
        fields(buyer_id = %request.buyer_id, seller_id = %request.seller_id, order_id)
    )]
    pub async fn create_order(&self, request: NewOrder) -> Result<Order> {
        request.validate()?;

        let started = Instant::now();
        let order_id = OrderId::new();
        tracing::Span::current().record("order_id", tracing::field::display(order_id));

        let mut saga = SagaLog::new(order_id);
        saga.start();

        let result = self.run_saga(&mut saga, &request).await;
        metrics::histogram!("order_saga_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(order) => {
                saga.complete();
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(total = %order.total_price, "order created");
                Ok(order)
            }
            Err((step, source)) => {
                metrics::counter!("order_saga_failed_total", "step" => step).increment(1);
                tracing::warn!(step, error = %source, "order saga step failed, compensating");
                let outcome = self.compensate(&mut saga, step, &source).await;
                saga.fail();
                match outcome {
                    Ok(()) => Err(FulfillmentError::StepFailed { step, source }),
                    Err(e) => Err(e),
                }
            }
        }
    }

    async fn run_saga(
        &self,
        saga: &mut SagaLog,
        request: &NewOrder,
    ) -> std::result::Result<Order, (&'static str, StoreError)> {
        let order_id = saga.order_id();

        let line_items = self
            .price_lookup(request)
            .await
            .map_err(|e| (STEP_PRICE_LOOKUP, e))?;
        let total = domain::total_of(&line_items)
            .map_err(|e| (STEP_PRICE_LOOKUP, StoreError::from(e)))?;

        tracing::debug!(step = STEP_CREATE_APPOINTMENT, "saga step started");
        let appointment = self
            .appointments
            .create(order_id, request.buyer_id, request.seller_id)
            .await
            .map_err(|e| (STEP_CREATE_APPOINTMENT, e))?;
        saga.record(CompletedStep::AppointmentCreated(appointment.id));

        tracing::debug!(step = STEP_CREDIT_SELLER, "saga step started");
        self.ledger
            .credit(request.seller_id, order_id, &request.payment_method, total)
            .await
            .map_err(|e| (STEP_CREDIT_SELLER, e))?;
        saga.record(CompletedStep::SellerCredited {
            seller_id: request.seller_id,
            payment_method: request.payment_method.clone(),
            amount: total,
        });

        tracing::debug!(step = STEP_DECREMENT_STOCK, "saga step started");
        for item in &line_items {
            self.inventory
                .decrement_stock(&item.product_id, item.quantity)
                .await
                .map_err(|e| (STEP_DECREMENT_STOCK, e))?;
            saga.record(CompletedStep::StockDecremented {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            });
        }

        tracing::debug!(step = STEP_PERSIST_ORDER, "saga step started");
        let order = Order::place(order_id, request, line_items, appointment.id)
            .map_err(|e| (STEP_PERSIST_ORDER, StoreError::from(e)))?;
        let order = self
            .orders
            .create(order)
            .await
            .map_err(|e| (STEP_PERSIST_ORDER, e))?;
        saga.record(CompletedStep::OrderPersisted);

        Ok(order)
    }

    /// Prices every requested item and checks it is in stock.
    async fn price_lookup(&self, request: &NewOrder) -> store::Result<Vec<LineItem>> {
        let mut line_items = Vec::with_capacity(request.line_items.len());
        for item in &request.line_items {
            let product = self.inventory.get_product(&item.product_id).await?;
            if !product.has_stock_for(item.quantity) {
                return Err(StoreError::InsufficientStock {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    available: product.stock,
                });
            }
            line_items.push(LineItem::new(
                item.product_id.clone(),
                item.quantity,
                product.price,
            ));
        }
        Ok(line_items)
    }

    /// Undoes completed steps, most recent first.
    ///
    /// Every compensation is attempted even after one fails; the first
    /// failure is reported.
    async fn compensate(
        &self,
        saga: &mut SagaLog,
        failed_step: &'static str,
        cause: &StoreError,
    ) -> Result<()> {
        let order_id = saga.order_id();
        let plan = saga.begin_compensation(failed_step, cause.to_string());
        let mut first_failure: Option<(&'static str, String)> = None;

        for step in plan {
            let name = step.step();
            let outcome = match step {
                CompletedStep::OrderPersisted => self.orders.delete(order_id).await,
                CompletedStep::StockDecremented {
                    product_id,
                    quantity,
                } => self.inventory.restock(&product_id, quantity).await,
                CompletedStep::SellerCredited {
                    seller_id,
                    payment_method,
                    amount,
                } => self
                    .ledger
                    .reverse_credit(seller_id, order_id, &payment_method, amount)
                    .await
                    .map(|_| ()),
                CompletedStep::AppointmentCreated(appointment_id) => {
                    self.appointments.delete(appointment_id).await
                }
            };

            match outcome {
                Ok(()) => {
                    metrics::counter!("order_saga_compensations_total", "step" => name)
                        .increment(1);
                    tracing::debug!(step = name, "compensation step completed");
                }
                Err(e) => {
                    tracing::error!(step = name, error = %e, "compensation step failed");
                    if first_failure.is_none() {
                        first_failure = Some((name, e.to_string()));
                    }
                }
            }
        }

        match first_failure {
            None => Ok(()),
            Some((step, reason)) => Err(FulfillmentError::CompensationFailed {
                step,
                reason,
                original: cause.to_string(),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Moves an order to the status with the given wire code.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: OrderId, status: i64) -> Result<OrderStatus> {
        let next = OrderStatus::from_code(status)?;
        let status = self
            .orders
            .update_status(order_id, next)
            .await
            .map_err(|e| match e {
                StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
                other => other.into(),
            })?;
        tracing::info!(%status, "order status updated");
        Ok(status)
    }

    /// Lists the orders where the user is the buyer or the seller, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_orders_by_user(&self, user_id: UserId, role: &str) -> Result<Vec<Order>> {
        let role: UserRole = role.parse()?;
        Ok(self.orders.get_by_user(user_id, role).await?)
    }

    /// Deletes an order. The appointment and ledger entries stay.
    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<()> {
        self.orders.delete(order_id).await.map_err(|e| match e {
            StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
            other => other.into(),
        })?;
        tracing::info!("order deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update_order(&self, order_id: OrderId, update: OrderUpdate) -> Result<Order> {
        if update
            .payment_method
            .as_deref()
            .is_some_and(|m| m.trim().is_empty())
        {
            return Err(DomainError::EmptyField("payment_method").into());
        }

        // An order only ever points at its own appointment.
        if let Some(appointment_id) = update.appointment_id {
            let appointment = self.appointments.get(appointment_id).await?;
            if appointment.order_id != order_id {
                return Err(FulfillmentError::AppointmentNotLinked {
                    appointment_id,
                    order_id,
                    owner: appointment.order_id,
                });
            }
        }

        self.orders
            .update(order_id, &update)
            .await
            .map_err(|e| match e {
                StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id),
                other => other.into(),
            })
    }

    pub async fn get_appointment(&self, appointment_id: AppointmentId) -> Result<Appointment> {
        Ok(self.appointments.get(appointment_id).await?)
    }

    pub async fn get_appointment_by_order(&self, order_id: OrderId) -> Result<Appointment> {
        Ok(self.appointments.get_by_order(order_id).await?)
    }

    #[tracing::instrument(skip(self, location))]
    pub async fn set_appointment_place(
        &self,
        appointment_id: AppointmentId,
        location: Location,
    ) -> Result<Appointment> {
        Ok(self.appointments.set_place(appointment_id, location).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_appointment_date(
        &self,
        appointment_id: AppointmentId,
        date: NaiveDate,
        time_slot: String,
    ) -> Result<Appointment> {
        if time_slot.trim().is_empty() {
            return Err(DomainError::EmptyField("time_slot").into());
        }
        Ok(self
            .appointments
            .set_date(appointment_id, date, time_slot)
            .await?)
    }

    pub async fn seller_balance(&self, seller_id: UserId) -> Result<Money> {
        Ok(self.ledger.balance(seller_id).await?)
    }

    /// Withdraws from a seller's balance and returns the new balance.
    #[tracing::instrument(skip(self))]
    pub async fn withdraw(
        &self,
        seller_id: UserId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Money> {
        if !amount.is_positive() {
            return Err(DomainError::InvalidAmount(amount.cents()).into());
        }
        if payment_method.trim().is_empty() {
            return Err(DomainError::EmptyField("payment_method").into());
        }

        self.ledger.debit(seller_id, payment_method, amount).await?;
        let balance = self.ledger.balance(seller_id).await?;
        tracing::info!(%amount, %balance, "seller withdrawal");
        Ok(balance)
    }

    pub async fn transactions(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        Ok(self.ledger.transactions(seller_id).await?)
    }
}
