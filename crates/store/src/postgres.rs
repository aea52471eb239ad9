use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{AppointmentId, ChargeId, OrderId, TransactionId, UserId};
use domain::{
    Appointment, Charge, ChargeStatus, DomainError, LineItem, Location, Money, Order, OrderStatus,
    OrderUpdate, Product, ProductId, Transaction, TransactionKind, UserRole,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::store::{AppointmentGateway, ChargeStore, InventoryGateway, LedgerGateway, OrderStore};
use crate::{Result, StoreError};

const ORDER_COLUMNS: &str = "id, status, line_items, buyer_id, buyer_name, seller_id, seller_name, \
     total_price_cents, appointment_id, payment_method, created_at";

const APPOINTMENT_COLUMNS: &str = "id, order_id, buyer_id, seller_id, address, city, province, \
     postal_code, date, time_slot, created_at";

const TRANSACTION_COLUMNS: &str =
    "id, seller_id, kind, amount_cents, order_id, payment_method, created_at";

const CHARGE_COLUMNS: &str = "id, amount_cents, currency, order_id, status, created_at, updated_at";

/// PostgreSQL-backed implementation of every store gateway.
///
/// Stock and balance changes are single guarded `UPDATE ... WHERE x >= $n`
/// statements, so concurrent callers can never drive either below zero.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts or replaces a product row.
    pub async fn seed_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price_cents = EXCLUDED.price_cents, stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(stock_param(&product.id, product.stock)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Opens (or resets) a seller account.
    pub async fn seed_seller(&self, seller_id: UserId, balance: Money) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sellers (id, balance_cents) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET balance_cents = EXCLUDED.balance_cents
            "#,
        )
        .bind(seller_id.as_uuid())
        .bind(balance.cents())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Guarded debit plus ledger row, inside one SQL transaction.
    async fn debit_in_tx(&self, tx: Transaction) -> Result<Transaction> {
        let mut db = self.pool.begin().await?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE sellers SET balance_cents = balance_cents - $2
            WHERE id = $1 AND balance_cents >= $2
            RETURNING balance_cents
            "#,
        )
        .bind(tx.seller_id.as_uuid())
        .bind(tx.amount.cents())
        .fetch_optional(&mut *db)
        .await?;

        if updated.is_none() {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT balance_cents FROM sellers WHERE id = $1")
                    .bind(tx.seller_id.as_uuid())
                    .fetch_optional(&mut *db)
                    .await?;

            tracing::warn!(
                seller_id = %tx.seller_id,
                requested = %tx.amount,
                ?available,
                "balance guard rejected debit"
            );
            return Err(match available {
                None => StoreError::SellerNotFound(tx.seller_id),
                Some(cents) => StoreError::InsufficientBalance {
                    seller_id: tx.seller_id,
                    requested: tx.amount,
                    available: Money::from_cents(cents),
                },
            });
        }

        insert_transaction(&mut db, &tx).await?;
        db.commit().await?;
        Ok(tx)
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let id: String = row.try_get("id")?;
        let stock: i32 = row.try_get("stock")?;
        Ok(Product {
            stock: u32::try_from(stock)
                .map_err(|_| StoreError::CorruptRow(format!("negative stock for {id}")))?,
            id: ProductId::new(id),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<Transaction> {
        let kind: String = row.try_get("kind")?;
        Ok(Transaction {
            id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            kind: TransactionKind::parse(&kind)
                .ok_or_else(|| StoreError::CorruptRow(format!("transaction kind {kind}")))?,
            amount: Money::from_cents(row.try_get("amount_cents")?),
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            payment_method: row.try_get("payment_method")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_appointment(row: PgRow) -> Result<Appointment> {
        Ok(Appointment {
            id: AppointmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            location: Location {
                address: row.try_get("address")?,
                city: row.try_get("city")?,
                province: row.try_get("province")?,
                postal_code: row.try_get("postal_code")?,
            },
            date: row.try_get("date")?,
            time_slot: row.try_get("time_slot")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let line_items: serde_json::Value = row.try_get("line_items")?;
        let line_items: Vec<LineItem> = serde_json::from_value(line_items)?;
        let status: i16 = row.try_get("status")?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            status: OrderStatus::try_from(status)?,
            line_items,
            buyer_id: UserId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            buyer_name: row.try_get("buyer_name")?,
            seller_id: UserId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            seller_name: row.try_get("seller_name")?,
            total_price: Money::from_cents(row.try_get("total_price_cents")?),
            appointment_id: AppointmentId::from_uuid(row.try_get::<Uuid, _>("appointment_id")?),
            payment_method: row.try_get("payment_method")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_charge(row: PgRow) -> Result<Charge> {
        let status: String = row.try_get("status")?;
        Ok(Charge {
            id: ChargeId::new(row.try_get::<String, _>("id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            currency: row.try_get("currency")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn stock_param(product_id: &ProductId, quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| {
        StoreError::Domain(DomainError::InvalidQuantity {
            product_id: product_id.clone(),
            quantity,
        })
    })
}

async fn insert_transaction(
    db: &mut sqlx::Transaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO seller_transactions (id, seller_id, kind, amount_cents, order_id, payment_method, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(tx.id.as_uuid())
    .bind(tx.seller_id.as_uuid())
    .bind(tx.kind.as_str())
    .bind(tx.amount.cents())
    .bind(tx.order_id.map(|id| id.as_uuid()))
    .bind(&tx.payment_method)
    .bind(tx.created_at)
    .execute(&mut **db)
    .await?;
    Ok(())
}

#[async_trait]
impl InventoryGateway for PostgresStore {
    async fn get_product(&self, product_id: &ProductId) -> Result<Product> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        Self::row_to_product(row)
    }

    async fn decrement_stock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let qty = stock_param(product_id, quantity)?;

        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = stock - $2
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(qty)
        .fetch_optional(&self.pool)
        .await?;

        if remaining.is_some() {
            return Ok(());
        }

        // Nothing updated: either the product is gone or the guard failed.
        let product = self.get_product(product_id).await?;
        tracing::warn!(
            %product_id,
            requested = quantity,
            available = product.stock,
            "stock guard rejected decrement"
        );
        Err(StoreError::InsufficientStock {
            product_id: product_id.clone(),
            requested: quantity,
            available: product.stock,
        })
    }

    async fn restock(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
            .bind(product_id.as_str())
            .bind(stock_param(product_id, quantity)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for PostgresStore {
    async fn credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        let tx = Transaction::credit(seller_id, order_id, payment_method, amount);
        let mut db = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sellers (id, balance_cents) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET balance_cents = sellers.balance_cents + EXCLUDED.balance_cents
            "#,
        )
        .bind(seller_id.as_uuid())
        .bind(amount.cents())
        .execute(&mut *db)
        .await?;

        insert_transaction(&mut db, &tx).await?;
        db.commit().await?;
        Ok(tx)
    }

    async fn debit(
        &self,
        seller_id: UserId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        self.debit_in_tx(Transaction::debit(seller_id, None, payment_method, amount))
            .await
    }

    async fn reverse_credit(
        &self,
        seller_id: UserId,
        order_id: OrderId,
        payment_method: &str,
        amount: Money,
    ) -> Result<Transaction> {
        self.debit_in_tx(Transaction::debit(
            seller_id,
            Some(order_id),
            payment_method,
            amount,
        ))
        .await
    }

    async fn balance(&self, seller_id: UserId) -> Result<Money> {
        let cents: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM sellers WHERE id = $1")
                .bind(seller_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        cents
            .map(Money::from_cents)
            .ok_or(StoreError::SellerNotFound(seller_id))
    }

    async fn transactions(&self, seller_id: UserId) -> Result<Vec<Transaction>> {
        // Surfaces SellerNotFound for unknown sellers.
        self.balance(seller_id).await?;

        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM seller_transactions WHERE seller_id = $1 ORDER BY seq"
        ))
        .bind(seller_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_transaction).collect()
    }
}

#[async_trait]
impl AppointmentGateway for PostgresStore {
    async fn create(
        &self,
        order_id: OrderId,
        buyer_id: UserId,
        seller_id: UserId,
    ) -> Result<Appointment> {
        let appointment = Appointment::new(order_id, buyer_id, seller_id);
        sqlx::query(
            r#"
            INSERT INTO appointments (id, order_id, buyer_id, seller_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(appointment.id.as_uuid())
        .bind(order_id.as_uuid())
        .bind(buyer_id.as_uuid())
        .bind(seller_id.as_uuid())
        .bind(appointment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(appointment)
    }

    async fn get(&self, appointment_id: AppointmentId) -> Result<Appointment> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(appointment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::AppointmentNotFound(appointment_id))?;
        Self::row_to_appointment(row)
    }

    async fn get_by_order(&self, order_id: OrderId) -> Result<Appointment> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;
        Self::row_to_appointment(row)
    }

    async fn set_place(
        &self,
        appointment_id: AppointmentId,
        location: Location,
    ) -> Result<Appointment> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE appointments
            SET address = $2, city = $3, province = $4, postal_code = $5
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        ))
        .bind(appointment_id.as_uuid())
        .bind(&location.address)
        .bind(&location.city)
        .bind(&location.province)
        .bind(&location.postal_code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::AppointmentNotFound(appointment_id))?;
        Self::row_to_appointment(row)
    }

    async fn set_date(
        &self,
        appointment_id: AppointmentId,
        date: NaiveDate,
        time_slot: String,
    ) -> Result<Appointment> {
        let mut appointment = AppointmentGateway::get(self, appointment_id).await?;
        appointment.set_date(date, time_slot)?;

        let result = sqlx::query("UPDATE appointments SET date = $2, time_slot = $3 WHERE id = $1")
            .bind(appointment_id.as_uuid())
            .bind(appointment.date)
            .bind(&appointment.time_slot)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AppointmentNotFound(appointment_id));
        }
        Ok(appointment)
    }

    async fn delete(&self, appointment_id: AppointmentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(appointment_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AppointmentNotFound(appointment_id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let line_items = serde_json::to_value(&order.line_items)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, status, line_items, buyer_id, buyer_name, seller_id, seller_name,
                                total_price_cents, appointment_id, payment_method, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.code())
        .bind(line_items)
        .bind(order.buyer_id.as_uuid())
        .bind(&order.buyer_name)
        .bind(order.seller_id.as_uuid())
        .bind(&order.seller_name)
        .bind(order.total_price.cents())
        .bind(order.appointment_id.as_uuid())
        .bind(&order.payment_method)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_order)
            .transpose()
    }

    async fn get_by_user(&self, user_id: UserId, role: UserRole) -> Result<Vec<Order>> {
        let column = match role {
            UserRole::Buyer => "buyer_id",
            UserRole::Seller => "seller_id",
        };

        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {column} = $1 ORDER BY seq"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn delete(&self, order_id: OrderId) -> Result<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn update(&self, order_id: OrderId, update: &OrderUpdate) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET
                buyer_name = COALESCE($2, buyer_name),
                seller_name = COALESCE($3, seller_name),
                payment_method = COALESCE($4, payment_method),
                appointment_id = COALESCE($5, appointment_id)
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(update.buyer_name.as_deref())
        .bind(update.seller_name.as_deref())
        .bind(update.payment_method.as_deref())
        .bind(update.appointment_id.map(|id| id.as_uuid()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;
        Self::row_to_order(row)
    }

    async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<OrderStatus> {
        let mut db = self.pool.begin().await?;

        let current: i16 = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *db)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let next = OrderStatus::try_from(current)?.transition_to(status)?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(next.code())
            .execute(&mut *db)
            .await?;

        db.commit().await?;
        Ok(next)
    }
}

#[async_trait]
impl ChargeStore for PostgresStore {
    async fn insert(&self, charge: Charge) -> Result<Charge> {
        sqlx::query(
            r#"
            INSERT INTO charges (id, amount_cents, currency, order_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(charge.id.as_str())
        .bind(charge.amount.cents())
        .bind(&charge.currency)
        .bind(charge.order_id.map(|id| id.as_uuid()))
        .bind(charge.status.as_str())
        .bind(charge.created_at)
        .bind(charge.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateCharge(charge.id.clone());
            }
            StoreError::Database(e)
        })?;

        Ok(charge)
    }

    async fn get(&self, charge_id: &ChargeId) -> Result<Option<Charge>> {
        sqlx::query(&format!("SELECT {CHARGE_COLUMNS} FROM charges WHERE id = $1"))
            .bind(charge_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Self::row_to_charge)
            .transpose()
    }

    async fn update_status(&self, charge_id: &ChargeId, status: ChargeStatus) -> Result<Charge> {
        let mut db = self.pool.begin().await?;

        let current: String =
            sqlx::query_scalar("SELECT status FROM charges WHERE id = $1 FOR UPDATE")
                .bind(charge_id.as_str())
                .fetch_optional(&mut *db)
                .await?
                .ok_or_else(|| StoreError::ChargeNotFound(charge_id.clone()))?;

        let next = current.parse::<ChargeStatus>()?.transition_to(status)?;

        let row = sqlx::query(&format!(
            "UPDATE charges SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {CHARGE_COLUMNS}"
        ))
        .bind(charge_id.as_str())
        .bind(next.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *db)
        .await?;

        db.commit().await?;
        Self::row_to_charge(row)
    }
}
