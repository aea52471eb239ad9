//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use common::{AppointmentId, ChargeId, OrderId, UserId};
use domain::{
    Charge, ChargeStatus, LineItem, Location, Money, NewOrder, Order, OrderStatus, OrderUpdate,
    Product, ProductId, RequestedItem, TransactionKind, UserRole,
};
use sqlx::PgPool;
use store::{
    AppointmentGateway, ChargeStore, InventoryGateway, LedgerGateway, OrderStore, PostgresStore,
    StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// A store with its own pool and emptied tables.
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE products, seller_transactions, sellers, appointments, orders, charges",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

fn sample_order(buyer_id: UserId, seller_id: UserId) -> Order {
    let request = NewOrder {
        line_items: vec![RequestedItem::new("P1", 2)],
        buyer_id,
        seller_id,
        buyer_name: "Bee".to_string(),
        seller_name: "Sam".to_string(),
        payment_method: "card".to_string(),
    };
    Order::place(
        OrderId::new(),
        &request,
        vec![LineItem::new("P1", 2, Money::from_cents(1250))],
        AppointmentId::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_product_round_trip_and_guarded_decrement() {
    let store = get_test_store().await;
    let id = ProductId::new("P1");
    store
        .seed_product(&Product::new("P1", "Lamp", Money::from_units(10), 3))
        .await
        .unwrap();

    let product = store.get_product(&id).await.unwrap();
    assert_eq!(product.price, Money::from_units(10));
    assert_eq!(product.stock, 3);

    store.decrement_stock(&id, 2).await.unwrap();
    let err = store.decrement_stock(&id, 2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));

    store.restock(&id, 2).await.unwrap();
    assert_eq!(store.get_product(&id).await.unwrap().stock, 3);
}

#[tokio::test]
async fn test_decrement_unknown_product_is_not_found() {
    let store = get_test_store().await;
    let err = store
        .decrement_stock(&ProductId::new("ghost"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(_)));
}

#[tokio::test]
async fn test_concurrent_decrements_never_oversell() {
    let store = get_test_store().await;
    store
        .seed_product(&Product::new("P1", "Lamp", Money::from_units(10), 5))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.decrement_stock(&ProductId::new("P1"), 1).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(
        store.get_product(&ProductId::new("P1")).await.unwrap().stock,
        0
    );
}

#[tokio::test]
async fn test_ledger_credit_debit_and_history() {
    let store = get_test_store().await;
    let seller = UserId::new();
    let order_id = OrderId::new();

    store
        .credit(seller, order_id, "card", Money::from_units(30))
        .await
        .unwrap();
    store
        .debit(seller, "bank", Money::from_units(10))
        .await
        .unwrap();

    assert_eq!(store.balance(seller).await.unwrap(), Money::from_units(20));

    let err = store
        .debit(seller, "bank", Money::from_units(21))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientBalance { .. }));
    assert_eq!(store.balance(seller).await.unwrap(), Money::from_units(20));

    let txs = store.transactions(seller).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].kind, TransactionKind::Credit);
    assert_eq!(txs[0].order_id, Some(order_id));
    assert_eq!(txs[1].kind, TransactionKind::Debit);
    assert_eq!(txs[1].order_id, None);
}

#[tokio::test]
async fn test_reverse_credit_appends_debit() {
    let store = get_test_store().await;
    let seller = UserId::new();
    let order_id = OrderId::new();
    store.seed_seller(seller, Money::from_units(5)).await.unwrap();

    store
        .credit(seller, order_id, "card", Money::from_units(30))
        .await
        .unwrap();
    store
        .reverse_credit(seller, order_id, "card", Money::from_units(30))
        .await
        .unwrap();

    assert_eq!(store.balance(seller).await.unwrap(), Money::from_units(5));
    let txs = store.transactions(seller).await.unwrap();
    assert_eq!(txs.last().unwrap().order_id, Some(order_id));
}

#[tokio::test]
async fn test_appointment_scheduling() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let appointment = AppointmentGateway::create(&store, order_id, UserId::new(), UserId::new())
        .await
        .unwrap();

    store
        .set_place(
            appointment.id,
            Location {
                address: "12 Market Rd".to_string(),
                city: "Chiang Mai".to_string(),
                province: "Chiang Mai".to_string(),
                postal_code: "50200".to_string(),
            },
        )
        .await
        .unwrap();
    store
        .set_date(
            appointment.id,
            NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            "14:00-15:00".to_string(),
        )
        .await
        .unwrap();

    let loaded = store.get_by_order(order_id).await.unwrap();
    assert_eq!(loaded.id, appointment.id);
    assert_eq!(loaded.location.city, "Chiang Mai");
    assert_eq!(loaded.time_slot.as_deref(), Some("14:00-15:00"));
    assert!(loaded.is_scheduled());

    AppointmentGateway::delete(&store, appointment.id)
        .await
        .unwrap();
    assert!(AppointmentGateway::get(&store, appointment.id).await.is_err());
}

#[tokio::test]
async fn test_order_persistence_and_queries() {
    let store = get_test_store().await;
    let buyer = UserId::new();
    let seller = UserId::new();

    let first = OrderStore::create(&store, sample_order(buyer, seller))
        .await
        .unwrap();
    let second = OrderStore::create(&store, sample_order(buyer, seller))
        .await
        .unwrap();

    let loaded = OrderStore::get(&store, first.id).await.unwrap().unwrap();
    assert_eq!(loaded.line_items, first.line_items);
    assert_eq!(loaded.total_price, Money::from_cents(2500));

    let as_buyer = store.get_by_user(buyer, UserRole::Buyer).await.unwrap();
    assert_eq!(
        as_buyer.iter().map(|o| o.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let updated = OrderStore::update(
        &store,
        first.id,
        &OrderUpdate {
            seller_name: Some("Samantha".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.seller_name, "Samantha");
    assert_eq!(updated.buyer_name, "Bee");

    OrderStore::delete(&store, second.id).await.unwrap();
    assert!(OrderStore::get(&store, second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_order_status_transitions_are_enforced() {
    let store = get_test_store().await;
    let order = OrderStore::create(&store, sample_order(UserId::new(), UserId::new()))
        .await
        .unwrap();

    let err = OrderStore::update_status(&store, order.id, OrderStatus::LocationAccepted)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    for status in [
        OrderStatus::LocationProposed,
        OrderStatus::LocationAccepted,
        OrderStatus::Completed,
    ] {
        let next = OrderStore::update_status(&store, order.id, status)
            .await
            .unwrap();
        assert_eq!(next, status);
    }
}

#[tokio::test]
async fn test_charge_insert_update_and_duplicate() {
    let store = get_test_store().await;
    let id = ChargeId::new("chrg_test_pg");
    let order_id = OrderId::new();

    ChargeStore::insert(
        &store,
        Charge::new(id.clone(), Money::from_units(100), "thb", ChargeStatus::Pending)
            .with_order(Some(order_id)),
    )
    .await
    .unwrap();

    let updated = ChargeStore::update_status(&store, &id, ChargeStatus::Successful)
        .await
        .unwrap();
    assert_eq!(updated.status, ChargeStatus::Successful);
    assert_eq!(updated.order_id, Some(order_id));

    let err = ChargeStore::update_status(&store, &id, ChargeStatus::Failed)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let stored = ChargeStore::get(&store, &id).await.unwrap().unwrap();
    assert_eq!(stored.status, ChargeStatus::Successful);

    let err = ChargeStore::insert(
        &store,
        Charge::new(id.clone(), Money::from_units(1), "thb", ChargeStatus::Pending),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateCharge(_)));

    let missing = ChargeStore::get(&store, &ChargeId::new("chrg_nope"))
        .await
        .unwrap();
    assert!(missing.is_none());
}
