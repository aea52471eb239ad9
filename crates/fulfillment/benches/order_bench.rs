use common::UserId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Money, NewOrder, Product, RequestedItem};
use fulfillment::OrderOrchestrator;
use store::{InMemoryAppointments, InMemoryInventory, InMemoryLedger, InMemoryOrders};

fn request(buyer_id: UserId, seller_id: UserId) -> NewOrder {
    NewOrder {
        line_items: vec![RequestedItem::new("P1", 1), RequestedItem::new("P2", 2)],
        buyer_id,
        seller_id,
        buyer_name: "Bench Buyer".to_string(),
        seller_name: "Bench Seller".to_string(),
        payment_method: "card".to_string(),
    }
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let inventory = InMemoryInventory::new();
    rt.block_on(async {
        inventory
            .seed_product(Product::new("P1", "Lamp", Money::from_units(5), u32::MAX))
            .await;
        inventory
            .seed_product(Product::new("P2", "Chair", Money::from_units(10), u32::MAX))
            .await;
    });

    let orchestrator = OrderOrchestrator::new(
        inventory,
        InMemoryLedger::new(),
        InMemoryAppointments::new(),
        InMemoryOrders::new(),
    );
    let buyer = UserId::new();
    let seller = UserId::new();

    c.bench_function("fulfillment/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                orchestrator
                    .create_order(request(buyer, seller))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_compensated_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let inventory = InMemoryInventory::new();
    let orders = InMemoryOrders::new();
    rt.block_on(async {
        inventory
            .seed_product(Product::new("P1", "Lamp", Money::from_units(5), 1_000))
            .await;
        inventory
            .seed_product(Product::new("P2", "Chair", Money::from_units(10), 1_000))
            .await;
        orders.set_fail_on_create(true).await;
    });

    let orchestrator = OrderOrchestrator::new(
        inventory,
        InMemoryLedger::new(),
        InMemoryAppointments::new(),
        orders,
    );
    let buyer = UserId::new();
    let seller = UserId::new();

    c.bench_function("fulfillment/create_order_compensated", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = orchestrator.create_order(request(buyer, seller)).await;
                assert!(result.is_err());
            });
        });
    });
}

criterion_group!(benches, bench_create_order, bench_compensated_order);
criterion_main!(benches);
