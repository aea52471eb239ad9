//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, Config, InMemoryBackends};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use domain::{Money, Product};
use futures_util::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use payments::{HubConfig, InMemoryPaymentGateway};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    backends: InMemoryBackends,
    gateway: InMemoryPaymentGateway,
    buyer: UserId,
    seller: UserId,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// P1 costs 5.00 with 2 in stock, P2 costs 10.00 with 10 in stock.
    async fn with_config(config: Config) -> Self {
        let backends = InMemoryBackends::new();
        backends
            .inventory
            .seed_product(Product::new("P1", "Lamp", Money::from_units(5), 2))
            .await;
        backends
            .inventory
            .seed_product(Product::new("P2", "Chair", Money::from_units(10), 10))
            .await;

        let gateway = InMemoryPaymentGateway::new();
        let state = Arc::new(AppState::new(
            backends.stores(),
            Arc::new(gateway.clone()),
            &config,
        ));

        Self {
            router: api::create_app(state, get_metrics_handle()),
            backends,
            gateway,
            buyer: UserId::new(),
            seller: UserId::new(),
        }
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    fn order_body(&self, items: Value) -> Value {
        json!({
            "line_items": items,
            "buyer_id": self.buyer.to_string(),
            "seller_id": self.seller.to_string(),
            "buyer_name": "Alice",
            "seller_name": "Bob",
            "payment_method": "card"
        })
    }

    async fn place_order(&self, items: Value) -> Value {
        let (status, order) = self
            .send("POST", "/orders", Some(self.order_body(items)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }

    async fn create_charge(&self) -> String {
        let (status, charge) = self
            .send(
                "POST",
                "/charges",
                Some(json!({ "amount_cents": 10000, "token": "tokn_test_1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{charge}");
        charge["id"].as_str().unwrap().to_string()
    }
}

fn webhook(charge_id: &str, status: &str) -> Value {
    json!({ "key": "charge.complete", "data": { "id": charge_id, "status": status } })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint_renders_text() {
    let app = TestApp::new().await;
    app.place_order(json!([{ "product_id": "P2", "quantity": 1 }]))
        .await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_create_order_prices_and_links_appointment() {
    let app = TestApp::new().await;

    let order = app
        .place_order(json!([
            { "product_id": "P1", "quantity": 1 },
            { "product_id": "P2", "quantity": 2 }
        ]))
        .await;

    assert_eq!(order["total_price_cents"], 2500);
    assert_eq!(order["status"], 0);
    assert_eq!(order["line_items"][1]["unit_price_cents"], 1000);

    let order_id = order["id"].as_str().unwrap();
    let (status, appointment) = app
        .send("GET", &format!("/orders/{order_id}/appointment"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appointment["id"], order["appointment_id"]);
    assert_eq!(appointment["order_id"], order["id"]);

    let (status, fetched) = app.send("GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    assert_eq!(
        app.backends
            .inventory
            .stock_of(&"P2".into())
            .await,
        Some(8)
    );
}

#[tokio::test]
async fn test_create_order_rejections() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            "POST",
            "/orders",
            Some(app.order_body(json!([{ "product_id": "P1", "quantity": 3 }]))),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient stock"));

    let (status, _) = app
        .send(
            "POST",
            "/orders",
            Some(app.order_body(json!([{ "product_id": "NOPE", "quantity": 1 }]))),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("POST", "/orders", Some(app.order_body(json!([]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_buyer = app.order_body(json!([{ "product_id": "P1", "quantity": 1 }]));
    bad_buyer["buyer_id"] = json!("not-a-uuid");
    let (status, body) = app.send("POST", "/orders", Some(bad_buyer)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("buyer_id"));

    let (status, body) = app
        .send("POST", "/orders", Some(json!({ "line_items": "oops" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Nothing was written by any of the rejected requests.
    assert_eq!(app.backends.orders.count().await, 0);
    assert_eq!(app.backends.appointments.count().await, 0);
    assert_eq!(app.backends.inventory.stock_of(&"P1".into()).await, Some(2));
}

#[tokio::test]
async fn test_failed_persist_is_compensated() {
    let app = TestApp::new().await;
    app.backends.orders.set_fail_on_create(true).await;

    let (status, _) = app
        .send(
            "POST",
            "/orders",
            Some(app.order_body(json!([{ "product_id": "P1", "quantity": 2 }]))),
        )
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.backends.inventory.stock_of(&"P1".into()).await, Some(2));
    assert_eq!(app.backends.appointments.count().await, 0);

    let (status, balance) = app
        .send("GET", &format!("/sellers/{}/balance", app.seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance_cents"], 0);
}

#[tokio::test]
async fn test_status_progression() {
    let app = TestApp::new().await;
    let order = app
        .place_order(json!([{ "product_id": "P2", "quantity": 1 }]))
        .await;
    let uri = format!("/orders/{}/status", order["id"].as_str().unwrap());

    let (status, _) = app.send("PATCH", &uri, Some(json!({ "status": 3 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    for code in [1, 2, 3] {
        let (status, body) = app
            .send("PATCH", &uri, Some(json!({ "status": code })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], code);
    }
    let (_, body) = app.send("PATCH", &uri, Some(json!({ "status": 3 }))).await;
    assert_eq!(body["status_name"], "COMPLETED");

    let (status, _) = app.send("PATCH", &uri, Some(json!({ "status": 7 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = format!("/orders/{}/status", uuid::Uuid::new_v4());
    let (status, _) = app
        .send("PATCH", &missing, Some(json!({ "status": 1 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_orders_by_user_role() {
    let app = TestApp::new().await;
    app.place_order(json!([{ "product_id": "P2", "quantity": 1 }]))
        .await;
    app.place_order(json!([{ "product_id": "P2", "quantity": 2 }]))
        .await;

    let (status, as_buyer) = app
        .send("GET", &format!("/users/{}/orders?role=buyer", app.buyer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_buyer.as_array().unwrap().len(), 2);
    assert_eq!(as_buyer[0]["total_price_cents"], 1000);

    let (_, as_seller_wrong_side) = app
        .send("GET", &format!("/users/{}/orders?role=seller", app.buyer), None)
        .await;
    assert!(as_seller_wrong_side.as_array().unwrap().is_empty());

    let (status, _) = app
        .send("GET", &format!("/users/{}/orders?role=admin", app.buyer), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("GET", &format!("/users/{}/orders", app.buyer), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_order() {
    let app = TestApp::new().await;
    let order = app
        .place_order(json!([{ "product_id": "P2", "quantity": 1 }]))
        .await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, updated) = app
        .send(
            "PUT",
            &uri,
            Some(json!({ "buyer_name": "Alice B.", "payment_method": "cash" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["buyer_name"], "Alice B.");
    assert_eq!(updated["payment_method"], "cash");
    assert_eq!(updated["seller_name"], "Bob");

    let (status, _) = app
        .send("PUT", &uri, Some(json!({ "payment_method": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send("DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The appointment outlives the order.
    let (status, _) = app
        .send(
            "GET",
            &format!("/appointments/{}", order["appointment_id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_schedule_appointment() {
    let app = TestApp::new().await;
    let order = app
        .place_order(json!([{ "product_id": "P2", "quantity": 1 }]))
        .await;
    let appointment = order["appointment_id"].as_str().unwrap();

    let (status, body) = app
        .send(
            "PUT",
            &format!("/appointments/{appointment}/place"),
            Some(json!({
                "address": "1 Main Rd",
                "city": "Bangkok",
                "province": "Bangkok",
                "postal_code": "10110"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "Bangkok");
    assert_eq!(body["scheduled"], false);

    let (status, body) = app
        .send(
            "PUT",
            &format!("/appointments/{appointment}/date"),
            Some(json!({ "date": "2026-11-02", "time_slot": "10:00-11:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2026-11-02");
    assert_eq!(body["scheduled"], true);

    let (status, _) = app
        .send(
            "PUT",
            &format!("/appointments/{appointment}/date"),
            Some(json!({ "date": "2026-11-02", "time_slot": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send("GET", &format!("/appointments/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_seller_ledger_and_withdraw() {
    let app = TestApp::new().await;
    app.place_order(json!([{ "product_id": "P2", "quantity": 3 }]))
        .await;
    let seller = app.seller;

    let (_, balance) = app
        .send("GET", &format!("/sellers/{seller}/balance"), None)
        .await;
    assert_eq!(balance["balance_cents"], 3000);

    let (status, body) = app
        .send(
            "POST",
            &format!("/sellers/{seller}/withdraw"),
            Some(json!({ "amount_cents": 5000, "payment_method": "bank" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient balance"));

    let (status, body) = app
        .send(
            "POST",
            &format!("/sellers/{seller}/withdraw"),
            Some(json!({ "amount_cents": 1000, "payment_method": "bank" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_cents"], 2000);

    let (status, _) = app
        .send(
            "POST",
            &format!("/sellers/{seller}/withdraw"),
            Some(json!({ "amount_cents": 0, "payment_method": "bank" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, transactions) = app
        .send("GET", &format!("/sellers/{seller}/transactions"), None)
        .await;
    let kinds: Vec<&str> = transactions
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["credit", "debit"]);

    let (status, _) = app
        .send("GET", &format!("/sellers/{}/balance", UserId::new()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_and_get_charge() {
    let app = TestApp::new().await;
    let order_id = uuid::Uuid::new_v4().to_string();

    let (status, charge) = app
        .send(
            "POST",
            "/charges",
            Some(json!({ "amount_cents": 10000, "token": "tokn_1", "order_id": order_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(charge["status"], "pending");
    assert_eq!(charge["currency"], "thb");
    assert_eq!(charge["order_id"], order_id.as_str());

    let (status, fetched) = app
        .send("GET", &format!("/charges/{}", charge["id"].as_str().unwrap()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["amount_cents"], 10000);

    let (status, _) = app.send("GET", "/charges/chrg_missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_charge_failures() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(
            "POST",
            "/charges",
            Some(json!({ "amount_cents": 0, "token": "tokn_1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.gateway.set_reject(true);
    let (status, body) = app
        .send(
            "POST",
            "/charges",
            Some(json!({ "amount_cents": 100, "token": "tokn_1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("rejected"));

    app.gateway.set_reject(false);
    app.gateway.set_unavailable(true);
    let (status, _) = app
        .send(
            "POST",
            "/charges",
            Some(json!({ "amount_cents": 100, "token": "tokn_1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(app.backends.charges.count().await, 0);
}

#[tokio::test]
async fn test_webhook_updates_charge() {
    let app = TestApp::new().await;
    let charge_id = app.create_charge().await;

    let (status, body) = app
        .send(
            "POST",
            "/webhooks/payment",
            Some(webhook(&charge_id, "successful")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "successful");
    assert_eq!(body["delivered"], 0);

    let (_, charge) = app
        .send("GET", &format!("/charges/{charge_id}"), None)
        .await;
    assert_eq!(charge["status"], "successful");

    // A late failure does not overwrite the settled outcome.
    let (status, body) = app
        .send("POST", "/webhooks/payment", Some(webhook(&charge_id, "failed")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "successful");
    assert_eq!(body["delivered"], 0);
}

#[tokio::test]
async fn test_webhook_rejections_change_nothing() {
    let app = TestApp::new().await;
    let charge_id = app.create_charge().await;

    let cases = [
        (json!({}), StatusCode::BAD_REQUEST),
        (json!({ "data": { "id": charge_id } }), StatusCode::BAD_REQUEST),
        (json!({ "data": { "status": "successful" } }), StatusCode::BAD_REQUEST),
        (webhook(&charge_id, "refunded"), StatusCode::BAD_REQUEST),
        (webhook("chrg_unknown", "successful"), StatusCode::NOT_FOUND),
    ];
    for (payload, expected) in cases {
        let (status, body) = app
            .send("POST", "/webhooks/payment", Some(payload.clone()))
            .await;
        assert_eq!(status, expected, "payload {payload}");
        assert!(body["error"].is_string());
    }

    let (status, body) = app
        .send("POST", "/webhooks/payment", Some(json!({ "data": {} })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid webhook data: missing status");

    let (status, body) = app
        .send("POST", "/webhooks/payment", Some(webhook(&charge_id, "pending")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");

    let (_, charge) = app
        .send("GET", &format!("/charges/{charge_id}"), None)
        .await;
    assert_eq!(charge["status"], "pending");
}

#[tokio::test]
async fn test_status_stream_delivers_webhook_update() {
    let app = TestApp::new().await;
    let charge_id = app.create_charge().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/charges/{charge_id}/stream"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let (status, body) = app
        .send("POST", "/webhooks/payment", Some(webhook(&charge_id, "successful")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], 1);

    let mut frames = response.into_body().into_data_stream();
    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .expect("no event within timeout")
            .expect("stream ended")
            .unwrap();
        received.push_str(std::str::from_utf8(&chunk).unwrap());
    }
    assert_eq!(received, "data: successful\n\n");

    // Closing the stream unregisters the subscriber.
    drop(frames);
    let (_, body) = app
        .send("POST", "/webhooks/payment", Some(webhook(&charge_id, "reversed")))
        .await;
    assert_eq!(body["status"], "reversed");
    assert_eq!(body["delivered"], 0);
}

#[tokio::test]
async fn test_status_stream_limits() {
    let config = Config {
        hub: HubConfig {
            max_subscribers_per_charge: 1,
            subscriber_buffer: 4,
        },
        ..Config::default()
    };
    let app = TestApp::with_config(config).await;
    let charge_id = app.create_charge().await;
    let uri = format!("/charges/{charge_id}/stream");

    let (status, _) = app.send("GET", "/charges/chrg_nope/stream", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let first = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let (status, body) = app.send("GET", &uri, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Too many subscribers"));

    drop(first);
    let second = app
        .router
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
}
