//! HTTP API server for the marketplace fulfillment and payment pipeline.
//!
//! Exposes order placement, appointment scheduling, the seller ledger,
//! charge creation, gateway webhooks and a live charge status stream (SSE),
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, InMemoryBackends, Stores};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route(
            "/orders/{id}",
            get(routes::orders::get)
                .put(routes::orders::update)
                .delete(routes::orders::delete),
        )
        .route("/orders/{id}/status", patch(routes::orders::update_status))
        .route(
            "/orders/{id}/appointment",
            get(routes::appointments::get_by_order),
        )
        .route("/users/{user_id}/orders", get(routes::orders::list_by_user))
        .route("/appointments/{id}", get(routes::appointments::get))
        .route("/appointments/{id}/place", put(routes::appointments::set_place))
        .route("/appointments/{id}/date", put(routes::appointments::set_date))
        .route("/sellers/{id}/balance", get(routes::sellers::balance))
        .route(
            "/sellers/{id}/transactions",
            get(routes::sellers::transactions),
        )
        .route("/sellers/{id}/withdraw", post(routes::sellers::withdraw))
        .route("/charges", post(routes::charges::create))
        .route("/charges/{id}", get(routes::charges::get))
        .route("/charges/{id}/stream", get(routes::charges::stream))
        .route("/webhooks/payment", post(routes::webhooks::payment))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
