//! API server entry point.

use std::sync::Arc;

use api::{AppState, Config, InMemoryBackends, Stores};
use payments::{InMemoryPaymentGateway, OmiseConfig, OmiseGateway, PaymentGateway};
use sqlx::postgres::PgPoolOptions;
use store::PostgresStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn connect_stores(config: &Config) -> Result<Stores, Box<dyn std::error::Error>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, using in-memory stores");
        return Ok(InMemoryBackends::new().stores());
    };

    let pool = PgPoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect(url)
        .await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("connected to PostgreSQL, migrations applied");

    Ok(Stores::postgres(store))
}

fn payment_gateway(config: &Config) -> Result<Arc<dyn PaymentGateway>, Box<dyn std::error::Error>> {
    match config.gateway_secret_key.as_deref() {
        Some(secret_key) => {
            let gateway = OmiseGateway::new(OmiseConfig {
                base_url: config.gateway_url.clone(),
                secret_key: secret_key.to_string(),
                timeout: config.gateway_timeout,
            })?;
            tracing::info!(url = %config.gateway_url, "using Omise payment gateway");
            Ok(Arc::new(gateway))
        }
        None => {
            tracing::warn!("PAYMENT_GATEWAY_SECRET_KEY not set, using in-memory payment gateway");
            Ok(Arc::new(InMemoryPaymentGateway::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?config, "configuration loaded");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Wire stores, gateway and orchestrators
    let stores = connect_stores(&config).await?;
    let gateway = payment_gateway(&config)?;
    let state = Arc::new(AppState::new(stores, gateway, &config));

    // 4. Build the application
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}
