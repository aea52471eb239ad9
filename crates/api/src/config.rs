//! Application configuration loaded from environment variables.

use std::time::Duration;

use payments::HubConfig;
use payments::gateway::{DEFAULT_GATEWAY_TIMEOUT, DEFAULT_GATEWAY_URL};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory stores
/// - `PAYMENT_GATEWAY_URL`: gateway base URL (default `https://api.omise.co`)
/// - `PAYMENT_GATEWAY_SECRET_KEY`: gateway secret; unset means in-memory gateway
/// - `PAYMENT_GATEWAY_TIMEOUT_SECS`: gateway round-trip timeout (default `30`)
/// - `PAYMENT_CURRENCY`: currency for charges that name none (default `thb`)
/// - `HUB_MAX_SUBSCRIBERS_PER_CHARGE`: live subscribers per charge (default `16`)
/// - `HUB_SUBSCRIBER_BUFFER`: buffered updates per subscriber (default `8`)
/// - `SSE_KEEP_ALIVE_SECS`: keep-alive interval of status streams (default `15`)
///
/// Unparseable numbers fall back to their default.
#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub gateway_url: String,
    pub gateway_secret_key: Option<String>,
    pub gateway_timeout: Duration,
    pub currency: String,
    pub hub: HubConfig,
    pub sse_keep_alive: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str| non_empty(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty("DATABASE_URL"),
            gateway_url: non_empty("PAYMENT_GATEWAY_URL").unwrap_or(defaults.gateway_url),
            gateway_secret_key: non_empty("PAYMENT_GATEWAY_SECRET_KEY"),
            gateway_timeout: number("PAYMENT_GATEWAY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.gateway_timeout),
            currency: non_empty("PAYMENT_CURRENCY")
                .map(|c| c.trim().to_lowercase())
                .unwrap_or(defaults.currency),
            hub: HubConfig {
                max_subscribers_per_charge: number("HUB_MAX_SUBSCRIBERS_PER_CHARGE")
                    .filter(|&n| n > 0)
                    .map(|n| n as usize)
                    .unwrap_or(defaults.hub.max_subscribers_per_charge),
                subscriber_buffer: number("HUB_SUBSCRIBER_BUFFER")
                    .filter(|&n| n > 0)
                    .map(|n| n as usize)
                    .unwrap_or(defaults.hub.subscriber_buffer),
            },
            sse_keep_alive: number("SSE_KEEP_ALIVE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sse_keep_alive),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_secret_key: None,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            currency: domain::DEFAULT_CURRENCY.to_string(),
            hub: HubConfig::default(),
            sse_keep_alive: Duration::from_secs(15),
        }
    }
}

// Keeps credentials out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("gateway_url", &self.gateway_url)
            .field(
                "gateway_secret_key",
                &self.gateway_secret_key.as_ref().map(|_| "<set>"),
            )
            .field("gateway_timeout", &self.gateway_timeout)
            .field("currency", &self.currency)
            .field("hub", &self.hub)
            .field("sse_keep_alive", &self.sse_keep_alive)
            .finish()
    }
}
