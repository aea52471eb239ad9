//! Payment gateway adapter.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::ChargeId;
use domain::{Charge, ChargeStatus, Money};
use serde::Deserialize;

use crate::error::{PaymentError, Result};

pub const DEFAULT_GATEWAY_URL: &str = "https://api.omise.co";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// What the gateway needs to create a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub amount: Money,
    /// Lowercase ISO currency code.
    pub currency: String,
    /// Card token obtained client-side.
    pub token: String,
}

/// External payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a charge. The returned charge is usually `Pending`; the final
    /// outcome arrives later through a webhook.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge> {
        (**self).create_charge(request).await
    }
}

/// Connection settings for [`OmiseGateway`].
#[derive(Debug, Clone)]
pub struct OmiseConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl OmiseConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: secret_key.into(),
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OmiseCharge {
    id: String,
    amount: i64,
    currency: String,
    status: String,
}

/// Omise REST client: form-encoded `POST {base_url}/charges` with HTTP basic
/// auth (secret key as user, empty password).
#[derive(Debug, Clone)]
pub struct OmiseGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl OmiseGateway {
    pub fn new(config: OmiseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key,
        })
    }

    fn parse_charge(body: serde_json::Value) -> Result<Charge> {
        if body["object"].as_str() == Some("error") {
            let code = body["code"].as_str().unwrap_or("unknown");
            let message = body["message"].as_str().unwrap_or("no message");
            return Err(PaymentError::Rejected(format!("{code}: {message}")));
        }

        let charge: OmiseCharge = serde_json::from_value(body)
            .map_err(|e| PaymentError::Upstream(format!("malformed charge response: {e}")))?;
        let status: ChargeStatus = charge
            .status
            .parse()
            .map_err(|_| PaymentError::Upstream(format!("unexpected charge status {}", charge.status)))?;

        Ok(Charge::new(
            ChargeId::new(charge.id),
            Money::from_cents(charge.amount),
            charge.currency,
            status,
        ))
    }
}

#[async_trait]
impl PaymentGateway for OmiseGateway {
    #[tracing::instrument(skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge> {
        let amount = request.amount.cents().to_string();
        let response = self
            .client
            .post(format!("{}/charges", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("card", request.token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PaymentError::Upstream(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            PaymentError::Upstream(format!("unreadable gateway response ({status}): {e}"))
        })?;

        if status.is_server_error() && body["object"].as_str() != Some("error") {
            return Err(PaymentError::Upstream(format!("gateway answered {status}")));
        }

        let charge = Self::parse_charge(body)?;
        tracing::info!(charge_id = %charge.id, status = %charge.status, "charge created");
        Ok(charge)
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    requests: Vec<ChargeRequest>,
    next_id: u32,
    reject: bool,
    unavailable: bool,
}

/// In-memory gateway for local runs and tests. Every accepted charge comes
/// back `Pending` with an id of the form `chrg_test_000001`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the gateway decline every charge.
    pub fn set_reject(&self, reject: bool) {
        self.lock().reject = reject;
    }

    /// Makes the gateway behave as if it cannot be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Requests that were accepted, in order.
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.lock().requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<Charge> {
        let mut state = self.lock();
        if state.unavailable {
            return Err(PaymentError::Upstream("gateway unreachable".to_string()));
        }
        if state.reject {
            return Err(PaymentError::Rejected(
                "invalid_card: card was declined".to_string(),
            ));
        }

        state.next_id += 1;
        let id = ChargeId::new(format!("chrg_test_{:06}", state.next_id));
        state.requests.push(request.clone());

        Ok(Charge::new(
            id,
            request.amount,
            request.currency.clone(),
            ChargeStatus::Pending,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ChargeRequest {
        ChargeRequest {
            amount: Money::from_units(100),
            currency: "thb".to_string(),
            token: "tokn_test_123".to_string(),
        }
    }

    #[test]
    fn parse_charge_maps_fields() {
        let charge = OmiseGateway::parse_charge(json!({
            "object": "charge",
            "id": "chrg_test_5xyz",
            "amount": 10000,
            "currency": "thb",
            "status": "pending",
            "paid": false
        }))
        .unwrap();

        assert_eq!(charge.id.as_str(), "chrg_test_5xyz");
        assert_eq!(charge.amount, Money::from_units(100));
        assert_eq!(charge.status, ChargeStatus::Pending);
    }

    #[test]
    fn parse_charge_maps_error_object_to_rejected() {
        let err = OmiseGateway::parse_charge(json!({
            "object": "error",
            "code": "invalid_card",
            "message": "card was declined"
        }))
        .unwrap_err();

        assert!(matches!(err, PaymentError::Rejected(ref m) if m == "invalid_card: card was declined"));
    }

    #[test]
    fn parse_charge_rejects_unknown_status() {
        let err = OmiseGateway::parse_charge(json!({
            "id": "chrg_1",
            "amount": 100,
            "currency": "thb",
            "status": "weird"
        }))
        .unwrap_err();
        assert!(matches!(err, PaymentError::Upstream(_)));
    }

    #[tokio::test]
    async fn in_memory_gateway_issues_sequential_pending_charges() {
        let gateway = InMemoryPaymentGateway::new();

        let first = gateway.create_charge(&request()).await.unwrap();
        let second = gateway.create_charge(&request()).await.unwrap();

        assert_eq!(first.id.as_str(), "chrg_test_000001");
        assert_eq!(second.id.as_str(), "chrg_test_000002");
        assert_eq!(first.status, ChargeStatus::Pending);
        assert_eq!(gateway.requests().len(), 2);
    }

    #[tokio::test]
    async fn in_memory_gateway_failure_modes() {
        let gateway = InMemoryPaymentGateway::new();

        gateway.set_reject(true);
        assert!(matches!(
            gateway.create_charge(&request()).await,
            Err(PaymentError::Rejected(_))
        ));

        gateway.set_reject(false);
        gateway.set_unavailable(true);
        assert!(matches!(
            gateway.create_charge(&request()).await,
            Err(PaymentError::Upstream(_))
        ));
        assert!(gateway.requests().is_empty());
    }
}
