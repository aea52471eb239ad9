//! The payment orchestrator.

use common::{ChargeId, OrderId};
use domain::{Charge, ChargeStatus, Money};
use serde_json::Value;
use store::ChargeStore;
use tokio::sync::Mutex;

use crate::error::{PaymentError, Result};
use crate::gateway::{ChargeRequest, PaymentGateway};
use crate::hub::{ChargeHub, Subscription};
use crate::webhook::WebhookEvent;

/// What a webhook did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The charge reached a terminal status. It was persisted, then
    /// broadcast to `delivered` subscribers.
    Updated { charge: Charge, delivered: usize },
    /// The status needs no action: still pending, a redelivery of the stored
    /// status, or a late event for an already settled charge. For the last
    /// two, `status` is the stored status.
    Acknowledged {
        charge_id: ChargeId,
        status: ChargeStatus,
    },
}

/// Creates charges through the gateway and turns gateway webhooks into
/// persisted status changes and live notifications.
pub struct PaymentOrchestrator<G, C>
where
    G: PaymentGateway,
    C: ChargeStore,
{
    gateway: G,
    charges: C,
    hub: ChargeHub,
    /// Held from the status check until the broadcast, so subscribers see
    /// updates in the order they were stored.
    settling: Mutex<()>,
}

impl<G, C> PaymentOrchestrator<G, C>
where
    G: PaymentGateway,
    C: ChargeStore,
{
    pub fn new(gateway: G, charges: C, hub: ChargeHub) -> Self {
        Self {
            gateway,
            charges,
            hub,
            settling: Mutex::new(()),
        }
    }

    pub fn hub(&self) -> &ChargeHub {
        &self.hub
    }

    /// Creates a charge with the gateway and records it.
    #[tracing::instrument(skip(self, token), fields(charge_id))]
    pub async fn create_charge(
        &self,
        amount: Money,
        currency: &str,
        token: &str,
        order_id: Option<OrderId>,
    ) -> Result<Charge> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidRequest(
                "amount must be positive".to_string(),
            ));
        }
        if currency.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("currency is required".to_string()));
        }
        if token.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("token is required".to_string()));
        }

        let request = ChargeRequest {
            amount,
            currency: currency.to_lowercase(),
            token: token.to_string(),
        };
        let charge = match self.gateway.create_charge(&request).await {
            Ok(charge) => charge.with_order(order_id),
            Err(e) => {
                metrics::counter!("charges_failed_total").increment(1);
                tracing::warn!(error = %e, "gateway refused charge");
                return Err(e);
            }
        };
        tracing::Span::current().record("charge_id", tracing::field::display(&charge.id));

        let charge = self.charges.insert(charge).await?;
        metrics::counter!("charges_created_total").increment(1);
        tracing::info!(status = %charge.status, "charge recorded");
        Ok(charge)
    }

    pub async fn get_charge(&self, charge_id: &ChargeId) -> Result<Charge> {
        self.charges
            .get(charge_id)
            .await?
            .ok_or_else(|| PaymentError::ChargeNotFound(charge_id.clone()))
    }

    /// Subscribes to status updates for a known charge.
    pub async fn subscribe(&self, charge_id: ChargeId) -> Result<Subscription> {
        self.get_charge(&charge_id).await?;
        Ok(self.hub.subscribe(charge_id)?)
    }

    /// Applies a gateway webhook.
    ///
    /// Terminal statuses are persisted before they are broadcast, so a
    /// storage failure means nobody is notified.
    #[tracing::instrument(skip(self, payload), fields(charge_id, status))]
    pub async fn handle_webhook(&self, payload: &Value) -> Result<WebhookOutcome> {
        let event = WebhookEvent::parse(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "rejecting webhook");
        })?;
        let span = tracing::Span::current();
        span.record("charge_id", tracing::field::display(&event.charge_id));
        span.record("status", event.status.as_str());

        let status: ChargeStatus = match event.status.parse() {
            Ok(status) => status,
            Err(_) => {
                metrics::counter!("webhooks_received_total", "status" => "unknown").increment(1);
                tracing::warn!("unknown webhook status");
                return Err(PaymentError::UnknownStatus(event.status));
            }
        };
        metrics::counter!("webhooks_received_total", "status" => status.as_str()).increment(1);

        if !status.is_terminal() {
            tracing::debug!("pending webhook acknowledged");
            return Ok(WebhookOutcome::Acknowledged {
                charge_id: event.charge_id,
                status,
            });
        }

        let _settling = self.settling.lock().await;
        let current = self.get_charge(&event.charge_id).await?;
        if current.status == status || !current.status.can_transition_to(status) {
            metrics::counter!("webhooks_ignored_total").increment(1);
            tracing::warn!(current = %current.status, "webhook does not change the charge");
            return Ok(WebhookOutcome::Acknowledged {
                charge_id: current.id,
                status: current.status,
            });
        }

        let charge = self.charges.update_status(&event.charge_id, status).await?;
        let delivered = self.hub.broadcast(&charge.id, status.as_str());
        metrics::counter!("charge_broadcast_deliveries_total").increment(delivered as u64);
        tracing::info!(delivered, "charge status updated");

        Ok(WebhookOutcome::Updated { charge, delivered })
    }
}
