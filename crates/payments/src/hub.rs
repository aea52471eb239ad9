//! Charge notification hub.
//!
//! Fans charge status updates out to live subscribers, keyed by charge id.
//!
//! ```text
//! webhook ──► broadcast(charge_id, status)
//!                 │  try_send under the registry lock
//!                 ▼
//!   registry: charge_id → [Subscriber { id, mpsc::Sender }]
//!                 │
//!                 ▼
//!   Subscription::recv() ──► SSE stream
//! ```
//!
//! A subscriber whose buffer is full or whose receiver is gone is dropped on
//! the next broadcast. Dropping a [`Subscription`] unregisters it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use common::ChargeId;
use tokio::sync::mpsc;

use crate::error::HubError;

pub const DEFAULT_MAX_SUBSCRIBERS_PER_CHARGE: usize = 16;
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 8;

/// Limits applied to every charge id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    pub max_subscribers_per_charge: usize,
    /// Messages buffered per subscriber before it is considered stale.
    pub subscriber_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_subscribers_per_charge: DEFAULT_MAX_SUBSCRIBERS_PER_CHARGE,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    charges: HashMap<ChargeId, Vec<Subscriber>>,
}

struct HubInner {
    config: HubConfig,
    registry: Mutex<Registry>,
}

impl HubInner {
    // The registry holds plain data; a panic elsewhere cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, charge_id: &ChargeId, subscription_id: u64) -> bool {
        let mut registry = self.lock();
        let Some(subscribers) = registry.charges.get_mut(charge_id) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|s| s.id != subscription_id);
        let removed = subscribers.len() != before;

        if subscribers.is_empty() {
            registry.charges.remove(charge_id);
        }
        removed
    }
}

/// In-memory registry of live subscribers per charge id.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct ChargeHub {
    inner: Arc<HubInner>,
}

impl Default for ChargeHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl ChargeHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub fn config(&self) -> HubConfig {
        self.inner.config
    }

    /// Registers a new subscriber for `charge_id`.
    pub fn subscribe(&self, charge_id: ChargeId) -> Result<Subscription, HubError> {
        let config = self.inner.config;
        let mut registry = self.inner.lock();

        let current = registry.charges.get(&charge_id).map_or(0, Vec::len);
        if current >= config.max_subscribers_per_charge {
            return Err(HubError::TooManySubscribers {
                charge_id,
                limit: config.max_subscribers_per_charge,
            });
        }

        registry.next_id += 1;
        let id = registry.next_id;
        let (tx, rx) = mpsc::channel(config.subscriber_buffer.max(1));
        registry
            .charges
            .entry(charge_id.clone())
            .or_default()
            .push(Subscriber { id, tx });
        drop(registry);

        tracing::debug!(%charge_id, subscription_id = id, "subscriber registered");
        Ok(Subscription {
            charge_id,
            id,
            rx,
            hub: Arc::clone(&self.inner),
        })
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&self, charge_id: &ChargeId, subscription_id: u64) -> bool {
        self.inner.unsubscribe(charge_id, subscription_id)
    }

    /// Sends `status` to every subscriber of `charge_id` without waiting.
    ///
    /// Returns how many subscribers accepted the message. Subscribers that
    /// could not take it are removed.
    pub fn broadcast(&self, charge_id: &ChargeId, status: &str) -> usize {
        let mut registry = self.inner.lock();
        let Some(subscribers) = registry.charges.get_mut(charge_id) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|s| match s.tx.try_send(status.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                tracing::debug!(
                    %charge_id,
                    subscription_id = s.id,
                    error = %e,
                    "dropping stale subscriber"
                );
                false
            }
        });

        if subscribers.is_empty() {
            registry.charges.remove(charge_id);
        }
        delivered
    }

    pub fn subscriber_count(&self, charge_id: &ChargeId) -> usize {
        self.inner.lock().charges.get(charge_id).map_or(0, Vec::len)
    }

    /// Number of charge ids with at least one subscriber.
    pub fn charge_count(&self) -> usize {
        self.inner.lock().charges.len()
    }
}

/// A live subscription to one charge id's status updates.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    charge_id: ChargeId,
    id: u64,
    rx: mpsc::Receiver<String>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn charge_id(&self) -> &ChargeId {
        &self.charge_id
    }

    /// Waits for the next status. Returns None once the hub has dropped this
    /// subscriber.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Returns a buffered status without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("charge_id", &self.charge_id)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.hub.unsubscribe(&self.charge_id, self.id) {
            tracing::debug!(
                charge_id = %self.charge_id,
                subscription_id = self.id,
                "subscriber removed"
            );
        }
    }
}
