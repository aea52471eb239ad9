//! Saga lifecycle and the log of completed steps.

use common::{AppointmentId, OrderId, UserId};
use domain::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::order_fulfillment::{
    STEP_CREATE_APPOINTMENT, STEP_CREDIT_SELLER, STEP_DECREMENT_STOCK, STEP_PERSIST_ORDER,
};

/// Lifecycle of one order-creation saga.
///
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    #[default]
    NotStarted,
    Running,
    Compensating,
    Completed,
    Failed,
}

impl SagaState {
    /// Returns true if moving to `next` follows the lifecycle above.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (Running, Completed)
                | (Running, Compensating)
                | (Compensating, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "not_started",
            SagaState::Running => "running",
            SagaState::Compensating => "compensating",
            SagaState::Completed => "completed",
            SagaState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A side effect the saga has already applied, with what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletedStep {
    AppointmentCreated(AppointmentId),
    SellerCredited {
        seller_id: UserId,
        payment_method: String,
        amount: Money,
    },
    /// One per line item, so a partially applied stock step is undone exactly.
    StockDecremented { product_id: ProductId, quantity: u32 },
    OrderPersisted,
}

impl CompletedStep {
    /// Name of the saga step this side effect belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            CompletedStep::AppointmentCreated(_) => STEP_CREATE_APPOINTMENT,
            CompletedStep::SellerCredited { .. } => STEP_CREDIT_SELLER,
            CompletedStep::StockDecremented { .. } => STEP_DECREMENT_STOCK,
            CompletedStep::OrderPersisted => STEP_PERSIST_ORDER,
        }
    }
}

/// In-memory record of one saga run.
#[derive(Debug, Clone)]
pub struct SagaLog {
    order_id: OrderId,
    state: SagaState,
    completed: Vec<CompletedStep>,
    failure: Option<(&'static str, String)>,
}

impl SagaLog {
    pub fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            state: SagaState::NotStarted,
            completed: Vec::new(),
            failure: None,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn completed(&self) -> &[CompletedStep] {
        &self.completed
    }

    /// The failed step and its reason, once the saga has started compensating.
    pub fn failure(&self) -> Option<(&'static str, &str)> {
        self.failure
            .as_ref()
            .map(|(step, reason)| (*step, reason.as_str()))
    }

    pub fn start(&mut self) {
        self.advance(SagaState::Running);
    }

    pub fn record(&mut self, step: CompletedStep) {
        debug_assert_eq!(self.state, SagaState::Running);
        self.completed.push(step);
    }

    /// Marks the run as compensating and hands back the steps to undo, most
    /// recent first.
    pub fn begin_compensation(
        &mut self,
        failed_step: &'static str,
        reason: String,
    ) -> Vec<CompletedStep> {
        self.advance(SagaState::Compensating);
        self.failure = Some((failed_step, reason));
        let mut steps = std::mem::take(&mut self.completed);
        steps.reverse();
        steps
    }

    pub fn complete(&mut self) {
        self.advance(SagaState::Completed);
    }

    pub fn fail(&mut self) {
        self.advance(SagaState::Failed);
    }

    fn advance(&mut self, next: SagaState) {
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::warn!(
                order_id = %self.order_id,
                from = %self.state,
                to = %next,
                "ignoring out-of-order saga transition"
            );
        }
    }
}
