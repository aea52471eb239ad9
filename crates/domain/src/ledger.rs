//! Seller ledger transactions.

use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId, UserId};
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TransactionKind::Credit),
            "debit" => Some(TransactionKind::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable entry in a seller's ledger.
///
/// `amount` is always positive; `kind` carries the sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub seller_id: UserId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub order_id: Option<OrderId>,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// A deposit funded by an order.
    pub fn credit(seller_id: UserId, order_id: OrderId, payment_method: &str, amount: Money) -> Self {
        Self::new(seller_id, TransactionKind::Credit, amount, Some(order_id), payment_method)
    }

    /// A withdrawal, or the reversal of an order credit when `order_id` is set.
    pub fn debit(
        seller_id: UserId,
        order_id: Option<OrderId>,
        payment_method: &str,
        amount: Money,
    ) -> Self {
        Self::new(seller_id, TransactionKind::Debit, amount, order_id, payment_method)
    }

    fn new(
        seller_id: UserId,
        kind: TransactionKind,
        amount: Money,
        order_id: Option<OrderId>,
        payment_method: &str,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            seller_id,
            kind,
            amount,
            order_id,
            payment_method: payment_method.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Returns the amount with the sign applied to a balance.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => Money::zero() - self.amount,
        }
    }
}
