//! Payment charges as tracked by this system.

use chrono::{DateTime, Utc};
use common::{ChargeId, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::order::Money;

/// Currency used when a charge request does not name one.
pub const DEFAULT_CURRENCY: &str = "thb";

/// Charge status as reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Pending,
    Successful,
    Failed,
    Expired,
    Reversed,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Successful => "successful",
            ChargeStatus::Failed => "failed",
            ChargeStatus::Expired => "expired",
            ChargeStatus::Reversed => "reversed",
        }
    }

    /// Returns true once the gateway has settled the charge one way or the other.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChargeStatus::Pending)
    }

    /// A pending charge may settle any way. Once settled, only a successful
    /// charge can move on, and only to reversed. Repeating the current status
    /// is allowed so redelivered webhooks are harmless.
    pub fn can_transition_to(&self, next: ChargeStatus) -> bool {
        use ChargeStatus::*;
        *self == next || matches!((self, next), (Pending, _) | (Successful, Reversed))
    }

    pub fn transition_to(&self, next: ChargeStatus) -> Result<ChargeStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidChargeTransition { from: *self, to: next })
        }
    }
}

impl std::str::FromStr for ChargeStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChargeStatus::Pending),
            "successful" => Ok(ChargeStatus::Successful),
            "failed" => Ok(ChargeStatus::Failed),
            "expired" => Ok(ChargeStatus::Expired),
            "reversed" => Ok(ChargeStatus::Reversed),
            other => Err(DomainError::UnknownChargeStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A charge created through the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub amount: Money,
    pub currency: String,
    pub order_id: Option<OrderId>,
    pub status: ChargeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Charge {
    pub fn new(id: ChargeId, amount: Money, currency: impl Into<String>, status: ChargeStatus) -> Self {
        let now = Utc::now();
        Self {
            id,
            amount,
            currency: currency.into(),
            order_id: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_order(mut self, order_id: Option<OrderId>) -> Self {
        self.order_id = order_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_gateway_strings() {
        assert_eq!("successful".parse::<ChargeStatus>().unwrap(), ChargeStatus::Successful);
        assert_eq!("failed".parse::<ChargeStatus>().unwrap(), ChargeStatus::Failed);
        assert_eq!("pending".parse::<ChargeStatus>().unwrap(), ChargeStatus::Pending);
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = "weird".parse::<ChargeStatus>().unwrap_err();
        assert_eq!(err, DomainError::UnknownChargeStatus("weird".to_string()));
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!ChargeStatus::Pending.is_terminal());
        assert!(ChargeStatus::Successful.is_terminal());
        assert!(ChargeStatus::Reversed.is_terminal());
    }

    #[test]
    fn settled_charges_only_move_to_reversed() {
        use ChargeStatus::*;
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Successful));
        assert!(Successful.can_transition_to(Reversed));
        assert!(Successful.can_transition_to(Successful));

        assert!(!Successful.can_transition_to(Failed));
        assert!(!Successful.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Successful));
        assert!(!Expired.can_transition_to(Successful));
        assert!(!Reversed.can_transition_to(Successful));

        assert_eq!(
            Failed.transition_to(Successful).unwrap_err(),
            DomainError::InvalidChargeTransition {
                from: Failed,
                to: Successful
            }
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChargeStatus::Successful).unwrap(),
            "\"successful\""
        );
    }
}
