//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order after it has been placed.
///
/// Encoded on the wire as an integer 0-3.
///
/// State transitions:
/// ```text
/// WaitingForLocation ──► LocationProposed ──► LocationAccepted ──► Completed
///          ▲                    │
///          └────── rejected ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum OrderStatus {
    /// Order placed, seller has not proposed a meeting place yet.
    #[default]
    WaitingForLocation,

    /// Seller proposed a place, awaiting the buyer's answer.
    LocationProposed,

    /// Buyer accepted the proposed place.
    LocationAccepted,

    /// Hand-over happened (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns the integer code used on the wire and in storage.
    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::WaitingForLocation => 0,
            OrderStatus::LocationProposed => 1,
            OrderStatus::LocationAccepted => 2,
            OrderStatus::Completed => 3,
        }
    }

    /// Decodes a wire status code.
    pub fn from_code(code: i64) -> Result<Self, DomainError> {
        match code {
            0 => Ok(OrderStatus::WaitingForLocation),
            1 => Ok(OrderStatus::LocationProposed),
            2 => Ok(OrderStatus::LocationAccepted),
            3 => Ok(OrderStatus::Completed),
            other => Err(DomainError::InvalidStatus(other)),
        }
    }

    /// Returns true if moving to `next` is allowed. Staying put is always allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        *self == next
            || matches!(
                (self, next),
                (WaitingForLocation, LocationProposed)
                    | (LocationProposed, LocationAccepted)
                    | (LocationProposed, WaitingForLocation)
                    | (LocationAccepted, Completed)
            )
    }

    /// Validates a transition, returning the new status.
    pub fn transition_to(&self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::WaitingForLocation => "WAITING_FOR_LOCATION",
            OrderStatus::LocationProposed => "LOCATION_PROPOSED",
            OrderStatus::LocationAccepted => "LOCATION_ACCEPTED",
            OrderStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<OrderStatus> for i16 {
    fn from(status: OrderStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i16> for OrderStatus {
    type Error = DomainError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        OrderStatus::from_code(i64::from(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_waiting_for_location() {
        assert_eq!(OrderStatus::default(), OrderStatus::WaitingForLocation);
    }

    #[test]
    fn test_codes_round_trip() {
        for code in 0..=3 {
            assert_eq!(i64::from(OrderStatus::from_code(code).unwrap().code()), code);
        }
    }

    #[test]
    fn test_out_of_range_code_rejected() {
        assert_eq!(OrderStatus::from_code(4), Err(DomainError::InvalidStatus(4)));
        assert_eq!(OrderStatus::from_code(-1), Err(DomainError::InvalidStatus(-1)));
    }

    #[test]
    fn test_forward_path_is_allowed() {
        use OrderStatus::*;
        assert!(WaitingForLocation.can_transition_to(LocationProposed));
        assert!(LocationProposed.can_transition_to(LocationAccepted));
        assert!(LocationAccepted.can_transition_to(Completed));
    }

    #[test]
    fn test_rejected_proposal_goes_back() {
        assert!(OrderStatus::LocationProposed.can_transition_to(OrderStatus::WaitingForLocation));
    }

    #[test]
    fn test_skipping_states_is_rejected() {
        use OrderStatus::*;
        assert!(!WaitingForLocation.can_transition_to(LocationAccepted));
        assert!(!WaitingForLocation.can_transition_to(Completed));
        assert!(!LocationProposed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(WaitingForLocation));
        assert_eq!(
            WaitingForLocation.transition_to(Completed),
            Err(DomainError::InvalidTransition {
                from: WaitingForLocation,
                to: Completed
            })
        );
    }

    #[test]
    fn test_same_status_is_idempotent() {
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::WaitingForLocation.is_terminal());
        assert!(!OrderStatus::LocationProposed.is_terminal());
        assert!(!OrderStatus::LocationAccepted.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
    }

    #[test]
    fn test_serializes_as_code() {
        let json = serde_json::to_string(&OrderStatus::LocationAccepted).unwrap();
        assert_eq!(json, "2");
        let back: OrderStatus = serde_json::from_str("1").unwrap();
        assert_eq!(back, OrderStatus::LocationProposed);
        assert!(serde_json::from_str::<OrderStatus>("7").is_err());
    }
}
