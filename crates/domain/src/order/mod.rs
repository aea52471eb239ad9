//! Order record and related types.

mod state;
mod value_objects;

pub use state::OrderStatus;
pub use value_objects::{LineItem, Money, ProductId, RequestedItem};

use chrono::{DateTime, Utc};
use common::{AppointmentId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::role::UserRole;

/// A request to place an order, as received from the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub line_items: Vec<RequestedItem>,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub buyer_name: String,
    pub seller_name: String,
    pub payment_method: String,
}

impl NewOrder {
    /// Checks the request shape before any inventory or ledger call is made.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.line_items.is_empty() {
            return Err(DomainError::EmptyLineItems);
        }
        if let Some(item) = self.line_items.iter().find(|item| item.quantity == 0) {
            return Err(DomainError::InvalidQuantity {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            });
        }
        if self.payment_method.trim().is_empty() {
            return Err(DomainError::EmptyField("payment_method"));
        }
        Ok(())
    }
}

/// A persisted order.
///
/// Line items and total price are fixed at creation; only the status, the
/// linked appointment and the descriptive fields covered by [`OrderUpdate`]
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub line_items: Vec<LineItem>,
    pub buyer_id: UserId,
    pub buyer_name: String,
    pub seller_id: UserId,
    pub seller_name: String,
    pub total_price: Money,
    pub appointment_id: AppointmentId,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds a freshly placed order, computing the total from the priced items.
    pub fn place(
        id: OrderId,
        request: &NewOrder,
        line_items: Vec<LineItem>,
        appointment_id: AppointmentId,
    ) -> Result<Self, DomainError> {
        if line_items.is_empty() {
            return Err(DomainError::EmptyLineItems);
        }
        let total_price = total_of(&line_items)?;

        Ok(Self {
            id,
            status: OrderStatus::WaitingForLocation,
            line_items,
            buyer_id: request.buyer_id,
            buyer_name: request.buyer_name.clone(),
            seller_id: request.seller_id,
            seller_name: request.seller_name.clone(),
            total_price,
            appointment_id,
            payment_method: request.payment_method.clone(),
            created_at: Utc::now(),
        })
    }

    /// Returns true if `user_id` is on the given side of this order.
    pub fn involves(&self, user_id: UserId, role: UserRole) -> bool {
        match role {
            UserRole::Buyer => self.buyer_id == user_id,
            UserRole::Seller => self.seller_id == user_id,
        }
    }

    /// Applies the mutable fields of an update.
    pub fn apply_update(&mut self, update: &OrderUpdate) {
        if let Some(name) = &update.buyer_name {
            self.buyer_name = name.clone();
        }
        if let Some(name) = &update.seller_name {
            self.seller_name = name.clone();
        }
        if let Some(method) = &update.payment_method {
            self.payment_method = method.clone();
        }
        if let Some(appointment_id) = update.appointment_id {
            self.appointment_id = appointment_id;
        }
    }
}

/// Sums `unit_price * quantity` over the items with overflow checks.
pub fn total_of(line_items: &[LineItem]) -> Result<Money, DomainError> {
    line_items.iter().try_fold(Money::zero(), |acc, item| {
        acc.checked_add(item.total_price()?)
    })
}

/// Replaceable fields of an order. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub payment_method: Option<String>,
    pub appointment_id: Option<AppointmentId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<RequestedItem>) -> NewOrder {
        NewOrder {
            line_items: items,
            buyer_id: UserId::new(),
            seller_id: UserId::new(),
            buyer_name: "Bee".to_string(),
            seller_name: "Sam".to_string(),
            payment_method: "card".to_string(),
        }
    }

    #[test]
    fn validate_rejects_empty_line_items() {
        assert_eq!(request(vec![]).validate(), Err(DomainError::EmptyLineItems));
    }

    #[test]
    fn validate_rejects_zero_quantity() {
        let err = request(vec![RequestedItem::new("P1", 0)]).validate().unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { quantity: 0, .. }));
    }

    #[test]
    fn validate_rejects_blank_payment_method() {
        let mut req = request(vec![RequestedItem::new("P1", 1)]);
        req.payment_method = "  ".to_string();
        assert_eq!(req.validate(), Err(DomainError::EmptyField("payment_method")));
    }

    #[test]
    fn place_computes_total_from_unit_prices() {
        let req = request(vec![RequestedItem::new("P1", 2), RequestedItem::new("P2", 3)]);
        let items = vec![
            LineItem::new("P1", 2, Money::from_cents(1250)),
            LineItem::new("P2", 3, Money::from_units(10)),
        ];

        let order = Order::place(OrderId::new(), &req, items, AppointmentId::new()).unwrap();

        assert_eq!(order.total_price, Money::from_cents(2 * 1250 + 3 * 1000));
        assert_eq!(order.status, OrderStatus::WaitingForLocation);
        assert_eq!(order.buyer_name, "Bee");
    }

    #[test]
    fn involves_checks_the_right_side() {
        let req = request(vec![RequestedItem::new("P1", 1)]);
        let order = Order::place(
            OrderId::new(),
            &req,
            vec![LineItem::new("P1", 1, Money::from_cents(100))],
            AppointmentId::new(),
        )
        .unwrap();

        assert!(order.involves(req.buyer_id, UserRole::Buyer));
        assert!(!order.involves(req.buyer_id, UserRole::Seller));
        assert!(order.involves(req.seller_id, UserRole::Seller));
    }

    #[test]
    fn apply_update_leaves_items_and_total_alone() {
        let req = request(vec![RequestedItem::new("P1", 1)]);
        let mut order = Order::place(
            OrderId::new(),
            &req,
            vec![LineItem::new("P1", 1, Money::from_cents(100))],
            AppointmentId::new(),
        )
        .unwrap();
        let before_items = order.line_items.clone();

        order.apply_update(&OrderUpdate {
            buyer_name: Some("Renamed".to_string()),
            payment_method: Some("bank".to_string()),
            ..Default::default()
        });

        assert_eq!(order.buyer_name, "Renamed");
        assert_eq!(order.payment_method, "bank");
        assert_eq!(order.seller_name, "Sam");
        assert_eq!(order.line_items, before_items);
        assert_eq!(order.total_price, Money::from_cents(100));
    }
}
