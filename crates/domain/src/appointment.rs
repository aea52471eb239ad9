//! Appointment records: where and when the hand-over of an order happens.

use chrono::{DateTime, NaiveDate, Utc};
use common::{AppointmentId, OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Meeting place for an order. Empty until the seller proposes one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
            && self.city.is_empty()
            && self.province.is_empty()
            && self.postal_code.is_empty()
    }
}

/// The scheduling record attached to exactly one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub location: Location,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Creates an unscheduled appointment for an order.
    pub fn new(order_id: OrderId, buyer_id: UserId, seller_id: UserId) -> Self {
        Self {
            id: AppointmentId::new(),
            order_id,
            buyer_id,
            seller_id,
            location: Location::default(),
            date: None,
            time_slot: None,
            created_at: Utc::now(),
        }
    }

    pub fn set_place(&mut self, location: Location) {
        self.location = location;
    }

    /// Sets the date and time slot. The slot label must not be blank.
    pub fn set_date(&mut self, date: NaiveDate, time_slot: String) -> Result<(), DomainError> {
        if time_slot.trim().is_empty() {
            return Err(DomainError::EmptyField("time_slot"));
        }
        self.date = Some(date);
        self.time_slot = Some(time_slot);
        Ok(())
    }

    pub fn is_scheduled(&self) -> bool {
        self.date.is_some() && !self.location.is_empty()
    }
}
