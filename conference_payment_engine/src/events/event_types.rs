use serde::{Deserialize, Serialize};

use crate::db_types::{Order, UserAccount};

/// Published exactly once per attendee: when one of their orders is first seen as paid and their `paid` flag flips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmedEvent {
    pub user: UserAccount,
    pub order: Order,
}

impl PaymentConfirmedEvent {
    pub fn new(user: UserAccount, order: Order) -> Self {
        Self { user, order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailedEvent {
    pub order: Order,
}

impl OrderFailedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PaymentConfirmed(PaymentConfirmedEvent),
    OrderFailed(OrderFailedEvent),
}
