use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// Emitted exactly once per order, after the transition to `Paid` has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub emitted_at: DateTime<Utc>,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order, emitted_at: Utc::now() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    PaymentFailed,
    Cancelled,
    Expired,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaymentFailed => write!(f, "payment failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Emitted once per order, when its reserved stock goes back on the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClosedEvent {
    pub order: Order,
    pub reason: CloseReason,
    pub emitted_at: DateTime<Utc>,
}

impl OrderClosedEvent {
    pub fn new(order: Order, reason: CloseReason) -> Self {
        Self { order, reason, emitted_at: Utc::now() }
    }
}
