use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Buyer, Order, StockRequest},
    traits::PaymentInitiation,
};

/// A checkout request. Prices are never taken from the caller; they are read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub buyer: Buyer,
    pub items: Vec<StockRequest>,
    pub currency: Option<String>,
}

impl NewOrderRequest {
    pub fn new(buyer: Buyer, items: Vec<StockRequest>) -> Self {
        Self { buyer, items, currency: None }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStarted {
    pub order: Order,
    pub initiation: PaymentInitiation,
}

/// The result of applying a payment confirmation to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "order")]
pub enum PaymentOutcome {
    /// This confirmation moved the order to `Paid`.
    Paid(Order),
    /// The order was already paid under this reference. Nothing changed.
    AlreadyPaid(Order),
    /// This confirmation moved the order to `Failed`, and its stock was released.
    Failed(Order),
    /// The order had already failed under this reference. Nothing changed.
    AlreadyFailed(Order),
    /// The provider has not settled the payment yet. Nothing changed.
    StillPending(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Paid(o) | Self::AlreadyPaid(o) | Self::Failed(o) | Self::AlreadyFailed(o) | Self::StillPending(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Paid(o) | Self::AlreadyPaid(o) | Self::Failed(o) | Self::AlreadyFailed(o) | Self::StillPending(o) => o,
        }
    }

    /// True if this call changed the order's state.
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Paid(_) | Self::Failed(_))
    }
}

impl Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Paid(_) => "paid",
            Self::AlreadyPaid(_) => "duplicate_paid",
            Self::Failed(_) => "failed",
            Self::AlreadyFailed(_) => "duplicate_failed",
            Self::StillPending(_) => "pending",
        };
        f.write_str(label)
    }
}

/// The result of asking to approve fulfilment. Only `Approved` is a state change; the rest are typed rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "order")]
pub enum ApprovalOutcome {
    Approved(Order),
    AlreadyApproved(Order),
    NotPaid(Order),
    Cancelled(Order),
}

impl ApprovalOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Approved(o) | Self::AlreadyApproved(o) | Self::NotPaid(o) | Self::Cancelled(o) => o,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved(_))
    }
}

impl Display for ApprovalOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved(o) => write!(f, "Order {} approved for fulfilment", o.order_id),
            Self::AlreadyApproved(o) => write!(f, "Order {} has already been approved", o.order_id),
            Self::NotPaid(o) => write!(f, "Order {} cannot be approved while it is {}", o.order_id, o.payment_status),
            Self::Cancelled(o) => write!(f, "Order {} has been cancelled", o.order_id),
        }
    }
}
