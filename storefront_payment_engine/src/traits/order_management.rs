use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentProvider, PaymentStatus},
    traits::StorageError,
};

/// Order storage and the order state machine's conditional updates.
///
/// Every `try_*` method is one atomic `UPDATE … WHERE <precondition> RETURNING *`. When the precondition does not
/// hold (because the order does not exist, or because another request got there first) the method returns
/// `Ok(None)` and changes nothing.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order and its line items atomically, with `payment_status = Unpaid` and
    /// `order_status = PendingFulfillment`.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    async fn fetch_order_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError>;

    /// Moves `Unpaid → Pending` for an order awaiting fulfilment. An order that is already `Pending` but has no
    /// provider reference (an earlier initiation timed out before a reference was stored) also qualifies, and is
    /// returned unchanged apart from its `updated_at`.
    async fn try_begin_payment(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// Records the provider and its reference on a `Pending` order awaiting fulfilment that has no reference yet.
    async fn try_set_provider_reference(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError>;

    /// Moves `Unpaid | Pending → Paid` if the order is still awaiting fulfilment and the stored provider and
    /// reference are either unset or equal to the given ones. Unset values are filled in by the same update.
    async fn try_mark_paid(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Order>, StorageError>;

    /// Moves `Unpaid | Pending → Failed` under the same guard as [`Self::try_mark_paid`].
    async fn try_mark_failed(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError>;

    /// Moves `order_status` from `PendingFulfillment` to `Cancelled` if the payment status is one of `allowed`.
    async fn try_cancel(&self, order_id: &OrderId, allowed: &[PaymentStatus]) -> Result<Option<Order>, StorageError>;

    /// Moves `order_status` from `PendingFulfillment` to `Approved`. Requires `payment_status = Paid`.
    async fn try_approve(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// Flips the order's stock-released flag from false to true and returns every line item to stock, as one
    /// atomic unit. Returns `None` if the stock was already released. On error neither the flag nor any stock level
    /// has changed.
    async fn try_release_order_stock(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError>;

    /// Cancelled orders and orders with a failed payment whose stock has not been returned yet, oldest first.
    async fn fetch_closed_orders_holding_stock(&self) -> Result<Vec<Order>, StorageError>;

    /// Reassigns the most recently created `Unpaid` order of the guest to the user, clearing the guest id.
    async fn try_attach_guest_order(&self, guest_id: &str, user_id: &str) -> Result<Option<Order>, StorageError>;

    /// Orders awaiting fulfilment whose payment never got under way, oldest first. These are `Unpaid` orders created
    /// before `cutoff` and `Pending` orders with no provider reference that were last updated before `cutoff`.
    async fn fetch_expirable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StorageError>;

    /// Cancels the order if it still matches the [`Self::fetch_expirable_orders`] criteria for `cutoff`.
    async fn try_expire(&self, order_id: &OrderId, cutoff: DateTime<Utc>) -> Result<Option<Order>, StorageError>;
}
