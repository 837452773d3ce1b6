//! # Order flow
//!
//! `OrderFlowApi` owns the order state machine:
//!
//! ```text
//!   payment_status:  Unpaid ──► Pending ──► Paid
//!                       │          │
//!                       └──────────┴──► Failed
//!
//!   order_status:    PendingFulfillment ──► Approved      (only once payment_status = Paid)
//!                            │
//!                            └──────────► Cancelled     (only while Unpaid, Pending or Failed)
//! ```
//!
//! Every transition is a single conditional update in the backend. When two requests race (a webhook and a polling
//! verification, two deliveries of the same webhook, an approval and a cancellation), exactly one update matches its
//! precondition and the others observe `None`. They then re-read the order and report what happened instead of
//! applying anything twice.
//!
//! Outbound gateway calls are wrapped in a timeout and are never made while a transition is half-applied. A timeout
//! leaves the order `Pending`.
use std::{collections::HashMap, fmt::Debug, future::Future, time::Duration};

use chrono::Utc;
use log::*;
use spg_common::DEFAULT_CURRENCY_CODE;

use crate::{
    db_types::{
        Amount,
        ConfirmationStatus,
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatus,
        PaymentConfirmation,
        PaymentProvider,
        PaymentStatus,
        StockRequest,
        VerificationMode,
    },
    events::{CloseReason, EventProducers, OrderClosedEvent, OrderPaidEvent},
    spe_api::{
        errors::OrderFlowError,
        inventory_api::InventoryLedger,
        order_objects::{ApprovalOutcome, NewOrderRequest, PaymentOutcome, PaymentStarted},
    },
    traits::{GatewayError, PaymentEngineDatabase, PaymentGateway},
};

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// `OrderFlowApi` is the primary API for handling checkout, payment and fulfilment flows.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    inventory: InventoryLedger<B>,
    producers: EventProducers,
    gateway_timeout: Duration,
    default_currency: String,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B: Clone, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        let inventory = InventoryLedger::new(db.clone());
        Self {
            db,
            gateway,
            inventory,
            producers,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            default_currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_default_currency(mut self, currency: &str) -> Self {
        self.default_currency = currency.to_string();
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn inventory(&self) -> &InventoryLedger<B> {
        &self.inventory
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    /// Places a new order.
    ///
    /// The items are validated against the catalog (prices are snapshotted from it, never taken from the caller),
    /// stock is reserved, and the order is stored as `Unpaid`. If the stock cannot be reserved no order is created.
    /// If the order cannot be stored, the reservation is released again.
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order, OrderFlowError> {
        let NewOrderRequest { buyer, items, currency } = request;
        let currency = validate_currency(currency.as_deref().unwrap_or(&self.default_currency))?;
        let requests = merge_line_requests(items)?;
        let line_items = self.price_line_items(&requests).await?;
        total_of(&line_items)?;
        let reservation = self.inventory.reserve(&requests).await?;
        let new_order = NewOrder::new(buyer, line_items, &currency);
        let order_id = new_order.order_id.clone();
        match self.db.insert_order(new_order).await {
            Ok(order) => {
                info!("🧾️ {order} created");
                Ok(order)
            },
            Err(e) => {
                error!("🧾️ Could not store order {order_id}: {e}. Releasing its reservation.");
                if let Err(release_err) = self.inventory.release(&reservation.items).await {
                    error!("🧾️ Releasing the reservation for {order_id} also failed: {release_err}");
                }
                Err(e.into())
            },
        }
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    /// Starts a payment for the order with the given provider, returning where the customer must be sent.
    ///
    /// Providers the gateway cannot serve are refused while the order is still `Unpaid`. Otherwise the order moves
    /// `Unpaid → Pending` before the provider is contacted. If the provider call fails or times out the order stays
    /// `Pending` without a provider reference, and `begin_payment` may be called again.
    pub async fn begin_payment(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
    ) -> Result<PaymentStarted, OrderFlowError> {
        if !self.gateway.supports(provider) {
            warn!("🧾️ Refusing to start a payment for {order_id}. {provider} is not configured.");
            return Err(GatewayError::ProviderNotConfigured(provider).into());
        }
        let order = match self.db.try_begin_payment(order_id).await? {
            Some(order) => order,
            None => return Err(self.rejection(order_id, "begin payment for").await),
        };
        debug!("🧾️ Order {order_id} is Pending. Contacting {provider}");
        let initiation = self.call_gateway(self.gateway.initiate(provider, &order)).await.map_err(|e| {
            warn!("🧾️ Payment initiation for {order_id} with {provider} failed: {e}. The order remains Pending.");
            e
        })?;
        let reference = initiation.provider_reference.as_str();
        match self.db.try_set_provider_reference(order_id, provider, reference).await? {
            Some(order) => {
                info!("🧾️ Payment for {order_id} started with {provider}. Reference: {reference}");
                Ok(PaymentStarted { order, initiation })
            },
            None => {
                warn!(
                    "🧾️ Payment reference {reference} from {provider} could not be stored on order {order_id}. \
                     Another payment attempt was recorded first."
                );
                Err(self.rejection(order_id, "record a payment reference for").await)
            },
        }
    }

    /// The polling verification flow. The provider is asked directly about the payment recorded on the order, and
    /// the answer is applied with [`Self::apply_payment_result`].
    pub async fn verify_payment(&self, order_id: &OrderId) -> Result<PaymentOutcome, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let (provider, reference) = match (order.payment_method, order.provider_reference.clone()) {
            (Some(p), Some(r)) => (p, r),
            _ => return Err(invalid_transition(&order, "verify the payment of")),
        };
        if provider.verification_mode() != VerificationMode::Polling {
            return Err(GatewayError::Unsupported(provider, "payment verification by polling".into()).into());
        }
        match order.payment_status {
            PaymentStatus::Paid => return Ok(PaymentOutcome::AlreadyPaid(order)),
            PaymentStatus::Failed => return Ok(PaymentOutcome::AlreadyFailed(order)),
            _ => {},
        }
        let mut confirmation = self.call_gateway(self.gateway.verify_payment(provider, &reference)).await?;
        if let Some(other) = confirmation.order_ref.as_ref().filter(|r| *r != order_id) {
            warn!("🧾️ {provider} says reference {reference} belongs to {other}, not {order_id}.");
        }
        confirmation.order_ref = Some(order_id.clone());
        self.apply_payment_result(confirmation).await
    }

    /// Applies a normalised payment confirmation to its order. This is idempotent: applying the same confirmation
    /// any number of times results in at most one state change.
    ///
    /// * A successful payment moves `Unpaid | Pending → Paid` if the reference on the order is unset or matches.
    ///   Re-applying it is a no-op that returns [`PaymentOutcome::AlreadyPaid`].
    /// * A failed payment moves `Unpaid | Pending → Failed` under the same guard, and releases the order's stock.
    /// * A pending payment changes nothing.
    /// * An amount that does not equal the order total, or a currency other than the order's, is rejected without
    ///   changing anything.
    pub async fn apply_payment_result(
        &self,
        confirmation: PaymentConfirmation,
    ) -> Result<PaymentOutcome, OrderFlowError> {
        let order = self.locate_order(&confirmation).await?;
        let order_id = order.order_id.clone();
        let provider = confirmation.provider;
        let reference = confirmation.provider_reference.as_str();
        trace!("🧾️ Applying {confirmation} to order {order_id} ({})", order.payment_status);
        match confirmation.status {
            ConfirmationStatus::Pending => {
                debug!("🧾️ {provider} payment {reference} for {order_id} is still pending. Nothing to do.");
                Ok(PaymentOutcome::StillPending(order))
            },
            ConfirmationStatus::Succeeded => {
                if confirmation.currency_differs_from(&order.currency) {
                    let received = confirmation.currency.clone().unwrap_or_default();
                    warn!(
                        "🧾️ {provider} reports a payment in {received} for order {order_id}, which is priced in {}.                          The payment has NOT been applied and needs manual reconciliation.",
                        order.currency
                    );
                    return Err(OrderFlowError::CurrencyMismatch { order_id, expected: order.currency, received });
                }
                if confirmation.amount != order.total_price {
                    warn!(
                        "🧾️ {provider} reports {} paid for order {order_id}, but the order total is {}. The payment \
                         has NOT been applied and needs manual reconciliation.",
                        confirmation.amount, order.total_price
                    );
                    return Err(OrderFlowError::AmountMismatch {
                        order_id,
                        expected: order.total_price,
                        received: confirmation.amount,
                    });
                }
                match self.db.try_mark_paid(&order_id, provider, reference, confirmation.occurred_at).await? {
                    Some(order) => {
                        info!("🧾️ Order {order_id} has been paid via {provider} ({reference})");
                        self.call_order_paid_hook(&order);
                        Ok(PaymentOutcome::Paid(order))
                    },
                    None => self.classify_unapplied(&order_id, &confirmation).await,
                }
            },
            ConfirmationStatus::Failed => match self.db.try_mark_failed(&order_id, provider, reference).await? {
                Some(order) => {
                    info!("🧾️ Payment {reference} for order {order_id} failed at {provider}. Releasing its stock.");
                    self.release_stock(&order, CloseReason::PaymentFailed).await?;
                    Ok(PaymentOutcome::Failed(order))
                },
                None => self.classify_unapplied(&order_id, &confirmation).await,
            },
        }
    }

    /// Soft-cancels an order that has not been paid, and returns its stock.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let allowed = [PaymentStatus::Unpaid, PaymentStatus::Pending, PaymentStatus::Failed];
        let order = match self.db.try_cancel(order_id, &allowed).await? {
            Some(order) => order,
            None => return Err(self.rejection(order_id, "cancel").await),
        };
        if order.payment_status == PaymentStatus::Pending {
            warn!(
                "🧾️ Order {order_id} was cancelled while a payment was pending. A late confirmation for it will not \
                 be applied."
            );
        }
        self.release_stock(&order, CloseReason::Cancelled).await?;
        info!("🧾️ Order {order_id} cancelled");
        Ok(order)
    }

    /// Approves a paid order for fulfilment. Anything other than a fresh approval comes back as a typed rejection.
    pub async fn approve_fulfillment(&self, order_id: &OrderId) -> Result<ApprovalOutcome, OrderFlowError> {
        if let Some(order) = self.db.try_approve(order_id).await? {
            info!("🧾️ Order {order_id} approved for fulfilment");
            return Ok(ApprovalOutcome::Approved(order));
        }
        let order = self.fetch_order(order_id).await?;
        let outcome = match order.order_status {
            OrderStatus::Approved => ApprovalOutcome::AlreadyApproved(order),
            OrderStatus::Cancelled => ApprovalOutcome::Cancelled(order),
            OrderStatus::PendingFulfillment => ApprovalOutcome::NotPaid(order),
        };
        debug!("🧾️ Approval rejected: {outcome}");
        Ok(outcome)
    }

    /// Hands the guest's most recent unpaid order over to a newly registered user.
    pub async fn attach_guest_order(&self, guest_id: &str, user_id: &str) -> Result<Option<Order>, OrderFlowError> {
        if guest_id.trim().is_empty() || user_id.trim().is_empty() {
            return Err(OrderFlowError::ValidationError("Both a guest id and a user id are required".into()));
        }
        let order = self.db.try_attach_guest_order(guest_id, user_id).await?;
        match &order {
            Some(o) => info!("🧾️ Guest order {} now belongs to user {user_id}", o.order_id),
            None => debug!("🧾️ Guest {guest_id} has no unpaid order to attach to user {user_id}"),
        }
        Ok(order)
    }

    /// Cancels every order whose payment never got under way and returns its stock. That is, orders still `Unpaid`
    /// more than `older_than` after creation, and `Pending` orders that have had no provider reference for longer
    /// than `older_than`. `Pending` orders with a provider reference are left alone, since a payment may be in flight.
    pub async fn expire_unpaid_orders(&self, older_than: chrono::Duration) -> Result<Vec<Order>, OrderFlowError> {
        let cutoff = Utc::now() - older_than;
        let stale = self.db.fetch_expirable_orders(cutoff).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            match self.db.try_expire(&order.order_id, cutoff).await? {
                Some(cancelled) => {
                    self.release_stock(&cancelled, CloseReason::Expired).await?;
                    debug!("🧾️ Order {} expired", cancelled.order_id);
                    expired.push(cancelled);
                },
                None => trace!("🧾️ Order {} changed state before it could be expired", order.order_id),
            }
        }
        if !expired.is_empty() {
            info!("🧾️ {} orders expired", expired.len());
        }
        self.release_held_stock().await?;
        Ok(expired)
    }

    /// Retries the stock release of closed orders whose earlier release failed.
    async fn release_held_stock(&self) -> Result<(), OrderFlowError> {
        for order in self.db.fetch_closed_orders_holding_stock().await? {
            let reason = match order.payment_status {
                PaymentStatus::Failed => CloseReason::PaymentFailed,
                _ => CloseReason::Cancelled,
            };
            warn!("🧾️ Order {} is closed but still holds stock. Returning it now.", order.order_id);
            self.release_stock(&order, reason).await?;
        }
        Ok(())
    }

    async fn call_gateway<T, F>(&self, call: F) -> Result<T, GatewayError>
    where F: Future<Output = Result<T, GatewayError>> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.gateway_timeout)),
        }
    }

    fn call_order_paid_hook(&self, order: &Order) {
        debug!("🧾️ Notifying order paid hook subscribers");
        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone()));
    }

    /// Returns the order's stock, at most once per order. The order-closed hook fires only when stock actually moved.
    async fn release_stock(&self, order: &Order, reason: CloseReason) -> Result<(), OrderFlowError> {
        let released = self.db.try_release_order_stock(&order.order_id).await.map_err(|e| {
            error!(
                "🧾️ Stock for order {} could not be returned: {e}. It will be retried on the next expiry sweep.",
                order.order_id
            );
            e
        })?;
        match released {
            Some(_) => self.producers.publish_order_closed(OrderClosedEvent::new(order.clone(), reason)),
            None => trace!("🧾️ Stock for order {} was already released", order.order_id),
        }
        Ok(())
    }

    async fn price_line_items(&self, requests: &[StockRequest]) -> Result<Vec<LineItem>, OrderFlowError> {
        let ids = requests.iter().map(|r| r.product_id.clone()).collect::<Vec<_>>();
        let catalog = self
            .db
            .fetch_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.product_id.clone(), p))
            .collect::<HashMap<_, _>>();
        requests
            .iter()
            .map(|r| {
                let product = catalog
                    .get(&r.product_id)
                    .ok_or_else(|| OrderFlowError::ValidationError(format!("Product {} does not exist", r.product_id)))?;
                Ok(LineItem { product_id: r.product_id.clone(), quantity: r.quantity, unit_price: product.unit_price })
            })
            .collect()
    }

    async fn locate_order(&self, confirmation: &PaymentConfirmation) -> Result<Order, OrderFlowError> {
        let provider = confirmation.provider;
        let reference = confirmation.provider_reference.as_str();
        if let Some(order_id) = &confirmation.order_ref {
            return self.fetch_order(order_id).await;
        }
        self.db.fetch_order_by_provider_reference(provider, reference).await?.ok_or_else(|| {
            OrderFlowError::PaymentNotMatched { provider: provider.to_string(), reference: reference.to_string() }
        })
    }

    /// Works out why a payment transition did not apply, after the conditional update found nothing to change.
    async fn classify_unapplied(
        &self,
        order_id: &OrderId,
        confirmation: &PaymentConfirmation,
    ) -> Result<PaymentOutcome, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        let reference = confirmation.provider_reference.as_str();
        let same_payment = order.provider_reference.as_deref() == Some(reference) &&
            order.payment_method == Some(confirmation.provider);
        let expected = || {
            let method = order.payment_method.map(|p| p.to_string()).unwrap_or_default();
            format!("{method}:{}", order.provider_reference.as_deref().unwrap_or_default())
        };
        match (order.payment_status, confirmation.status) {
            (PaymentStatus::Paid, ConfirmationStatus::Succeeded) if same_payment => {
                debug!("🧾️ Duplicate confirmation {reference} for {order_id}. Nothing to do.");
                Ok(PaymentOutcome::AlreadyPaid(order))
            },
            (PaymentStatus::Failed, ConfirmationStatus::Failed) if same_payment => {
                debug!("🧾️ Duplicate failure notice {reference} for {order_id}. Nothing to do.");
                Ok(PaymentOutcome::AlreadyFailed(order))
            },
            (status, _) if status.is_payable() && order.order_status == OrderStatus::PendingFulfillment => {
                error!(
                    "🧾️ Payment {reference} from {} does not match the payment ({}) recorded on order {order_id}.",
                    confirmation.provider,
                    expected()
                );
                Err(OrderFlowError::ReferenceMismatch {
                    order_id: order_id.clone(),
                    expected: expected(),
                    received: format!("{}:{reference}", confirmation.provider),
                })
            },
            _ => {
                let level = match confirmation.status {
                    ConfirmationStatus::Succeeded => Level::Error,
                    _ => Level::Warn,
                };
                log!(
                    level,
                    "🧾️ {confirmation} cannot be applied to order {order_id}, which is {} / {}. If money was taken, \
                     this payment needs manual reconciliation.",
                    order.payment_status,
                    order.order_status
                );
                Err(invalid_transition(&order, "apply a payment to"))
            },
        }
    }

    async fn rejection(&self, order_id: &OrderId, action: &'static str) -> OrderFlowError {
        match self.db.fetch_order(order_id).await {
            Ok(Some(order)) => invalid_transition(&order, action),
            Ok(None) => OrderFlowError::OrderNotFound(order_id.clone()),
            Err(e) => e.into(),
        }
    }
}

fn invalid_transition(order: &Order, action: &'static str) -> OrderFlowError {
    OrderFlowError::InvalidTransition {
        order_id: order.order_id.clone(),
        action,
        payment_status: order.payment_status,
        order_status: order.order_status,
    }
}

/// Rejects empty orders and non-positive quantities, and folds repeated products into a single line.
fn merge_line_requests(items: Vec<StockRequest>) -> Result<Vec<StockRequest>, OrderFlowError> {
    if items.is_empty() {
        return Err(OrderFlowError::ValidationError("An order must contain at least one item".into()));
    }
    let mut merged: Vec<StockRequest> = Vec::with_capacity(items.len());
    for item in items {
        if item.product_id.as_str().trim().is_empty() {
            return Err(OrderFlowError::ValidationError("Every item needs a product id".into()));
        }
        if item.quantity < 1 {
            return Err(OrderFlowError::ValidationError(format!(
                "Quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                    OrderFlowError::ValidationError(format!("Quantity for product {} is too large", item.product_id))
                })?
            },
            None => merged.push(item),
        }
    }
    Ok(merged)
}

fn total_of(items: &[LineItem]) -> Result<Amount, OrderFlowError> {
    items
        .iter()
        .try_fold(0i64, |total, item| {
            item.unit_price.value().checked_mul(item.quantity).and_then(|subtotal| total.checked_add(subtotal))
        })
        .map(Amount::from)
        .ok_or_else(|| OrderFlowError::ValidationError("The order total is too large".into()))
}

fn validate_currency(currency: &str) -> Result<String, OrderFlowError> {
    let currency = currency.trim().to_ascii_uppercase();
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(currency)
    } else {
        Err(OrderFlowError::ValidationError(format!("'{currency}' is not a valid currency code")))
    }
}
