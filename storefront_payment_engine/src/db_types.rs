//! Public data types shared by the engine, its storage backends and its clients.
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
pub use spg_common::Amount;
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      ProductId      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Into<String>> From<S> for ProductId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a new order id: 12 bytes of hex, the first six of which are the creation time in milliseconds, so
    /// that ids sort roughly by creation order.
    pub fn random() -> Self {
        let millis = Utc::now().timestamp_millis() & 0xffff_ffff_ffff;
        let suffix: u64 = rand::random::<u64>() & 0xffff_ffff_ffff;
        Self(format!("{millis:012x}{suffix:012x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("An order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------         Buyer         ---------------------------------------------------------
/// Who placed an order. Exactly one of a registered user id or a guest (session) id identifies the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Buyer {
    User(String),
    Guest(String),
}

impl Buyer {
    /// Builds a buyer from the two optional identifiers that clients and the database use. Exactly one must be
    /// present and non-empty.
    pub fn from_parts(user_id: Option<String>, guest_id: Option<String>) -> Result<Self, ConversionError> {
        let user_id = user_id.filter(|s| !s.trim().is_empty());
        let guest_id = guest_id.filter(|s| !s.trim().is_empty());
        match (user_id, guest_id) {
            (Some(u), None) => Ok(Self::User(u)),
            (None, Some(g)) => Ok(Self::Guest(g)),
            (Some(_), Some(_)) => Err(ConversionError("An order cannot have both a user id and a guest id".into())),
            (None, None) => Err(ConversionError("An order requires either a user id or a guest id".into())),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(u) => Some(u.as_str()),
            Self::Guest(_) => None,
        }
    }

    pub fn guest_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::Guest(g) => Some(g.as_str()),
        }
    }
}

impl Display for Buyer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(u) => write!(f, "user:{u}"),
            Self::Guest(g) => write!(f, "guest:{g}"),
        }
    }
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The order has been created and stock is reserved. No payment has been started.
    Unpaid,
    /// A payment has been initiated with a gateway, and we are waiting for the outcome.
    Pending,
    /// The gateway has confirmed the payment.
    Paid,
    /// The gateway reported that the payment failed. Terminal.
    Failed,
}

impl PaymentStatus {
    /// True for the states from which a payment result may still be applied.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Unpaid | Self::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpaid => write!(f, "Unpaid"),
            Self::Pending => write!(f, "Pending"),
            Self::Paid => write!(f, "Paid"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(Self::Unpaid),
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------      OrderStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Waiting for payment and/or for a merchant to approve fulfilment.
    PendingFulfillment,
    /// The merchant approved fulfilment of a paid order.
    Approved,
    /// Soft-cancelled. The reserved stock has been returned.
    Cancelled,
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PendingFulfillment => write!(f, "PendingFulfillment"),
            Self::Approved => write!(f, "Approved"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingFulfillment" => Ok(Self::PendingFulfillment),
            "Approved" => Ok(Self::Approved),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentProvider    ---------------------------------------------------------
/// The payment gateways this system integrates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paystack,
    #[serde(rename = "palmpay")]
    PalmPay,
}

/// How a provider's payment outcome becomes trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMode {
    /// We ask the provider directly (outbound call), typically when the customer returns from the checkout page.
    Polling,
    /// The provider tells us via a signed inbound callback.
    Callback,
}

impl PaymentProvider {
    pub fn verification_mode(&self) -> VerificationMode {
        match self {
            Self::Paystack => VerificationMode::Polling,
            Self::PalmPay => VerificationMode::Callback,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::PalmPay => "palmpay",
        }
    }
}

impl Display for PaymentProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paystack" => Ok(Self::Paystack),
            "palmpay" => Ok(Self::PalmPay),
            s => Err(ConversionError(format!("Unsupported payment provider: {s}"))),
        }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity_on_hand: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity_on_hand: i64,
}

impl NewProduct {
    pub fn new<P: Into<ProductId>, S: Into<String>>(product_id: P, name: S, unit_price: Amount, stock: i64) -> Self {
        Self { product_id: product_id.into(), name: name.into(), unit_price, quantity_on_hand: stock }
    }
}

/// The catalog fields that may be edited on a product. Stock levels are deliberately absent: they only change through
/// the inventory ledger's reserve, release and restock operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub unit_price: Option<Amount>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.unit_price.is_none()
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unit_price(mut self, price: Amount) -> Self {
        self.unit_price = Some(price);
        self
    }
}

//--------------------------------------     StockRequest      ---------------------------------------------------------
/// A `(product, quantity)` pair as seen by the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl StockRequest {
    pub fn new<P: Into<ProductId>>(product_id: P, quantity: i64) -> Self {
        Self { product_id: product_id.into(), quantity }
    }
}

/// Proof that stock for every line in `items` has been decremented. Hand it back to `release` to undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub items: Vec<StockRequest>,
}

//--------------------------------------       LineItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
    /// The catalog price at the time the order was placed.
    pub unit_price: Amount,
}

impl LineItem {
    pub fn subtotal(&self) -> Amount {
        self.unit_price * self.quantity
    }

    pub fn as_stock_request(&self) -> StockRequest {
        StockRequest { product_id: self.product_id.clone(), quantity: self.quantity }
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub buyer: Buyer,
    pub items: Vec<LineItem>,
    pub total_price: Amount,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Creates a new order record. The total is always derived from the line items.
    pub fn new(buyer: Buyer, items: Vec<LineItem>, currency: &str) -> Self {
        let total_price = items.iter().map(LineItem::subtotal).sum();
        Self {
            order_id: OrderId::random(),
            buyer,
            items,
            total_price,
            currency: currency.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn stock_requests(&self) -> Vec<StockRequest> {
        self.items.iter().map(LineItem::as_stock_request).collect()
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub buyer: Buyer,
    pub items: Vec<LineItem>,
    pub total_price: Amount,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub provider_reference: Option<String>,
    pub payment_method: Option<PaymentProvider>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn stock_requests(&self) -> Vec<StockRequest> {
        self.items.iter().map(LineItem::as_stock_request).collect()
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order {} for {} ({} {}, {} items) payment: {} order: {}",
            self.order_id,
            self.buyer,
            self.total_price,
            self.currency,
            self.items.len(),
            self.payment_status,
            self.order_status
        )
    }
}

//--------------------------------------  PaymentConfirmation  ---------------------------------------------------------
/// What the gateway says happened to a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    Succeeded,
    Failed,
    /// Still in progress at the provider. Carries no state change.
    Pending,
}

impl Display for ConfirmationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Pending => write!(f, "Pending"),
        }
    }
}

/// The normalised shape of a payment notification, regardless of which provider sent it or how it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub provider: PaymentProvider,
    pub provider_reference: String,
    /// Our order id, when the provider echoes it back.
    pub order_ref: Option<OrderId>,
    pub amount: Amount,
    /// ISO currency code of `amount`, when the provider reports one.
    pub currency: Option<String>,
    pub status: ConfirmationStatus,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentConfirmation {
    /// True if the provider reported a currency other than `currency`.
    pub fn currency_differs_from(&self, currency: &str) -> bool {
        self.currency.as_deref().is_some_and(|c| !c.trim().eq_ignore_ascii_case(currency))
    }
}

impl Display for PaymentConfirmation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let order = self.order_ref.as_ref().map(|o| o.to_string()).unwrap_or_else(|| "(no order ref)".into());
        write!(f, "[{}:{}] {} {} for {order}", self.provider, self.provider_reference, self.status, self.amount)
    }
}

/// Parses a status string read back from storage, falling back to a sensible default if the stored value is corrupt.
pub(crate) fn parse_or_log<T: FromStr<Err = ConversionError>>(value: &str, default: T) -> T {
    value.parse().unwrap_or_else(|e: ConversionError| {
        error!("🗃️ {e}. The stored value is not recognised; this is a data integrity bug.");
        default
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buyer_requires_exactly_one_identity() {
        assert_eq!(Buyer::from_parts(Some("u1".into()), None).unwrap(), Buyer::User("u1".into()));
        assert_eq!(Buyer::from_parts(None, Some("g1".into())).unwrap(), Buyer::Guest("g1".into()));
        assert!(Buyer::from_parts(Some("u1".into()), Some("g1".into())).is_err());
        assert!(Buyer::from_parts(None, None).is_err());
        assert!(Buyer::from_parts(Some("  ".into()), None).is_err());
    }

    #[test]
    fn total_is_derived_from_items() {
        let items = vec![
            LineItem { product_id: "a".into(), quantity: 2, unit_price: Amount::from(1500) },
            LineItem { product_id: "b".into(), quantity: 1, unit_price: Amount::from(250) },
        ];
        let order = NewOrder::new(Buyer::Guest("g".into()), items, "NGN");
        assert_eq!(order.total_price, Amount::from(3250));
        assert_eq!(order.stock_requests()[0], StockRequest::new("a", 2));
    }

    #[test]
    fn provider_names() {
        assert_eq!("PalmPay".parse::<PaymentProvider>().unwrap(), PaymentProvider::PalmPay);
        assert_eq!("paystack".parse::<PaymentProvider>().unwrap(), PaymentProvider::Paystack);
        assert!("stripe".parse::<PaymentProvider>().is_err());
        assert_eq!(serde_json::to_string(&PaymentProvider::PalmPay).unwrap(), "\"palmpay\"");
        assert_eq!(PaymentProvider::Paystack.verification_mode(), VerificationMode::Polling);
    }

    #[test]
    fn random_order_ids_are_unique() {
        let a = OrderId::random();
        let b = OrderId::random();
        assert_eq!(a.as_str().len(), 24);
        assert_ne!(a, b);
    }

    #[test]
    fn statuses_round_trip_through_strings() {
        for s in [PaymentStatus::Unpaid, PaymentStatus::Pending, PaymentStatus::Paid, PaymentStatus::Failed] {
            assert_eq!(s.to_string().parse::<PaymentStatus>().unwrap(), s);
        }
        assert!(PaymentStatus::Pending.is_payable());
        assert!(!PaymentStatus::Failed.is_payable());
        assert_eq!(parse_or_log("Bogus", OrderStatus::PendingFulfillment), OrderStatus::PendingFulfillment);
    }
}
