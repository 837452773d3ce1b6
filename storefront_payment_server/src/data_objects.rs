use std::fmt::Display;

use serde::{Deserialize, Serialize};
use storefront_payment_engine::{
    db_types::{Buyer, ConversionError, Order, OrderId, PaymentProvider, PaymentStatus, StockRequest},
    order_objects::{NewOrderRequest, PaymentStarted},
};

use crate::errors::ServerError;

/// The body of a checkout request. Exactly one of `user_id` and `guest_id` must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub guest_id: Option<String>,
    pub items: Vec<OrderItemParams>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemParams {
    pub product_id: String,
    pub quantity: i64,
}

impl TryFrom<NewOrderParams> for NewOrderRequest {
    type Error = ServerError;

    fn try_from(params: NewOrderParams) -> Result<Self, Self::Error> {
        let buyer =
            Buyer::from_parts(params.user_id, params.guest_id).map_err(|e| ServerError::InvalidRequestBody(e.0))?;
        let items = params.items.into_iter().map(|i| StockRequest::new(i.product_id, i.quantity)).collect();
        let request = NewOrderRequest::new(buyer, items);
        Ok(match params.currency {
            Some(c) => request.with_currency(c),
            None => request,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayParams {
    pub provider: String,
}

impl PayParams {
    pub fn provider(&self) -> Result<PaymentProvider, ServerError> {
        self.provider.parse().map_err(|e: ConversionError| ServerError::InvalidRequestBody(e.0))
    }
}

/// Where to send the customer to complete a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub order_id: OrderId,
    pub provider: PaymentProvider,
    pub redirect_url: String,
    pub provider_reference: String,
    pub payment_status: PaymentStatus,
}

impl From<PaymentStarted> for PaymentRedirect {
    fn from(started: PaymentStarted) -> Self {
        let PaymentStarted { order, initiation } = started;
        Self {
            order_id: order.order_id,
            provider: initiation.provider,
            redirect_url: initiation.redirect_url,
            provider_reference: initiation.provider_reference,
            payment_status: order.payment_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachParams {
    pub guest_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachResult {
    pub attached: bool,
    pub order: Option<Order>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}
