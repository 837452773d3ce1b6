//! Clients for the payment providers the storefront accepts, and the [`GatewayRouter`] that presents them to the
//! payment engine as a single [`PaymentGateway`](storefront_payment_engine::traits::PaymentGateway).
//!
//! * [`PaystackApi`] is polling-verified: the engine may ask it directly whether a payment went through. Its
//!   webhooks are signed with an HMAC-SHA512 of the raw body.
//! * [`PalmPayApi`] is callback-verified: the only trusted confirmation is a callback whose RSA signature checks out
//!   against PalmPay's public key. Outbound requests are signed with the merchant's private key.
mod config;
mod data_objects;
mod error;
mod palmpay;
mod paystack;
mod router;

pub use config::{GatewayConfig, PalmPayConfig, PaystackConfig};
pub use data_objects::{
    PalmPayCallback,
    PalmPayCreateOrderData,
    PalmPayOrderStatus,
    PalmPayResponse,
    PaystackEnvelope,
    PaystackInitializeData,
    PaystackTransaction,
    PaystackWebhook,
};
pub use error::GatewayApiError;
pub use palmpay::PalmPayApi;
pub use paystack::PaystackApi;
pub use router::GatewayRouter;
