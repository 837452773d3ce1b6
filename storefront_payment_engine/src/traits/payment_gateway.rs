use std::time::Duration;

use thiserror::Error;

use crate::{
    db_types::{Order, PaymentConfirmation, PaymentProvider},
    helpers::{CallbackHeaders, SignatureVerifier},
    traits::PaymentInitiation,
};

/// The capability set shared by all payment providers.
///
/// Implementations only talk to providers and translate their formats. They never touch order state; the order flow
/// API decides what a [`PaymentConfirmation`] means for an order.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Whether payments can be started with `provider` at all.
    fn supports(&self, provider: PaymentProvider) -> bool;

    /// Starts a payment for `order` with the given provider.
    async fn initiate(&self, provider: PaymentProvider, order: &Order) -> Result<PaymentInitiation, GatewayError>;

    /// Asks the provider directly for the status of the payment with the given reference. Only polling-verified
    /// providers support this.
    async fn verify_payment(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<PaymentConfirmation, GatewayError>;

    /// The verifier for the provider's inbound callbacks, if the provider is configured.
    fn callback_verifier(&self, provider: PaymentProvider) -> Option<SignatureVerifier>;

    /// Normalises a callback body that has already passed signature verification.
    fn parse_callback(
        &self,
        provider: PaymentProvider,
        raw_body: &[u8],
        headers: &CallbackHeaders,
    ) -> Result<PaymentConfirmation, GatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment provider did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Payment provider {0} is not configured")]
    ProviderNotConfigured(PaymentProvider),
    #[error("{0} does not support {1}")]
    Unsupported(PaymentProvider, String),
    #[error("The payment provider rejected the request: {0}")]
    Rejected(String),
    #[error("Could not communicate with the payment provider: {0}")]
    Communication(String),
    #[error("Invalid callback payload: {0}")]
    InvalidCallback(String),
}

impl GatewayError {
    /// Whether the caller may safely try the same request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Communication(_))
    }
}
