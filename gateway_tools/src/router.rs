use log::*;
use storefront_payment_engine::{
    db_types::{Order, PaymentConfirmation, PaymentProvider, VerificationMode},
    helpers::{CallbackHeaders, SignatureVerifier},
    traits::{GatewayError, PaymentGateway, PaymentInitiation},
};

use crate::{GatewayApiError, GatewayConfig, PalmPayApi, PaystackApi};

/// Presents every configured provider to the payment engine as one [`PaymentGateway`].
#[derive(Debug, Clone, Default)]
pub struct GatewayRouter {
    paystack: Option<PaystackApi>,
    palmpay: Option<PalmPayApi>,
}

impl GatewayRouter {
    pub fn new(paystack: Option<PaystackApi>, palmpay: Option<PalmPayApi>) -> Self {
        Self { paystack, palmpay }
    }

    pub fn from_config(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let paystack = config.paystack.map(|c| PaystackApi::new(c, config.timeout)).transpose()?;
        let palmpay = config.palmpay.map(|c| PalmPayApi::new(c, config.timeout)).transpose()?;
        Ok(Self { paystack, palmpay })
    }

    pub fn configured_providers(&self) -> Vec<PaymentProvider> {
        let mut result = Vec::with_capacity(2);
        if self.paystack.is_some() {
            result.push(PaymentProvider::Paystack);
        }
        if self.palmpay.is_some() {
            result.push(PaymentProvider::PalmPay);
        }
        result
    }

    fn paystack(&self) -> Result<&PaystackApi, GatewayError> {
        self.paystack.as_ref().ok_or(GatewayError::ProviderNotConfigured(PaymentProvider::Paystack))
    }

    fn palmpay(&self) -> Result<&PalmPayApi, GatewayError> {
        self.palmpay.as_ref().ok_or(GatewayError::ProviderNotConfigured(PaymentProvider::PalmPay))
    }
}

impl PaymentGateway for GatewayRouter {
    fn supports(&self, provider: PaymentProvider) -> bool {
        match provider {
            PaymentProvider::Paystack => self.paystack.is_some(),
            PaymentProvider::PalmPay => self.palmpay.is_some(),
        }
    }

    async fn initiate(&self, provider: PaymentProvider, order: &Order) -> Result<PaymentInitiation, GatewayError> {
        if order.is_paid() {
            warn!("💳️ Refusing to start a {provider} payment for order {}, which is already paid", order.order_id);
            return Err(GatewayError::Rejected(format!("Order {} has already been paid", order.order_id)));
        }
        let initiation = match provider {
            PaymentProvider::Paystack => self.paystack()?.initialize_transaction(order).await,
            PaymentProvider::PalmPay => self.palmpay()?.create_order(order).await,
        };
        initiation.map_err(|e| {
            warn!("💳️ {provider} could not start a payment for order {}: {e}", order.order_id);
            GatewayError::from(e)
        })
    }

    async fn verify_payment(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<PaymentConfirmation, GatewayError> {
        if provider.verification_mode() != VerificationMode::Polling {
            return Err(GatewayError::Unsupported(provider, "payment verification by polling".into()));
        }
        let confirmation = self.paystack()?.verify_transaction(reference).await.map_err(|e| {
            warn!("💳️ Could not verify {provider} payment {reference}: {e}");
            GatewayError::from(e)
        })?;
        Ok(confirmation)
    }

    fn callback_verifier(&self, provider: PaymentProvider) -> Option<SignatureVerifier> {
        match provider {
            PaymentProvider::Paystack => self.paystack.as_ref().map(PaystackApi::webhook_verifier),
            PaymentProvider::PalmPay => self.palmpay.as_ref().map(PalmPayApi::callback_verifier),
        }
    }

    fn parse_callback(
        &self,
        provider: PaymentProvider,
        raw_body: &[u8],
        _headers: &CallbackHeaders,
    ) -> Result<PaymentConfirmation, GatewayError> {
        let result = match provider {
            PaymentProvider::Paystack => self.paystack()?.parse_webhook(raw_body),
            PaymentProvider::PalmPay => self.palmpay()?.parse_callback(raw_body),
        };
        result.map_err(GatewayError::from)
    }
}
