//! # Webhook dispatcher
//!
//! The single entry point for provider callbacks. The dispatcher
//! 1. resolves the provider named in the callback URL,
//! 2. checks the callback signature against the raw body, exactly as it was received,
//! 3. asks the gateway to normalise the body into a [`PaymentConfirmation`](crate::db_types::PaymentConfirmation),
//! 4. hands the confirmation to [`OrderFlowApi::apply_payment_result`].
//!
//! Duplicate deliveries are not filtered here. The order flow's conditional updates make replays harmless.
//!
//! Whatever happens, `dispatch` returns a [`WebhookOutcome`] rather than an error, since the provider must always be
//! acknowledged. The outcome is written to the webhook audit log.
use std::fmt::Display;

use chrono::Utc;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::PaymentProvider,
    helpers::{CallbackHeaders, SECURITY_LOG_TARGET},
    spe_api::{errors::OrderFlowError, order_flow_api::OrderFlowApi, order_objects::PaymentOutcome},
    traits::{GatewayError, NewWebhookEvent, PaymentEngineDatabase, PaymentGateway, WebhookAudit},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail")]
pub enum WebhookOutcome {
    /// The callback moved an order (or confirmed it had already moved).
    Applied(PaymentOutcome),
    UnknownProvider(String),
    ProviderNotConfigured(PaymentProvider),
    SignatureInvalid(PaymentProvider),
    InvalidPayload(String),
    /// The callback refers to an order or payment we do not know about.
    OrderNotFound(String),
    /// The callback was authentic but could not be applied (amount or reference mismatch, invalid transition).
    Rejected(String),
    InternalError(String),
}

impl WebhookOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

impl Display for WebhookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied(outcome) => write!(f, "applied:{outcome}"),
            Self::UnknownProvider(_) => write!(f, "unknown_provider"),
            Self::ProviderNotConfigured(_) => write!(f, "provider_not_configured"),
            Self::SignatureInvalid(_) => write!(f, "signature_invalid"),
            Self::InvalidPayload(_) => write!(f, "invalid_payload"),
            Self::OrderNotFound(_) => write!(f, "order_not_found"),
            Self::Rejected(_) => write!(f, "rejected"),
            Self::InternalError(_) => write!(f, "internal_error"),
        }
    }
}

pub struct WebhookDispatcher<B, G> {
    api: OrderFlowApi<B, G>,
}

impl<B, G> std::fmt::Debug for WebhookDispatcher<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookDispatcher")
    }
}

impl<B, G> WebhookDispatcher<B, G> {
    pub fn new(api: OrderFlowApi<B, G>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &OrderFlowApi<B, G> {
        &self.api
    }
}

impl<B, G> WebhookDispatcher<B, G>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    pub async fn dispatch(&self, provider_name: &str, raw_body: &[u8], headers: &CallbackHeaders) -> WebhookOutcome {
        let provider = match provider_name.parse::<PaymentProvider>() {
            Ok(p) => p,
            Err(_) => {
                warn!("🪝️ Received a callback for unknown provider '{provider_name}'. Ignoring it.");
                let outcome = WebhookOutcome::UnknownProvider(provider_name.to_string());
                self.audit(provider_name, None, false, &outcome, raw_body).await;
                return outcome;
            },
        };
        let (outcome, reference, signature_valid) = self.process(provider, raw_body, headers).await;
        self.audit(provider.as_str(), reference, signature_valid, &outcome, raw_body).await;
        outcome
    }

    async fn process(
        &self,
        provider: PaymentProvider,
        raw_body: &[u8],
        headers: &CallbackHeaders,
    ) -> (WebhookOutcome, Option<String>, bool) {
        let gateway = self.api.gateway();
        let Some(verifier) = gateway.callback_verifier(provider) else {
            warn!("🪝️ Received a {provider} callback, but {provider} is not configured. Ignoring it.");
            return (WebhookOutcome::ProviderNotConfigured(provider), None, false);
        };
        if !verifier.verify(raw_body, headers) {
            warn!(
                target: SECURITY_LOG_TARGET,
                "🔐️ A {provider} callback failed signature verification and has been discarded. {} bytes, {} headers.",
                raw_body.len(),
                headers.len()
            );
            return (WebhookOutcome::SignatureInvalid(provider), None, false);
        }
        trace!("🪝️ {provider} callback signature is valid");
        let confirmation = match gateway.parse_callback(provider, raw_body, headers) {
            Ok(c) => c,
            Err(GatewayError::InvalidCallback(reason)) => {
                warn!("🪝️ Authentic {provider} callback could not be understood: {reason}");
                return (WebhookOutcome::InvalidPayload(reason), None, true);
            },
            Err(e) => {
                warn!("🪝️ Authentic {provider} callback could not be parsed: {e}");
                return (WebhookOutcome::InvalidPayload(e.to_string()), None, true);
            },
        };
        let reference = Some(confirmation.provider_reference.clone());
        debug!("🪝️ {provider} callback: {confirmation}");
        let outcome = match self.api.apply_payment_result(confirmation).await {
            Ok(result) => {
                let level = if result.is_transition() { Level::Info } else { Level::Debug };
                log!(level, "🪝️ {provider} callback processed: {result}");
                WebhookOutcome::Applied(result)
            },
            Err(e @ (OrderFlowError::OrderNotFound(_) | OrderFlowError::PaymentNotMatched { .. })) => {
                warn!("🪝️ {provider} callback does not match any order: {e}");
                WebhookOutcome::OrderNotFound(e.to_string())
            },
            Err(e @ (OrderFlowError::Storage(_) | OrderFlowError::Gateway(_))) => {
                error!("🪝️ {provider} callback could not be processed: {e}");
                WebhookOutcome::InternalError(e.to_string())
            },
            Err(e) => {
                warn!("🪝️ {provider} callback was rejected: {e}");
                WebhookOutcome::Rejected(e.to_string())
            },
        };
        (outcome, reference, true)
    }

    async fn audit(
        &self,
        provider: &str,
        provider_reference: Option<String>,
        signature_valid: bool,
        outcome: &WebhookOutcome,
        raw_body: &[u8],
    ) {
        let event = NewWebhookEvent {
            provider: provider.to_string(),
            provider_reference,
            signature_valid,
            outcome: outcome.to_string(),
            payload: String::from_utf8_lossy(raw_body).into_owned(),
            received_at: Utc::now(),
        };
        if let Err(e) = self.api.db().record_webhook_event(event).await {
            warn!("🪝️ Could not write the webhook audit record ({outcome}): {e}");
        }
    }
}
