use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use storefront_payment_engine::{
    db_types::{Amount, Order, OrderId, PaymentConfirmation, PaymentProvider},
    helpers::{HmacAlgorithm, SignatureEncoding, SignatureVerifier},
    traits::PaymentInitiation,
};

use crate::{
    config::PaystackConfig,
    data_objects::{PaystackEnvelope, PaystackInitializeData, PaystackTransaction, PaystackWebhook},
    GatewayApiError,
};

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
    timeout: Duration,
}

impl std::fmt::Debug for PaystackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaystackApi({})", self.config.base_url)
    }
}

impl PaystackApi {
    pub fn new(config: PaystackConfig, timeout: Duration) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), timeout })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("💳️ Sending Paystack query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::from_reqwest(e, self.timeout))?;
        if response.status().is_success() {
            trace!("💳️ Paystack query successful. {}", response.status());
            let envelope = response
                .json::<PaystackEnvelope<T>>()
                .await
                .map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
            match (envelope.status, envelope.data) {
                (true, Some(data)) => Ok(data),
                (_, _) => Err(GatewayApiError::ProviderError { code: "status=false".into(), message: envelope.message }),
            }
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    /// Starts a Paystack checkout for the order. The order total is already in kobo, which is what Paystack expects.
    pub async fn initialize_transaction(&self, order: &Order) -> Result<PaymentInitiation, GatewayApiError> {
        let body = self.initialize_request(order, Utc::now());
        debug!("💳️ Initializing Paystack transaction for order {}", order.order_id);
        let data = self
            .rest_query::<PaystackInitializeData, _>(Method::POST, "/transaction/initialize", Some(body))
            .await?;
        info!("💳️ Paystack transaction {} created for order {}", data.reference, order.order_id);
        Ok(PaymentInitiation {
            provider: PaymentProvider::Paystack,
            redirect_url: data.authorization_url,
            provider_reference: data.reference,
        })
    }

    pub(crate) fn initialize_request(&self, order: &Order, now: DateTime<Utc>) -> serde_json::Value {
        let buyer = order.buyer.user_id().or(order.buyer.guest_id()).unwrap_or("customer");
        let mut body = json!({
            "email": format!("{buyer}@{}", self.config.customer_email_domain),
            "amount": order.total_price.value(),
            "currency": order.currency,
            "reference": transaction_reference(&order.order_id, now),
            "metadata": { "order_id": order.order_id.as_str() },
        });
        if !self.config.callback_url.is_empty() {
            body["callback_url"] = json!(self.config.callback_url);
        }
        body
    }

    /// Asks Paystack for the current state of a transaction.
    pub async fn verify_transaction(&self, reference: &str) -> Result<PaymentConfirmation, GatewayApiError> {
        let path = format!("/transaction/verify/{}", sanitize_reference(reference));
        debug!("💳️ Verifying Paystack transaction {reference}");
        let tx = self.rest_query::<PaystackTransaction, ()>(Method::GET, &path, None).await?;
        debug!("💳️ Paystack transaction {reference} is {}", tx.status);
        Ok(confirmation_from(tx))
    }

    pub fn webhook_verifier(&self) -> SignatureVerifier {
        SignatureVerifier::hmac(
            HmacAlgorithm::Sha512,
            self.config.secret_key.clone(),
            PAYSTACK_SIGNATURE_HEADER,
            SignatureEncoding::Hex,
        )
    }

    /// Normalises a (verified) Paystack webhook. Only `charge.success` and `charge.failed` carry payment outcomes.
    pub fn parse_webhook(&self, raw_body: &[u8]) -> Result<PaymentConfirmation, GatewayApiError> {
        let webhook = serde_json::from_slice::<PaystackWebhook>(raw_body)
            .map_err(|e| GatewayApiError::InvalidCallback(format!("Not a Paystack charge event. {e}")))?;
        match webhook.event.as_str() {
            "charge.success" | "charge.failed" => Ok(confirmation_from(webhook.data)),
            other => Err(GatewayApiError::InvalidCallback(format!("Unsupported Paystack event {other}"))),
        }
    }
}

/// `ORDER_{order id}_{unix millis}`, unique per payment attempt.
fn transaction_reference(order_id: &OrderId, now: DateTime<Utc>) -> String {
    format!("ORDER_{}_{}", order_id.as_str(), now.timestamp_millis())
}

fn sanitize_reference(reference: &str) -> String {
    reference.chars().filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '=')).collect()
}

fn confirmation_from(tx: PaystackTransaction) -> PaymentConfirmation {
    let status = tx.confirmation_status();
    let order_ref = tx.order_id().map(OrderId::from);
    let occurred_at = tx
        .paid_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    PaymentConfirmation {
        provider: PaymentProvider::Paystack,
        provider_reference: tx.reference,
        order_ref,
        amount: Amount::from(tx.amount),
        currency: tx.currency,
        status,
        occurred_at,
    }
}
