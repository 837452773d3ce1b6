//! PalmPay checkout client.
//!
//! Every request is signed: the request fields are rendered as a canonical string, reduced to an upper-case hex MD5,
//! and that digest is signed with RSA-SHA1 using the merchant's private key. The base64 signature travels in the
//! `Signature` header. Callbacks are signed the same way by PalmPay, with the signature in the `sign` field.
use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use storefront_payment_engine::{
    db_types::{Amount, Order, OrderId, PaymentConfirmation, PaymentProvider},
    helpers::{
        canonical_string,
        parse_private_key,
        parse_public_key,
        AsymmetricAlgorithm,
        RsaPrivateKey,
        RsaPublicKey,
        SignatureEncoding,
        SignatureLocation,
        SignatureVerifier,
    },
    traits::PaymentInitiation,
};

use crate::{
    config::PalmPayConfig,
    data_objects::{PalmPayCallback, PalmPayCreateOrderData, PalmPayOrderStatus, PalmPayResponse},
    GatewayApiError,
};

const CREATE_ORDER_PATH: &str = "/api/v2/payment/merchant/createorder";
const API_VERSION: &str = "2.0";
const COUNTRY_CODE: &str = "NG";
const SIGNATURE_FIELD: &str = "sign";
const SIGN_TYPE_FIELD: &str = "signType";

#[derive(Clone)]
pub struct PalmPayApi {
    config: PalmPayConfig,
    client: Arc<Client>,
    merchant_key: RsaPrivateKey,
    palmpay_key: RsaPublicKey,
    timeout: Duration,
}

impl std::fmt::Debug for PalmPayApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PalmPayApi({}, merchant {})", self.config.base_url, self.config.merchant_id)
    }
}

impl PalmPayApi {
    pub fn new(config: PalmPayConfig, timeout: Duration) -> Result<Self, GatewayApiError> {
        let merchant_key = parse_private_key(config.merchant_private_key.reveal())
            .map_err(|e| GatewayApiError::InvalidConfiguration(format!("SPG_PALMPAY_PRIVATE_KEY: {e}")))?;
        let palmpay_key = parse_public_key(&config.palmpay_public_key)
            .map_err(|e| GatewayApiError::InvalidConfiguration(format!("SPG_PALMPAY_PUBLIC_KEY: {e}")))?;
        let mut headers = HeaderMap::with_capacity(3);
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.app_id))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("CountryCode", HeaderValue::from_static(COUNTRY_CODE));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), merchant_key, palmpay_key, timeout })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// The `Signature` header value for a request body.
    pub fn sign_request(&self, body: &Map<String, Value>) -> Result<String, GatewayApiError> {
        let canonical = canonical_string(body, &[]);
        trace!("💳️ PalmPay canonical request string: {canonical}");
        let signature = AsymmetricAlgorithm::Md5RsaSha1
            .sign(&self.merchant_key, &canonical)
            .map_err(|e| GatewayApiError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(signature))
    }

    async fn signed_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Map<String, Value>,
    ) -> Result<T, GatewayApiError> {
        let signature = self.sign_request(&body)?;
        let url = self.url(path);
        trace!("💳️ Sending PalmPay request: POST {url}");
        let response = self
            .client
            .post(url)
            .header("Signature", signature)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayApiError::from_reqwest(e, self.timeout))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            return Err(GatewayApiError::QueryError { status, message });
        }
        let result = response
            .json::<PalmPayResponse<T>>()
            .await
            .map_err(|e| GatewayApiError::JsonError(e.to_string()))?;
        match result {
            PalmPayResponse { resp_code, data: Some(data), .. } if resp_code == PalmPayResponse::<T>::SUCCESS => Ok(data),
            PalmPayResponse { resp_code, resp_msg, .. } => {
                Err(GatewayApiError::ProviderError { code: resp_code, message: resp_msg })
            },
        }
    }

    /// Creates a PalmPay checkout order for `order` and returns the checkout URL and PalmPay's order number.
    pub async fn create_order(&self, order: &Order) -> Result<PaymentInitiation, GatewayApiError> {
        let body = self.create_order_request(order, &nonce(), Utc::now());
        debug!("💳️ Creating PalmPay order for {}", order.order_id);
        let data = self.signed_post::<PalmPayCreateOrderData>(CREATE_ORDER_PATH, body).await?;
        info!("💳️ PalmPay order {} created for order {}", data.order_no, order.order_id);
        Ok(PaymentInitiation {
            provider: PaymentProvider::PalmPay,
            redirect_url: data.checkout_url,
            provider_reference: data.order_no,
        })
    }

    pub(crate) fn create_order_request(&self, order: &Order, nonce: &str, now: DateTime<Utc>) -> Map<String, Value> {
        let body = json!({
            "amount": order.total_price.value(),
            "callbackUrl": self.config.callback_url,
            "currency": order.currency,
            "description": "Order payment",
            "merchantId": self.config.merchant_id,
            "nonceStr": nonce,
            "notifyUrl": self.config.notify_url,
            "orderId": order.order_id.as_str(),
            "requestTime": now.timestamp_millis(),
            "version": API_VERSION,
        });
        match body {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn callback_verifier(&self) -> SignatureVerifier {
        SignatureVerifier::asymmetric(
            AsymmetricAlgorithm::Md5RsaSha1,
            self.palmpay_key.clone(),
            SignatureLocation::Field(SIGNATURE_FIELD.into()),
            SignatureEncoding::Base64,
        )
        .with_sign_type_field(SIGN_TYPE_FIELD)
    }

    /// Normalises a (verified) PalmPay payment notification.
    pub fn parse_callback(&self, raw_body: &[u8]) -> Result<PaymentConfirmation, GatewayApiError> {
        let callback = serde_json::from_slice::<PalmPayCallback>(raw_body)
            .map_err(|e| GatewayApiError::InvalidCallback(format!("Not a PalmPay payment notification. {e}")))?;
        let status = PalmPayOrderStatus::from_code(callback.order_status).ok_or_else(|| {
            GatewayApiError::InvalidCallback(format!("Unknown PalmPay orderStatus {}", callback.order_status))
        })?;
        let occurred_at =
            callback.complete_time.and_then(|ms| Utc.timestamp_millis_opt(ms).single()).unwrap_or_else(Utc::now);
        Ok(PaymentConfirmation {
            provider: PaymentProvider::PalmPay,
            provider_reference: callback.order_no,
            order_ref: Some(OrderId::from(callback.order_id)),
            amount: Amount::from(callback.amount),
            currency: callback.currency,
            status: status.confirmation_status(),
            occurred_at,
        })
    }
}

/// 16 random bytes, hex encoded.
fn nonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
