#![allow(dead_code)]
//! A scriptable in-memory payment gateway and world setup shared by the integration tests.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use spg_common::Secret;
use storefront_payment_engine::{
    db_types::{Amount, ConfirmationStatus, NewProduct, Order, OrderId, PaymentConfirmation, PaymentProvider},
    events::EventProducers,
    helpers::{calculate_hmac, CallbackHeaders, HmacAlgorithm, SignatureEncoding, SignatureVerifier},
    test_utils::prepare_env::prepare_test_db,
    traits::{GatewayError, PaymentGateway, PaymentInitiation},
    InventoryLedger,
    OrderFlowApi,
    SqliteDatabase,
};

pub const WEBHOOK_SECRET: &str = "whsec_integration_tests";
pub const SIGNATURE_HEADER: &str = "x-test-signature";

#[derive(Debug, Default)]
struct FakeState {
    initiated: u64,
    settlements: HashMap<String, (ConfirmationStatus, Amount)>,
    initiate_delay: Option<Duration>,
}

/// Pretends to be Paystack. References are handed out sequentially and settled by the test.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
}

impl FakeGateway {
    /// Makes the next `verify_payment` calls for `reference` report the given result.
    pub fn settle(&self, reference: &str, status: ConfirmationStatus, amount: Amount) {
        let mut state = self.state.lock().unwrap();
        state.settlements.insert(reference.to_string(), (status, amount));
    }

    pub fn set_initiate_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().initiate_delay = delay;
    }

    pub fn initiated(&self) -> u64 {
        self.state.lock().unwrap().initiated
    }
}

#[derive(Deserialize)]
struct FakeCallback {
    reference: String,
    order_id: Option<String>,
    amount: i64,
    status: String,
}

impl PaymentGateway for FakeGateway {
    fn supports(&self, provider: PaymentProvider) -> bool {
        provider == PaymentProvider::Paystack
    }

    async fn initiate(&self, provider: PaymentProvider, order: &Order) -> Result<PaymentInitiation, GatewayError> {
        if order.is_paid() {
            return Err(GatewayError::Rejected(format!("{} is already paid", order.order_id)));
        }
        let delay = self.state.lock().unwrap().initiate_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let n = {
            let mut state = self.state.lock().unwrap();
            state.initiated += 1;
            state.initiated
        };
        let provider_reference = format!("FAKE-{}-{n}", order.order_id.as_str());
        Ok(PaymentInitiation {
            provider,
            redirect_url: format!("https://pay.example.com/{provider_reference}"),
            provider_reference,
        })
    }

    async fn verify_payment(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<PaymentConfirmation, GatewayError> {
        let settled = self.state.lock().unwrap().settlements.get(reference).copied();
        let (status, amount) = settled.unwrap_or((ConfirmationStatus::Pending, Amount::default()));
        Ok(PaymentConfirmation {
            provider,
            provider_reference: reference.to_string(),
            order_ref: None,
            amount,
            currency: None,
            status,
            occurred_at: Utc::now(),
        })
    }

    fn callback_verifier(&self, provider: PaymentProvider) -> Option<SignatureVerifier> {
        match provider {
            PaymentProvider::Paystack => Some(SignatureVerifier::hmac(
                HmacAlgorithm::Sha512,
                Secret::new(WEBHOOK_SECRET.to_string()),
                SIGNATURE_HEADER,
                SignatureEncoding::Hex,
            )),
            PaymentProvider::PalmPay => None,
        }
    }

    fn parse_callback(
        &self,
        provider: PaymentProvider,
        raw_body: &[u8],
        _headers: &CallbackHeaders,
    ) -> Result<PaymentConfirmation, GatewayError> {
        let body = serde_json::from_slice::<FakeCallback>(raw_body)
            .map_err(|e| GatewayError::InvalidCallback(e.to_string()))?;
        let status = match body.status.as_str() {
            "success" => ConfirmationStatus::Succeeded,
            "failed" => ConfirmationStatus::Failed,
            "pending" => ConfirmationStatus::Pending,
            other => return Err(GatewayError::InvalidCallback(format!("unknown status {other}"))),
        };
        Ok(PaymentConfirmation {
            provider,
            provider_reference: body.reference,
            order_ref: body.order_id.map(OrderId::from),
            amount: Amount::from(body.amount),
            currency: None,
            status,
            occurred_at: Utc::now(),
        })
    }
}

/// Serialises `body` and signs it the way the fake provider does.
pub fn signed_callback(body: &Value) -> (Vec<u8>, CallbackHeaders) {
    let raw = serde_json::to_vec(body).unwrap();
    let digest = calculate_hmac(HmacAlgorithm::Sha512, WEBHOOK_SECRET.as_bytes(), &raw);
    let headers = CallbackHeaders::new().with_header(SIGNATURE_HEADER, SignatureEncoding::Hex.encode(&digest));
    (raw, headers)
}

pub fn callback_body(order: &Order, reference: &str, status: &str) -> Value {
    serde_json::json!({
        "reference": reference,
        "order_id": order.order_id.as_str(),
        "amount": order.total_price.value(),
        "status": status,
    })
}

/// A fresh database stocked with `products` (id, unit price, quantity on hand), and an order flow API on top of it.
pub async fn setup(
    products: &[(&str, i64, i64)],
    producers: EventProducers,
) -> (OrderFlowApi<SqliteDatabase, FakeGateway>, FakeGateway) {
    let db = prepare_test_db().await;
    let ledger = InventoryLedger::new(db.clone());
    for (id, price, stock) in products {
        let product = NewProduct::new(*id, format!("Product {id}"), Amount::from(*price), *stock);
        ledger.add_product(product).await.unwrap();
    }
    let gateway = FakeGateway::default();
    let api = OrderFlowApi::new(db, gateway.clone(), producers);
    (api, gateway)
}

pub async fn on_hand(api: &OrderFlowApi<SqliteDatabase, FakeGateway>, product_id: &str) -> i64 {
    api.inventory().fetch_product(&product_id.into()).await.unwrap().unwrap().quantity_on_hand
}
