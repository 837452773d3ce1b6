use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use spg_common::Secret;
use storefront_payment_engine::{
    db_types::{
        Amount,
        Buyer,
        ConfirmationStatus,
        OrderId,
        PaymentConfirmation,
        PaymentProvider,
        PaymentStatus,
        ProductId,
        StockRequest,
    },
    helpers::{calculate_hmac, HmacAlgorithm, SignatureEncoding, SignatureVerifier},
    order_objects::NewOrderRequest,
    traits::{GatewayError, WebhookAudit},
    SqliteDatabase,
    WebhookDispatcher,
};

use super::{
    helpers::{call, order_api, place_order},
    mocks::MockGateway,
};
use crate::routes::PaymentWebhookRoute;

const SECRET: &str = "sk_test_endpoint_webhooks";
const SIGNATURE_HEADER: &str = "x-paystack-signature";

fn configure(cfg: &mut ServiceConfig) {
    cfg.service(PaymentWebhookRoute::<SqliteDatabase, MockGateway>::new());
}

#[derive(Deserialize)]
struct TestCallback {
    reference: String,
    order_id: String,
    amount: i64,
    status: String,
}

/// A gateway that only knows Paystack, with callbacks signed by an HMAC-SHA512 of the body.
fn paystack_only() -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_callback_verifier().returning(|provider| match provider {
        PaymentProvider::Paystack => Some(SignatureVerifier::hmac(
            HmacAlgorithm::Sha512,
            Secret::new(SECRET.to_string()),
            SIGNATURE_HEADER,
            SignatureEncoding::Hex,
        )),
        PaymentProvider::PalmPay => None,
    });
    gateway.expect_parse_callback().returning(|provider, raw_body, _| {
        let cb: TestCallback =
            serde_json::from_slice(raw_body).map_err(|e| GatewayError::InvalidCallback(e.to_string()))?;
        let status = match cb.status.as_str() {
            "success" => ConfirmationStatus::Succeeded,
            "failed" => ConfirmationStatus::Failed,
            _ => ConfirmationStatus::Pending,
        };
        Ok(PaymentConfirmation {
            provider,
            provider_reference: cb.reference,
            order_ref: Some(OrderId::from(cb.order_id)),
            amount: Amount::from(cb.amount),
            currency: None,
            status,
            occurred_at: Utc::now(),
        })
    });
    gateway
}

fn callback(order_id: &str, reference: &str, amount: i64, status: &str) -> Vec<u8> {
    let body = json!({"reference": reference, "order_id": order_id, "amount": amount, "status": status});
    serde_json::to_vec(&body).unwrap()
}

fn sign(body: &[u8]) -> String {
    SignatureEncoding::Hex.encode(&calculate_hmac(HmacAlgorithm::Sha512, SECRET.as_bytes(), body))
}

fn webhook_request(provider: &str, body: &[u8], signature: &str) -> actix_http::Request {
    TestRequest::post()
        .uri(&format!("/payments/webhook/{provider}"))
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body.to_vec())
        .to_request()
}

#[actix_web::test]
async fn every_callback_gets_the_same_acknowledgement() {
    let _ = env_logger::try_init().ok();
    let api = order_api(paystack_only(), &[("MUG", 2_500, 5)]).await;
    let order =
        place_order(&api, NewOrderRequest::new(Buyer::User("alice".into()), vec![StockRequest::new("MUG", 2)])).await;
    let dispatcher = web::Data::new(WebhookDispatcher::new(api));
    let app = test::init_service(App::new().app_data(dispatcher.clone()).configure(configure)).await;

    let genuine = callback(order.order_id.as_str(), "PSK-1", 5000, "success");
    let forged = callback(order.order_id.as_str(), "PSK-1", 50, "success");
    let unknown = callback("nope", "PSK-9", 5000, "success");

    let requests = [
        webhook_request("paystack", &forged, &sign(&genuine)),
        webhook_request("paystack", &genuine, "not-a-signature"),
        webhook_request("stripe", &genuine, &sign(&genuine)),
        webhook_request("palmpay", &genuine, &sign(&genuine)),
        webhook_request("paystack", b"{not json", &sign(b"{not json")),
        webhook_request("paystack", &unknown, &sign(&unknown)),
        webhook_request("paystack", &genuine, &sign(&genuine)),
        webhook_request("paystack", &genuine, &sign(&genuine)),
    ];
    let mut responses = Vec::new();
    for req in requests {
        responses.push(call(&app, req).await);
    }
    for (status, body) in &responses {
        assert_eq!(*status, StatusCode::OK);
        assert_eq!(body, &responses[0].1);
    }

    let api = dispatcher.api();
    let paid = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.provider_reference.as_deref(), Some("PSK-1"));

    let events = api.db().fetch_webhook_events(None, 20).await.unwrap();
    let outcomes = events.iter().rev().map(|e| e.outcome.as_str()).collect::<Vec<_>>();
    assert_eq!(outcomes, vec![
        "signature_invalid",
        "signature_invalid",
        "unknown_provider",
        "provider_not_configured",
        "invalid_payload",
        "order_not_found",
        "applied:paid",
        "applied:duplicate_paid",
    ]);
    assert_eq!(events[events.len() - 3].provider, "stripe");
}

#[actix_web::test]
async fn failed_payment_callback_returns_stock() {
    let _ = env_logger::try_init().ok();
    let api = order_api(paystack_only(), &[("MUG", 2_500, 5)]).await;
    let order =
        place_order(&api, NewOrderRequest::new(Buyer::Guest("sess-3".into()), vec![StockRequest::new("MUG", 4)])).await;
    let dispatcher = web::Data::new(WebhookDispatcher::new(api));
    let app = test::init_service(App::new().app_data(dispatcher.clone()).configure(configure)).await;

    let body = callback(order.order_id.as_str(), "PSK-2", 10_000, "failed");
    for _ in 0..2 {
        let (status, _) = call(&app, webhook_request("paystack", &body, &sign(&body))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let api = dispatcher.api();
    let failed = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    let mug = api.inventory().fetch_product(&ProductId::from("MUG")).await.unwrap().unwrap();
    assert_eq!(mug.quantity_on_hand, 5);
}
