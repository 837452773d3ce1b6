use std::time::Duration;

use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::Utc;
use serde_json::json;
use storefront_payment_engine::{
    db_types::{Amount, Buyer, ConfirmationStatus, PaymentConfirmation, PaymentProvider, PaymentStatus, StockRequest},
    order_objects::NewOrderRequest,
    traits::{GatewayError, PaymentInitiation},
    SqliteDatabase,
};

use super::{
    helpers::{call, json, order_api, place_order},
    mocks::MockGateway,
};
use crate::routes::{ApproveOrderRoute, OrderByIdRoute, PayOrderRoute, VerifyOrderPaymentRoute};

fn configure(cfg: &mut ServiceConfig) {
    cfg.service(PayOrderRoute::<SqliteDatabase, MockGateway>::new())
        .service(VerifyOrderPaymentRoute::<SqliteDatabase, MockGateway>::new())
        .service(OrderByIdRoute::<SqliteDatabase, MockGateway>::new())
        .service(ApproveOrderRoute::<SqliteDatabase, MockGateway>::new());
}

const CATALOG: [(&str, i64, i64); 1] = [("MUG", 2_500, 5)];

fn checkout() -> NewOrderRequest {
    NewOrderRequest::new(Buyer::User("alice".into()), vec![StockRequest::new("MUG", 2)])
}

fn initiation_returning(reference: &'static str) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_supports().return_const(true);
    gateway.expect_initiate().returning(move |provider, order| {
        Ok(PaymentInitiation {
            provider,
            redirect_url: format!("https://checkout.example.test/{}", order.order_id),
            provider_reference: reference.to_string(),
        })
    });
    gateway
}

#[actix_web::test]
async fn pay_returns_the_checkout_redirect() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(initiation_returning("PSK-001"), &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/pay", order.order_id);
    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "paystack"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["provider"], "paystack");
    assert_eq!(body["provider_reference"], "PSK-001");
    assert_eq!(body["payment_status"], "Pending");
    assert_eq!(body["redirect_url"], format!("https://checkout.example.test/{}", order.order_id));

    // A second attempt is refused once a provider reference has been recorded
    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "paystack"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "invalid_transition");
}

#[actix_web::test]
async fn pay_rejects_unknown_providers() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/pay", order.order_id);
    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "stripe"})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let order = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
}

#[actix_web::test]
async fn unconfigured_providers_leave_the_order_unpaid() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_supports().returning(|provider| provider == PaymentProvider::Paystack);
    gateway.expect_initiate().never();
    let api = web::Data::new(order_api(gateway, &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/pay", order.order_id);
    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "palmpay"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let order = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.payment_method, None);
}

#[actix_web::test]
async fn slow_providers_time_out_and_can_be_retried() {
    let _ = env_logger::try_init().ok();
    let mut gateway = MockGateway::new();
    gateway.expect_supports().return_const(true);
    let mut seq = mockall::Sequence::new();
    gateway
        .expect_initiate()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(GatewayError::Timeout(Duration::from_secs(30))));
    gateway
        .expect_initiate()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(GatewayError::Communication("connection reset by peer".into())));
    gateway.expect_initiate().times(1).in_sequence(&mut seq).returning(|provider, _| {
        Ok(PaymentInitiation {
            provider,
            redirect_url: "https://checkout.example.test/retry".into(),
            provider_reference: "PSK-RETRY".into(),
        })
    });
    let api = web::Data::new(order_api(gateway, &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/pay", order.order_id);

    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "paystack"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json(&body)["code"], "gateway_timeout");
    let pending = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(pending.payment_status, PaymentStatus::Pending);
    assert_eq!(pending.provider_reference, None);

    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "paystack"})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let req = TestRequest::post().uri(&uri).set_json(json!({"provider": "paystack"})).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["provider_reference"], "PSK-RETRY");
}

#[actix_web::test]
async fn verification_marks_the_order_paid() {
    let _ = env_logger::try_init().ok();
    let mut gateway = initiation_returning("PSK-777");
    gateway.expect_verify_payment().returning(|provider, reference| {
        Ok(PaymentConfirmation {
            provider,
            provider_reference: reference.to_string(),
            order_ref: None,
            amount: Amount::from(5_000),
            currency: Some("NGN".into()),
            status: ConfirmationStatus::Succeeded,
            occurred_at: Utc::now(),
        })
    });
    let api = web::Data::new(order_api(gateway, &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    api.begin_payment(&order.order_id, PaymentProvider::Paystack).await.unwrap();
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;

    let uri = format!("/orders/{}/verify", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json(&body);
    assert_eq!(body["result"], "Paid");
    assert_eq!(body["order"]["payment_status"], "Paid");

    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["result"], "AlreadyPaid");

    let uri = format!("/orders/{}/approve", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["order_status"], "Approved");
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "already_approved");
}

#[actix_web::test]
async fn underpayments_are_not_applied() {
    let _ = env_logger::try_init().ok();
    let mut gateway = initiation_returning("PSK-778");
    gateway.expect_verify_payment().returning(|provider, reference| {
        Ok(PaymentConfirmation {
            provider,
            provider_reference: reference.to_string(),
            order_ref: None,
            amount: Amount::from(100),
            currency: Some("NGN".into()),
            status: ConfirmationStatus::Succeeded,
            occurred_at: Utc::now(),
        })
    });
    let api = web::Data::new(order_api(gateway, &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    api.begin_payment(&order.order_id, PaymentProvider::Paystack).await.unwrap();
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;

    let uri = format!("/orders/{}/verify", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "amount_mismatch");
    let order = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn callback_providers_cannot_be_polled() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(initiation_returning("PP-1"), &CATALOG).await);
    let order = place_order(&api, checkout()).await;
    api.begin_payment(&order.order_id, PaymentProvider::PalmPay).await.unwrap();
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/verify", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}
