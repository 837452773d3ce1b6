use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use serde_json::json;
use storefront_payment_engine::{
    db_types::{Buyer, Order, OrderStatus, PaymentStatus, ProductId, StockRequest},
    order_objects::NewOrderRequest,
    SqliteDatabase,
};

use super::{
    helpers::{call, json, order_api, place_order},
    mocks::MockGateway,
};
use crate::routes::{ApproveOrderRoute, AttachGuestOrderRoute, CancelOrderRoute, CreateOrderRoute, OrderByIdRoute};

fn configure(cfg: &mut ServiceConfig) {
    cfg.service(CreateOrderRoute::<SqliteDatabase, MockGateway>::new())
        .service(AttachGuestOrderRoute::<SqliteDatabase, MockGateway>::new())
        .service(OrderByIdRoute::<SqliteDatabase, MockGateway>::new())
        .service(CancelOrderRoute::<SqliteDatabase, MockGateway>::new())
        .service(ApproveOrderRoute::<SqliteDatabase, MockGateway>::new());
}

const CATALOG: [(&str, i64, i64); 2] = [("MUG", 2_500, 5), ("LAMP", 12_000, 1)];

#[actix_web::test]
async fn checkout_creates_an_unpaid_order() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let body = json!({
        "guest_id": "sess-42",
        "items": [{"product_id": "MUG", "quantity": 2}, {"product_id": "LAMP", "quantity": 1}]
    });
    let req = TestRequest::post().uri("/orders").set_json(body).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(order.order_status, OrderStatus::PendingFulfillment);
    assert_eq!(order.buyer, Buyer::Guest("sess-42".into()));
    assert_eq!(order.total_price.value(), 17_000);
    assert_eq!(order.currency, "NGN");

    let req = TestRequest::get().uri(&format!("/orders/{}", order.order_id)).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(fetched, order);
}

#[actix_web::test]
async fn checkout_without_stock_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let body = json!({
        "user_id": "alice",
        "items": [{"product_id": "MUG", "quantity": 5}, {"product_id": "LAMP", "quantity": 2}]
    });
    let req = TestRequest::post().uri("/orders").set_json(body).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let body = json(&body);
    assert_eq!(body["code"], "insufficient_stock");
    assert!(body["error"].as_str().unwrap().contains("LAMP"));
    let mug = api.inventory().fetch_product(&ProductId::from("MUG")).await.unwrap().unwrap();
    assert_eq!(mug.quantity_on_hand, 5);
}

#[actix_web::test]
async fn malformed_checkouts_are_rejected() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let requests = [
        json!({"items": [{"product_id": "MUG", "quantity": 1}]}),
        json!({"user_id": "alice", "guest_id": "sess-1", "items": [{"product_id": "MUG", "quantity": 1}]}),
        json!({"user_id": "alice", "items": []}),
        json!({"user_id": "alice", "items": [{"product_id": "MUG", "quantity": 0}]}),
        json!({"user_id": "alice", "items": [{"product_id": "SOFA", "quantity": 1}]}),
        json!({"user_id": "alice", "items": [{"product_id": "MUG", "quantity": 1}], "currency": "naira"}),
    ];
    for body in requests {
        let req = TestRequest::post().uri("/orders").set_json(&body).to_request();
        let (status, response) = call(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body} -> {response}");
        assert_eq!(json(&response)["code"], "validation_error");
    }
    let mug = api.inventory().fetch_product(&ProductId::from("MUG")).await.unwrap().unwrap();
    assert_eq!(mug.quantity_on_hand, 5);
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let req = TestRequest::get().uri("/orders/no-such-order").to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["code"], "not_found");
    let req = TestRequest::post().uri("/orders/no-such-order/cancel").to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancel_returns_stock_once() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let order = place_order(
        &api,
        NewOrderRequest::new(Buyer::User("alice".into()), vec![StockRequest::new("MUG", 3)]),
    )
    .await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/cancel", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let cancelled: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(cancelled.order_status, OrderStatus::Cancelled);

    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "invalid_transition");
    let mug = api.inventory().fetch_product(&ProductId::from("MUG")).await.unwrap().unwrap();
    assert_eq!(mug.quantity_on_hand, 5);
}

#[actix_web::test]
async fn unpaid_orders_cannot_be_approved() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let order = place_order(
        &api,
        NewOrderRequest::new(Buyer::User("alice".into()), vec![StockRequest::new("LAMP", 1)]),
    )
    .await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let uri = format!("/orders/{}/approve", order.order_id);
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "not_paid");

    api.cancel_order(&order.order_id).await.unwrap();
    let (status, body) = call(&app, TestRequest::post().uri(&uri).to_request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["code"], "cancelled");
}

#[actix_web::test]
async fn guest_orders_move_to_new_accounts() {
    let _ = env_logger::try_init().ok();
    let api = web::Data::new(order_api(MockGateway::new(), &CATALOG).await);
    let order = place_order(
        &api,
        NewOrderRequest::new(Buyer::Guest("sess-7".into()), vec![StockRequest::new("MUG", 1)]),
    )
    .await;
    let app = test::init_service(App::new().app_data(api.clone()).configure(configure)).await;
    let body = json!({"guest_id": "sess-7", "user_id": "bob"});
    let req = TestRequest::post().uri("/orders/attach").set_json(&body).to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    let response = json(&response);
    assert_eq!(response["attached"], true);
    assert_eq!(response["order"]["order_id"], order.order_id.as_str());
    let fetched = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(fetched.buyer, Buyer::User("bob".into()));

    let req = TestRequest::post().uri("/orders/attach").set_json(&body).to_request();
    let (status, response) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&response)["attached"], false);

    let req = TestRequest::post().uri("/orders/attach").set_json(json!({"guest_id": " ", "user_id": "bob"})).to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
