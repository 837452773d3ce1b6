use std::time::Duration;

use storefront_payment_engine::{
    db_types::{Buyer, OrderStatus, ProductId, StockRequest},
    order_objects::NewOrderRequest,
};

use super::{
    helpers::{order_api, place_order},
    mocks::MockGateway,
};
use crate::expiry_worker::run_expiry_job;

#[actix_web::test]
async fn expiry_job_cancels_stale_orders() {
    let _ = env_logger::try_init().ok();
    let api = order_api(MockGateway::new(), &[("MUG", 2_500, 5)]).await;
    let order =
        place_order(&api, NewOrderRequest::new(Buyer::Guest("sess-1".into()), vec![StockRequest::new("MUG", 3)])).await;
    assert_eq!(run_expiry_job(&api, chrono::Duration::hours(48)).await, 0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(run_expiry_job(&api, chrono::Duration::zero()).await, 1);
    let expired = api.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(expired.order_status, OrderStatus::Cancelled);
    let mug = api.inventory().fetch_product(&ProductId::from("MUG")).await.unwrap().unwrap();
    assert_eq!(mug.quantity_on_hand, 5);
    assert_eq!(run_expiry_job(&api, chrono::Duration::zero()).await, 0);
}
