use futures_util::future::join_all;
use log::*;
use storefront_payment_engine::{
    db_types::{Buyer, StockRequest},
    events::EventProducers,
    order_objects::NewOrderRequest,
    OrderFlowError,
};

mod support;

const STOCK: i64 = 10;
const NUM_BUYERS: usize = 25;

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let _ = env_logger::try_init();
    let (api, _) = support::setup(&[("SHOE", 15_000, STOCK)], EventProducers::default()).await;
    info!("🚀️ Injecting {NUM_BUYERS} simultaneous checkouts for {STOCK} items");
    let checkouts = (0..NUM_BUYERS).map(|i| {
        let request = NewOrderRequest::new(Buyer::Guest(format!("guest-{i}")), vec![StockRequest::new("SHOE", 1)]);
        api.create_order(request)
    });
    let results = join_all(checkouts).await;
    let placed = results.iter().filter(|r| r.is_ok()).count();
    let sold_out = results.iter().filter(|r| matches!(r, Err(OrderFlowError::InsufficientStock(_)))).count();
    assert_eq!(placed, STOCK as usize);
    assert_eq!(sold_out, NUM_BUYERS - STOCK as usize);
    assert_eq!(support::on_hand(&api, "SHOE").await, 0);
}

#[tokio::test]
async fn concurrent_multi_item_checkouts_roll_back_cleanly() {
    let _ = env_logger::try_init();
    let (api, _) = support::setup(&[("A", 1_000, 6), ("B", 2_000, 4)], EventProducers::default()).await;
    let checkouts = (0..12).map(|i| {
        let items = vec![StockRequest::new("A", 1), StockRequest::new("B", 1)];
        api.create_order(NewOrderRequest::new(Buyer::User(format!("user-{i}")), items))
    });
    let results = join_all(checkouts).await;
    let placed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(placed, 4);
    let a = support::on_hand(&api, "A").await;
    let b = support::on_hand(&api, "B").await;
    assert_eq!(b, 0);
    assert_eq!(a, 2);
}
