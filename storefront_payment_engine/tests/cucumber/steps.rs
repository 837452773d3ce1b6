use chrono::Utc;
use cucumber::{then, when};
use storefront_payment_engine::{
    db_types::{Buyer, ConfirmationStatus, PaymentConfirmation, PaymentProvider, StockRequest},
    order_objects::{ApprovalOutcome, NewOrderRequest},
    OrderFlowError,
};

use crate::cucumber::StoreWorld;

fn parse_items(items: &str) -> Vec<StockRequest> {
    // "2 MUG, 1 LAMP"
    items
        .split(',')
        .map(|item| {
            let mut parts = item.split_whitespace();
            let qty = parts.next().and_then(|q| q.parse::<i64>().ok()).expect("Item quantity");
            let product = parts.next().expect("Item product id");
            StockRequest::new(product, qty)
        })
        .collect()
}

async fn place_order(world: &mut StoreWorld, buyer: Buyer, label: String, items: String) {
    let request = NewOrderRequest::new(buyer, parse_items(&items));
    let result = world.api().create_order(request).await;
    let system = world.system();
    match result {
        Ok(order) => {
            system.orders.insert(label, order.order_id);
            system.last_error = None;
        },
        Err(e) => system.last_error = Some(e),
    }
}

#[when(expr = "customer '{word}' places order {word} for {string}")]
async fn customer_order(world: &mut StoreWorld, customer: String, label: String, items: String) {
    place_order(world, Buyer::User(customer), label, items).await;
}

#[when(expr = "guest '{word}' places order {word} for {string}")]
async fn guest_order(world: &mut StoreWorld, guest: String, label: String, items: String) {
    place_order(world, Buyer::Guest(guest), label, items).await;
}

#[when(expr = "payment for order {word} is started with {word}")]
async fn start_payment(world: &mut StoreWorld, label: String, provider: String) {
    let provider = provider.parse::<PaymentProvider>().expect("Unknown provider");
    let order_id = world.system().order_id(&label);
    let result = world.api().begin_payment(&order_id, provider).await;
    let system = world.system();
    match result {
        Ok(started) => {
            system.references.insert(label, started.initiation.provider_reference);
            system.last_error = None;
        },
        Err(e) => system.last_error = Some(e),
    }
}

async fn provider_reports(world: &mut StoreWorld, label: &str, status: ConfirmationStatus, times: usize) {
    let order = world.system().order(label).await;
    let reference = world.system().references.get(label).cloned().expect("Payment was never started");
    for _ in 0..times {
        let confirmation = PaymentConfirmation {
            provider: PaymentProvider::Paystack,
            provider_reference: reference.clone(),
            order_ref: Some(order.order_id.clone()),
            amount: order.total_price,
            currency: Some(order.currency.clone()),
            status,
            occurred_at: Utc::now(),
        };
        let result = world.api().apply_payment_result(confirmation).await;
        world.system().last_error = result.err();
    }
}

#[when(expr = "the provider confirms payment for order {word}")]
async fn confirm_payment(world: &mut StoreWorld, label: String) {
    provider_reports(world, &label, ConfirmationStatus::Succeeded, 1).await;
}

#[when(expr = "the provider confirms payment for order {word} {int} times")]
async fn confirm_payment_repeatedly(world: &mut StoreWorld, label: String, times: usize) {
    provider_reports(world, &label, ConfirmationStatus::Succeeded, times).await;
}

#[when(expr = "the provider reports a failed payment for order {word}")]
async fn fail_payment(world: &mut StoreWorld, label: String) {
    provider_reports(world, &label, ConfirmationStatus::Failed, 1).await;
}

#[when(expr = "order {word} is cancelled")]
async fn cancel_order(world: &mut StoreWorld, label: String) {
    let order_id = world.system().order_id(&label);
    let result = world.api().cancel_order(&order_id).await;
    world.system().last_error = result.err();
}

#[when(expr = "order {word} is approved")]
async fn approve_order(world: &mut StoreWorld, label: String) {
    let order_id = world.system().order_id(&label);
    let outcome = world.api().approve_fulfillment(&order_id).await.expect("Error approving order");
    let system = world.system();
    system.last_error = match outcome {
        ApprovalOutcome::Approved(_) => None,
        rejected => Some(OrderFlowError::ValidationError(rejected.to_string())),
    };
}

#[when(expr = "guest '{word}' signs up as '{word}'")]
async fn guest_signs_up(world: &mut StoreWorld, guest: String, user: String) {
    let attached = world.api().attach_guest_order(&guest, &user).await.expect("Error attaching guest order");
    assert!(attached.is_some(), "Guest {guest} had no order to attach");
}

#[then(expr = "order {word} is {word} and {word}")]
async fn check_order_state(world: &mut StoreWorld, label: String, payment_status: String, order_status: String) {
    let order = world.system().order(&label).await;
    assert_eq!(order.payment_status.to_string(), payment_status, "Payment status is incorrect");
    assert_eq!(order.order_status.to_string(), order_status, "Order status is incorrect");
}

#[then(expr = "order {word} totals {int} kobo")]
async fn check_total(world: &mut StoreWorld, label: String, total: i64) {
    let order = world.system().order(&label).await;
    assert_eq!(order.total_price.value(), total);
}

#[then(expr = "order {word} belongs to customer '{word}'")]
async fn check_buyer(world: &mut StoreWorld, label: String, customer: String) {
    let order = world.system().order(&label).await;
    assert_eq!(order.buyer, Buyer::User(customer));
}

#[then(expr = "'{word}' has {int} in stock")]
async fn check_stock(world: &mut StoreWorld, product_id: String, stock: i64) {
    let product = world
        .api()
        .inventory()
        .fetch_product(&product_id.as_str().into())
        .await
        .expect("Error fetching product")
        .expect("Product does not exist");
    assert_eq!(product.quantity_on_hand, stock, "Stock on hand is incorrect");
}

#[then("the request succeeded")]
async fn request_succeeded(world: &mut StoreWorld) {
    let error = world.system().last_error.take();
    assert!(error.is_none(), "Expected success, got {error:?}");
}

#[then(expr = "the request was rejected for insufficient stock of '{word}'")]
async fn rejected_for_stock(world: &mut StoreWorld, product_id: String) {
    match world.system().last_error.take() {
        Some(OrderFlowError::InsufficientStock(p)) => assert_eq!(p.as_str(), product_id),
        other => panic!("Expected insufficient stock, got {other:?}"),
    }
}

#[then("the request was rejected")]
async fn request_rejected(world: &mut StoreWorld) {
    let error = world.system().last_error.take();
    assert!(error.is_some(), "Expected the request to be rejected");
}
