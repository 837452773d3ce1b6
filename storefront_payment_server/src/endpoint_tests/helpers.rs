use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use serde_json::Value;
use storefront_payment_engine::{
    db_types::{Amount, NewProduct, Order},
    events::EventProducers,
    order_objects::NewOrderRequest,
    test_utils::prepare_env::prepare_test_db,
    OrderFlowApi,
    SqliteDatabase,
};

use super::mocks::MockGateway;

/// A fresh database stocked with `(product_id, price, stock)` products, driven by the given mock gateway.
pub async fn order_api(
    gateway: MockGateway,
    products: &[(&str, i64, i64)],
) -> OrderFlowApi<SqliteDatabase, MockGateway> {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db, gateway, EventProducers::default());
    for (id, price, stock) in products {
        api.inventory()
            .add_product(NewProduct::new(*id, format!("Product {id}"), Amount::from(*price), *stock))
            .await
            .expect("Failed to add product");
    }
    api
}

pub async fn place_order(api: &OrderFlowApi<SqliteDatabase, MockGateway>, request: NewOrderRequest) -> Order {
    api.create_order(request).await.expect("Failed to create order")
}

pub async fn call<S, B>(app: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = test::call_service(app, req).await;
    let status = res.status();
    let body = test::read_body(res).await;
    (status, String::from_utf8_lossy(&body).into_owned())
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).expect("Response was not JSON")
}
