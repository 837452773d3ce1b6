use std::collections::HashMap;

use cucumber::World;
use log::*;
use storefront_payment_engine::{
    db_types::{Order, OrderId},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};

use crate::support::FakeGateway;

#[derive(Default, Debug, World)]
pub struct StoreWorld {
    pub system: Option<StoreSystem>,
}

#[derive(Debug)]
pub struct StoreSystem {
    pub db_path: String,
    pub api: OrderFlowApi<SqliteDatabase, FakeGateway>,
    pub gateway: FakeGateway,
    /// Orders placed in the scenario, by the label the scenario gave them.
    pub orders: HashMap<String, OrderId>,
    pub references: HashMap<String, String>,
    pub last_error: Option<OrderFlowError>,
}

impl StoreWorld {
    pub fn system(&mut self) -> &mut StoreSystem {
        self.system.as_mut().expect("Store system not initialised")
    }

    pub fn api(&self) -> &OrderFlowApi<SqliteDatabase, FakeGateway> {
        &self.system.as_ref().expect("Store system not initialised").api
    }
}

impl StoreSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        debug!("Created database: {url}");
        let gateway = FakeGateway::default();
        let api = OrderFlowApi::new(db, gateway.clone(), EventProducers::default());
        Self {
            db_path: url,
            api,
            gateway,
            orders: HashMap::new(),
            references: HashMap::new(),
            last_error: None,
        }
    }

    pub fn order_id(&self, label: &str) -> OrderId {
        self.orders.get(label).cloned().unwrap_or_else(|| panic!("No order labelled {label}"))
    }

    pub async fn order(&self, label: &str) -> Order {
        self.api.fetch_order(&self.order_id(label)).await.expect("Error fetching order")
    }
}
