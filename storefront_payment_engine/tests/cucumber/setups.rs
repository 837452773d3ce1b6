use cucumber::given;
use storefront_payment_engine::db_types::{Amount, NewProduct};

use crate::cucumber::{store_world::StoreSystem, StoreWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut StoreWorld) {
    let system = StoreSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "product '{word}' priced at {int} kobo with {int} in stock")]
async fn add_product(world: &mut StoreWorld, product_id: String, price: i64, stock: i64) {
    let product = NewProduct::new(product_id.as_str(), format!("Product {product_id}"), Amount::from(price), stock);
    world.api().inventory().add_product(product).await.expect("Error adding product");
}
