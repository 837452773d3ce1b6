use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    traits::StorageError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, StorageError> {
    if fetch_product(&product.product_id, conn).await?.is_some() {
        return Err(StorageError::ProductAlreadyExists(product.product_id));
    }
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (product_id, name, unit_price, quantity_on_hand, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(product.product_id)
    .bind(product.name)
    .bind(product.unit_price)
    .bind(product.quantity_on_hand)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE product_id = $1")
        .bind(product_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_products(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE product_id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(id.as_str());
    }
    list.push_unseparated(")");
    builder.push(" ORDER BY product_id");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn update_product(
    product_id: &ProductId,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    if update.is_empty() {
        debug!("🗃️ No fields to update for product {product_id}. Returning it unchanged.");
        return fetch_product(product_id, conn).await;
    }
    let mut builder = QueryBuilder::new("UPDATE products SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(name) = update.name {
        builder.push(", name = ");
        builder.push_bind(name);
    }
    if let Some(price) = update.unit_price {
        builder.push(", unit_price = ");
        builder.push_bind(price);
    }
    builder.push(" WHERE product_id = ");
    builder.push_bind(product_id.as_str());
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let product = builder.build_query_as::<Product>().fetch_optional(conn).await?;
    Ok(product)
}

/// The atomic conditional decrement. `None` means the product is unknown or has fewer than `quantity` units.
pub async fn try_decrement_stock(
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        r#"
            UPDATE products SET quantity_on_hand = quantity_on_hand - $1, updated_at = $2
            WHERE product_id = $3 AND quantity_on_hand >= $1
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(product)
}

pub async fn increment_stock(
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as(
        r#"
            UPDATE products SET quantity_on_hand = quantity_on_hand + $1, updated_at = $2
            WHERE product_id = $3
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id.as_str())
    .fetch_optional(conn)
    .await?;
    Ok(product)
}
