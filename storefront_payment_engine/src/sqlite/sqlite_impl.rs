//! `SqliteDatabase` is a concrete implementation of a storefront payment engine backend.
//!
//! It implements all the backend traits defined in the [`crate::traits`] module on top of a WAL-mode SQLite pool.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{new_pool, orders, products, webhook_events};
use crate::{
    db_types::{NewOrder, NewProduct, Order, OrderId, PaymentProvider, PaymentStatus, Product, ProductId, ProductUpdate},
    traits::{
        InventoryManagement,
        NewWebhookEvent,
        OrderManagement,
        PaymentEngineDatabase,
        StorageError,
        WebhookAudit,
        WebhookEvent,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, connecting to the database at `url` with at most `max_connections`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool to {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl PaymentEngineDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::insert_product(product, &mut conn).await?;
        debug!("🗃️ Product {} added with {} units on hand", product.product_id, product.quantity_on_hand);
        Ok(product)
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(product_ids, &mut conn).await?;
        Ok(products)
    }

    async fn update_product(
        &self,
        product_id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::update_product(product_id, update, &mut conn).await?;
        Ok(product)
    }

    async fn try_decrement_stock(&self, product_id: &ProductId, quantity: i64) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::try_decrement_stock(product_id, quantity, &mut conn).await?;
        Ok(product)
    }

    async fn increment_stock(&self, product_id: &ProductId, quantity: i64) -> Result<Option<Product>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::increment_stock(product_id, quantity, &mut conn).await?;
        Ok(product)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StorageError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_order_by_provider_reference(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_provider_reference(provider, reference, &mut conn).await
    }

    async fn try_begin_payment(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_begin_payment(order_id, &mut conn).await
    }

    async fn try_set_provider_reference(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_set_provider_reference(order_id, provider, reference, &mut conn).await
    }

    async fn try_mark_paid(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_mark_paid(order_id, provider, reference, paid_at, &mut conn).await
    }

    async fn try_mark_failed(
        &self,
        order_id: &OrderId,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_mark_failed(order_id, provider, reference, &mut conn).await
    }

    async fn try_cancel(&self, order_id: &OrderId, allowed: &[PaymentStatus]) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_cancel(order_id, allowed, &mut conn).await
    }

    async fn try_approve(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_approve(order_id, &mut conn).await
    }

    async fn try_release_order_stock(&self, order_id: &OrderId) -> Result<Option<Order>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::try_claim_stock_release(order_id, &mut tx).await? else {
            return Ok(None);
        };
        for item in order.stock_requests() {
            match products::increment_stock(&item.product_id, item.quantity, &mut tx).await? {
                Some(_) => trace!("🗃️ Returned {} of {} from order {order_id}", item.quantity, item.product_id),
                None => warn!(
                    "🗃️ Cannot return {} of {} from order {order_id}: the product no longer exists",
                    item.quantity, item.product_id
                ),
            }
        }
        tx.commit().await?;
        debug!("🗃️ Stock for order {order_id} has been returned");
        Ok(Some(order))
    }

    async fn fetch_closed_orders_holding_stock(&self) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_closed_orders_holding_stock(&mut conn).await
    }

    async fn try_attach_guest_order(&self, guest_id: &str, user_id: &str) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_attach_guest_order(guest_id, user_id, &mut conn).await
    }

    async fn fetch_expirable_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_expirable_orders(cutoff, &mut conn).await
    }

    async fn try_expire(&self, order_id: &OrderId, cutoff: DateTime<Utc>) -> Result<Option<Order>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        orders::try_expire(order_id, cutoff, &mut conn).await
    }
}

impl WebhookAudit for SqliteDatabase {
    async fn record_webhook_event(&self, event: NewWebhookEvent) -> Result<i64, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let id = webhook_events::insert_event(event, &mut conn).await?;
        trace!("🗃️ Webhook event #{id} recorded");
        Ok(id)
    }

    async fn fetch_webhook_events(
        &self,
        provider: Option<PaymentProvider>,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        let events = webhook_events::fetch_events(provider.as_ref().map(PaymentProvider::as_str), limit, &mut conn).await?;
        Ok(events)
    }
}
