//! # Inventory ledger
//!
//! Stock is reserved when an order is placed, not when it is paid, so that a customer who is redirected to a payment
//! page is guaranteed the goods are still there when they return.
//!
//! A reservation walks the line items in order and applies one atomic conditional decrement per product. No lock
//! spans the items. If any decrement fails, the decrements already applied by *this* call are undone (compensated)
//! in reverse order, and the failure is reported against the first product that could not be reserved.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewProduct, Product, ProductId, ProductUpdate, Reservation, StockRequest},
    spe_api::errors::InventoryError,
    traits::InventoryManagement,
};

pub struct InventoryLedger<B> {
    db: B,
}

impl<B> Debug for InventoryLedger<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryLedger")
    }
}

impl<B> InventoryLedger<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> InventoryLedger<B>
where B: InventoryManagement
{
    /// Reserves every line in `items`, or none of them.
    pub async fn reserve(&self, items: &[StockRequest]) -> Result<Reservation, InventoryError> {
        if let Some(bad) = items.iter().find(|i| i.quantity <= 0) {
            return Err(InventoryError::InvalidQuantity { product_id: bad.product_id.clone(), quantity: bad.quantity });
        }
        let mut reserved: Vec<StockRequest> = Vec::with_capacity(items.len());
        for item in items {
            let result = self.db.try_decrement_stock(&item.product_id, item.quantity).await;
            match result {
                Ok(Some(product)) => {
                    trace!(
                        "📦️ Reserved {} of {}. {} left on hand",
                        item.quantity,
                        item.product_id,
                        product.quantity_on_hand
                    );
                    reserved.push(item.clone());
                },
                Ok(None) => {
                    self.compensate(&reserved).await;
                    return Err(self.classify_failure(item).await);
                },
                Err(e) => {
                    error!("📦️ Storage error while reserving {}: {e}. Rolling back this reservation.", item.product_id);
                    self.compensate(&reserved).await;
                    return Err(e.into());
                },
            }
        }
        debug!("📦️ Reserved stock for {} line items", reserved.len());
        Ok(Reservation { items: reserved })
    }

    /// Returns stock to the shelves. Every line is attempted even if an earlier one fails; the first failure is
    /// returned.
    pub async fn release(&self, items: &[StockRequest]) -> Result<(), InventoryError> {
        let mut first_error = None;
        for item in items {
            match self.db.increment_stock(&item.product_id, item.quantity).await {
                Ok(Some(_)) => trace!("📦️ Released {} of {}", item.quantity, item.product_id),
                Ok(None) => {
                    warn!("📦️ Cannot release {} of {}: the product no longer exists", item.quantity, item.product_id)
                },
                Err(e) => {
                    error!("📦️ Could not release {} of {}: {e}", item.quantity, item.product_id);
                    first_error.get_or_insert(InventoryError::from(e));
                },
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                debug!("📦️ Released stock for {} line items", items.len());
                Ok(())
            },
        }
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        if product.quantity_on_hand < 0 {
            return Err(InventoryError::InvalidQuantity {
                product_id: product.product_id,
                quantity: product.quantity_on_hand,
            });
        }
        let product = self.db.insert_product(product).await?;
        info!("📦️ New product {} ({}) at {}", product.product_id, product.name, product.unit_price);
        Ok(product)
    }

    pub async fn restock(&self, product_id: &ProductId, quantity: i64) -> Result<Product, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity { product_id: product_id.clone(), quantity });
        }
        let product = self
            .db
            .increment_stock(product_id, quantity)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))?;
        info!("📦️ Restocked {quantity} of {product_id}. {} on hand", product.quantity_on_hand);
        Ok(product)
    }

    pub async fn update_product(
        &self,
        product_id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Product, InventoryError> {
        self.db
            .update_product(product_id, update)
            .await?
            .ok_or_else(|| InventoryError::ProductNotFound(product_id.clone()))
    }

    pub async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, InventoryError> {
        Ok(self.db.fetch_product(product_id).await?)
    }

    async fn compensate(&self, reserved: &[StockRequest]) {
        for item in reserved.iter().rev() {
            match self.db.increment_stock(&item.product_id, item.quantity).await {
                Ok(_) => trace!("📦️ Compensated {} of {}", item.quantity, item.product_id),
                Err(e) => error!(
                    "📦️ Could not compensate {} of {} after a failed reservation: {e}. Stock for this product is now \
                     understated and needs a manual adjustment.",
                    item.quantity, item.product_id
                ),
            }
        }
    }

    async fn classify_failure(&self, item: &StockRequest) -> InventoryError {
        match self.db.fetch_product(&item.product_id).await {
            Ok(Some(product)) => {
                debug!(
                    "📦️ Insufficient stock for {}: {} requested, {} on hand",
                    item.product_id, item.quantity, product.quantity_on_hand
                );
                InventoryError::InsufficientStock {
                    product_id: item.product_id.clone(),
                    requested: item.quantity,
                    available: product.quantity_on_hand,
                }
            },
            Ok(None) => InventoryError::ProductNotFound(item.product_id.clone()),
            Err(e) => e.into(),
        }
    }
}
