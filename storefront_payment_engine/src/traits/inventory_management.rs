use crate::{
    db_types::{NewProduct, Product, ProductId, ProductUpdate},
    traits::StorageError,
};

/// Stock-level primitives for the inventory ledger.
///
/// Backends must implement [`Self::try_decrement_stock`] as a single atomic conditional update. The ledger's
/// correctness under concurrent checkouts rests entirely on that guarantee; no locks are taken above it.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StorageError>;

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, StorageError>;

    /// Fetches the listed products. Unknown ids are silently omitted from the result.
    async fn fetch_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>, StorageError>;

    /// Applies the catalog fields in `update`. Returns `None` if the product does not exist.
    async fn update_product(
        &self,
        product_id: &ProductId,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StorageError>;

    /// `quantity_on_hand -= quantity WHERE quantity_on_hand >= quantity`, atomically.
    ///
    /// Returns the updated product, or `None` if the product does not exist or has insufficient stock.
    async fn try_decrement_stock(&self, product_id: &ProductId, quantity: i64) -> Result<Option<Product>, StorageError>;

    /// `quantity_on_hand += quantity`, atomically. Returns `None` if the product does not exist.
    async fn increment_stock(&self, product_id: &ProductId, quantity: i64) -> Result<Option<Product>, StorageError>;
}
