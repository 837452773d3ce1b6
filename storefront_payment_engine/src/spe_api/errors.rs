use thiserror::Error;

use crate::{
    db_types::{Amount, OrderId, OrderStatus, PaymentStatus, ProductId},
    traits::{GatewayError, StorageError},
};

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("Insufficient stock for product {product_id}: {requested} requested, {available} available")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Quantity {quantity} for product {product_id} is not a positive number")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
    #[error("{0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request: {0}")]
    ValidationError(String),
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(ProductId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No {provider} payment with reference {reference} matches an order")]
    PaymentNotMatched { provider: String, reference: String },
    #[error("Cannot {action} order {order_id}: payment status is {payment_status} and order status is {order_status}")]
    InvalidTransition {
        order_id: OrderId,
        action: &'static str,
        payment_status: PaymentStatus,
        order_status: OrderStatus,
    },
    #[error("The payment of {received} for order {order_id} does not match the order total of {expected}")]
    AmountMismatch { order_id: OrderId, expected: Amount, received: Amount },
    #[error("The payment for order {order_id} was made in {received}, but the order is priced in {expected}")]
    CurrencyMismatch { order_id: OrderId, expected: String, received: String },
    #[error("Payment reference {received} does not match {expected} already recorded on order {order_id}")]
    ReferenceMismatch { order_id: OrderId, expected: String, received: String },
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl From<InventoryError> for OrderFlowError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::InsufficientStock { product_id, .. } => Self::InsufficientStock(product_id),
            InventoryError::ProductNotFound(id) => Self::ValidationError(format!("Product {id} does not exist")),
            InventoryError::InvalidQuantity { .. } => Self::ValidationError(e.to_string()),
            InventoryError::Storage(e) => Self::Storage(e),
        }
    }
}
