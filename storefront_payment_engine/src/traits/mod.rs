//! # Backend and gateway contracts
//!
//! This module defines the interfaces that a storage backend or payment gateway must provide in order to be driven by
//! the payment engine APIs.
//!
//! * [`InventoryManagement`] exposes the per-product stock primitives. The only stock mutations are an atomic
//!   conditional decrement and an unconditional increment.
//! * [`OrderManagement`] stores orders and exposes every order state transition as a single conditional update.
//!   Each transition method returns `None` when its precondition did not hold, leaving the caller to decide what
//!   the current state means.
//! * [`WebhookAudit`] records every inbound callback delivery.
//! * [`PaymentEngineDatabase`] ties the three together.
//! * [`PaymentGateway`] normalises the payment providers into a single shape.
mod data_objects;
mod inventory_management;
mod order_management;
mod payment_gateway;
mod webhook_audit;

pub use data_objects::{NewWebhookEvent, PaymentInitiation, WebhookEvent};
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayError, PaymentGateway};
use thiserror::Error;
pub use webhook_audit::WebhookAudit;

use crate::db_types::{OrderId, ProductId};

/// The umbrella trait for storage backends.
#[allow(async_fn_in_trait)]
pub trait PaymentEngineDatabase: Clone + InventoryManagement + OrderManagement + WebhookAudit {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("A product with id {0} already exists")]
    ProductAlreadyExists(ProductId),
    #[error("An order with id {0} already exists")]
    OrderAlreadyExists(OrderId),
    #[error("The provider reference {0} is already attached to another order")]
    DuplicateProviderReference(String),
    #[error("Stored data could not be read back: {0}")]
    CorruptRecord(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::DatabaseError(e.to_string())
    }
}
