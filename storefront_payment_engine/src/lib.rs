//! Storefront Payment Engine
//!
//! The core of the storefront's payment reconciliation. It places orders against finite stock, starts payments with
//! external providers and applies their (possibly repeated, reordered or forged) callbacks to order state without
//! double-spending inventory or double-crediting a payment.
//!
//! The library is divided into:
//! 1. Storage contracts ([`mod@traits`]) and the SQLite backend that implements them. All contended state is changed
//!    through single-row conditional updates, so the engine never needs a process-wide lock.
//! 2. The public API ([`spe_api`]): the inventory ledger, the order flow state machine and the webhook dispatcher.
//! 3. Callback signature verification ([`mod@helpers`]): shared-secret HMACs and RSA signatures over canonical strings.
//!
//! An `OrderPaidEvent` is published whenever an order is paid. Subscribe to it through [`events::EventHooks`].
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod spe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    errors::{InventoryError, OrderFlowError},
    inventory_api::InventoryLedger,
    order_flow_api::OrderFlowApi,
    order_objects,
    webhook_api::{WebhookDispatcher, WebhookOutcome},
};
