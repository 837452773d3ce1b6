//! # Storefront payment engine public API
//!
//! * [`inventory_api`] reserves and releases product stock, one atomic conditional update per product.
//! * [`order_flow_api`] is the primary API for placing orders and moving them through payment and fulfilment.
//! * [`webhook_api`] receives provider callbacks, verifies them and feeds them into the order flow.
//!
//! Every API is created by supplying a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use storefront_payment_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/storefront.db", 25).await?;
//! let api = OrderFlowApi::new(db, gateway, EventProducers::default());
//! let order = api.fetch_order(&order_id).await?;
//! ```
pub mod errors;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod webhook_api;
