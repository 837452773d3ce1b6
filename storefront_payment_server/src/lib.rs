//! # Storefront payment server
//! The HTTP surface of the storefront payment gateway. It is responsible for:
//! * Taking checkout requests and reserving stock for them.
//! * Starting payments with Paystack or PalmPay and sending the customer on to the provider's checkout page.
//! * Receiving provider callbacks, verifying them and applying them to orders.
//! * Expiring orders that were never paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `POST /orders`: place an order.
//! * `GET /orders/{id}`: fetch an order.
//! * `POST /orders/{id}/pay`, `/verify`, `/cancel`, `/approve`: order state machine operations.
//! * `POST /orders/attach`: hand a guest's order over to a registered user.
//! * `POST /payments/webhook/{provider}`: provider callbacks. Always acknowledged with a 200.
//! * `GET /health`: A health check route that returns a 200 OK response.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
