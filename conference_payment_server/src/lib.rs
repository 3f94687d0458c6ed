//! # Conference payment server
//! This crate hosts the HTTP server for the conference payment gateway. It is responsible for:
//! * Issuing orders and handing attendees a signed checkout form for the ECPay gateway.
//! * Receiving payment notifications from the gateway and updating order status.
//! * Letting administrators query the gateway for the status of an order, and sweep outstanding orders.
//! * Sending a confirmation to attendees when their registration fee has been paid.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/gateway/callback`: The payment notification route called by the gateway. Responds with `1|OK`.
//! * `/api/...`: Attendee and administrator routes. These require a JWT access token in the `tpg_access_token`
//!   header. See [routes](routes/index.html).

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod notifications;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
