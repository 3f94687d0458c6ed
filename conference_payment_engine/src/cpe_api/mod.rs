//! # Conference payment engine public API
//!
//! The `cpe_api` module exposes the programmatic API for the payment engine. Each API wraps a backend that implements
//! the traits it needs, so that callers only pull in what they use.
//!
//! * [`order_flow_api`] issues orders and reconciles their status with the gateway, both from payment notifications
//!   (push) and by querying the gateway (pull).
//! * [`accounts_api`] gives read access to attendees and their orders, and lets the registration system sync
//!   attendees.
//! * [`payment_options_api`] manages the priced registration tiers.
//!
//! # API usage
//!
//! ```rust,ignore
//! use conference_payment_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements AccountManagement
//! let api = AccountApi::new(db);
//! let orders = api.orders_for_user("attendee-42").await?;
//! ```
pub mod accounts_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_options_api;
