//! # Backend contracts
//!
//! The traits a storage backend and a gateway client need to implement to drive the payment engine.
//!
//! * [`PaymentGatewayDatabase`] holds the state-changing operations of the order lifecycle: inserting orders,
//!   conditional status transitions, the user's aggregate `paid` flag, and the notification audit log.
//! * [`AccountManagement`] provides read access to attendees and their orders, plus attendee upserts.
//! * [`PaymentOptions`] manages the priced registration tiers.
//! * [`PaymentGatewayClient`] abstracts the gateway itself: checkout form signing, checksum verification and trade
//!   status queries.
mod account_management;
mod gateway_client;
mod payment_gateway_database;
mod payment_options;

pub use account_management::{AccountApiError, AccountManagement};
pub use gateway_client::PaymentGatewayClient;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use payment_options::{PaymentOptionError, PaymentOptions};
