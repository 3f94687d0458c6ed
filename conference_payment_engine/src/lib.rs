//! Conference Payment Engine
//!
//! The conference payment engine takes registration fees for a conference through the ECPay payment gateway. It
//! issues orders against priced payment options, hands the browser a signed checkout form, and keeps each order's
//! status in step with the gateway. It also maintains every attendee's aggregate "has paid" flag.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@traits`] and the SQLite backend). The traits describe what a backend must provide. You should
//!    not need to access the database directly; use the public API instead. The exception is the data types used in
//!    the database, which are defined in the `db_types` module and are public.
//! 2. The payment engine public API ([`OrderFlowApi`], [`AccountApi`] and [`PaymentOptionsApi`]). This is where
//!    issuance and reconciliation happen.
//!
//! The engine also publishes events that can be subscribed to, most importantly [`events::PaymentConfirmedEvent`],
//! which fires exactly once per attendee when their payment is first confirmed.
#[cfg(feature = "sqlite")]
mod sqlite;

mod cpe_api;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use cpe_api::{
    accounts_api::AccountApi,
    errors::{CallbackRejection, IssuanceError, ReconciliationError},
    order_flow_api::{OrderFlowApi, REQUIRED_CALLBACK_FIELDS},
    order_objects,
    payment_options_api::PaymentOptionsApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db, SqliteDatabase};
