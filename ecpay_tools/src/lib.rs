//! # ECPay tools
//!
//! Client-side helpers for the ECPay all-in-one payment gateway:
//! * [`checksum`]: the `CheckMacValue` digest that protects every message to and from the gateway.
//! * [`EcPayApi`]: builds signed checkout forms and queries trade status over HTTP.
//! * [`EcPayConfig`]: merchant credentials and endpoints, read from the environment.
mod api;
pub mod checksum;
mod config;
mod data_objects;
mod error;

pub use api::{CheckoutRequest, EcPayApi};
pub use checksum::{CheckMacCalculator, ChecksumError, CHECK_MAC_VALUE};
pub use config::{parse_utc_offset, EcPayConfig, GatewayEnvironment};
pub use data_objects::{TradeInfo, TradeParams, TradeStatus, RTN_CODE_SUCCESS, TRADE_STATUS_FAILED};
pub use error::EcPayApiError;
