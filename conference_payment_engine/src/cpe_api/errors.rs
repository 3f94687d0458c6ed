use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::TradeNo,
    traits::{AccountApiError, PaymentGatewayError, PaymentOptionError},
};

/// Reasons an order cannot be issued. Everything except `GatewayUnavailable` and `DatabaseError` is a business-rule rejection that can be
/// shown to the attendee as is.
#[derive(Debug, Clone, Error)]
pub enum IssuanceError {
    #[error("The payment option {0} does not exist")]
    OptionNotFound(String),
    #[error("This payment option is not available until {0}")]
    OptionNotYetActive(DateTime<Utc>),
    #[error("This payment option expired at {0}")]
    OptionExpired(DateTime<Utc>),
    #[error("The user {0} is not registered")]
    UserNotFound(String),
    #[error("The registration fee has already been paid")]
    AlreadyPaid,
    #[error("Outstanding orders could not be checked with the payment gateway. {0}")]
    GatewayUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PaymentGatewayError> for IssuanceError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::UserNotFound(u) => Self::UserNotFound(u),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for IssuanceError {
    fn from(e: AccountApiError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<PaymentOptionError> for IssuanceError {
    fn from(e: PaymentOptionError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

impl From<ReconciliationError> for IssuanceError {
    fn from(e: ReconciliationError) -> Self {
        match e {
            ReconciliationError::UserNotFound(u) => Self::UserNotFound(u),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("The order {0} does not exist")]
    OrderNotFound(TradeNo),
    #[error("The user {0} does not exist")]
    UserNotFound(String),
    #[error("The payment gateway could not be queried. {0}")]
    UpstreamError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PaymentGatewayError> for ReconciliationError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(t) => Self::OrderNotFound(t),
            PaymentGatewayError::UserNotFound(u) => Self::UserNotFound(u),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for ReconciliationError {
    fn from(e: AccountApiError) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

/// Why a payment notification was refused. All of these are raised before any state is changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackRejection {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("CheckMacValue verification failed")]
    ChecksumMismatch,
    #[error("Unknown trade number: {0}")]
    UnknownOrder(String),
}
