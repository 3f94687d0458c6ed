use chrono::{DateTime, Utc};
use ecpay_tools::TradeParams;
use thiserror::Error;

use crate::{
    db_types::{CallbackLogEntry, NewOrder, Order, OrderStatusType, TradeNo},
    traits::{AccountApiError, AccountManagement, PaymentOptionError, PaymentOptions},
};

/// This trait defines the state-changing behaviour that backends supporting the payment engine must provide.
///
/// None of these methods holds a lock across calls, and none of them spans the order and the user in a single
/// transaction. Every decision is made by a conditional update whose outcome is reported back to the caller.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + AccountManagement + PaymentOptions {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order with status `Created` and appends its trade number to the owner's order list, atomically.
    ///
    /// Fails with [`PaymentGatewayError::OrderAlreadyExists`] if the trade number is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// Orders for the user that are still `Created`.
    async fn fetch_created_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Every user that has been issued at least one order.
    async fn fetch_users_with_orders(&self) -> Result<Vec<String>, PaymentGatewayError>;

    /// Moves the order to `status` and stores the gateway payload that justified the move.
    ///
    /// The update only applies while the order is `Created`, or already has the target status (in which case only
    /// the stored gateway response and timestamp are refreshed). Returns the updated order, or `None` if the order
    /// is in a different terminal state and was left untouched.
    async fn update_order_status(
        &self,
        trade_no: &TradeNo,
        status: OrderStatusType,
        gateway_response: &TradeParams,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Sets the user's `paid` flag if it is not yet set. Returns `true` only if this call flipped it, i.e. exactly
    /// one caller ever sees `true` for a given user.
    async fn mark_user_paid(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, PaymentGatewayError>;

    /// Appends a payment notification to the audit log and returns its id. `raw_body` is stored exactly as it was
    /// received, next to the parameters parsed from it.
    async fn record_gateway_callback(
        &self,
        raw_body: &str,
        payload: &TradeParams,
        remote_ip: Option<&str>,
    ) -> Result<i64, PaymentGatewayError>;

    /// The most recent entries of the audit log, newest first.
    async fn fetch_gateway_callbacks(&self, limit: i64) -> Result<Vec<CallbackLogEntry>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with trade number {0}")]
    OrderAlreadyExists(TradeNo),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(TradeNo),
    #[error("The user {0} does not exist")]
    UserNotFound(String),
    #[error("Could not store gateway data: {0}")]
    SerializationError(String),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
    #[error("{0}")]
    PaymentOptionError(#[from] PaymentOptionError),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PaymentGatewayError {
    fn from(e: serde_json::Error) -> Self {
        PaymentGatewayError::SerializationError(e.to_string())
    }
}
