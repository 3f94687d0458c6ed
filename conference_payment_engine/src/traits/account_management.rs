use thiserror::Error;

use crate::db_types::{NewUserAccount, Order, TradeNo, UserAccount};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid user record: {0}")]
    InvalidUser(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}

/// Read access to attendees and their orders.
///
/// Attendees are registered by the conference system of record and synchronised here with
/// [`AccountManagement::upsert_user`]. Upserting never touches the `paid` flag.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserAccount>, AccountApiError>;

    /// Creates the attendee, or updates their contact details if they already exist.
    async fn upsert_user(&self, user: NewUserAccount) -> Result<UserAccount, AccountApiError>;

    /// All orders ever issued to the user, oldest first.
    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, AccountApiError>;

    async fn fetch_order_by_trade_no(&self, trade_no: &TradeNo) -> Result<Option<Order>, AccountApiError>;

    /// The trade numbers linked to the user, in issuance order.
    async fn fetch_trade_nos_for_user(&self, user_id: &str) -> Result<Vec<TradeNo>, AccountApiError>;
}
