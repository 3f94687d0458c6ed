//! Unifies API for accessing attendees and their orders.

use std::fmt::Debug;

use log::trace;

use crate::{
    cpe_api::order_objects::PaymentSummary,
    db_types::{NewUserAccount, Order, TradeNo, UserAccount},
    traits::{AccountApiError, AccountManagement},
};

/// The `AccountApi` provides read access to attendees and their orders, and lets the registration system keep the
/// attendee list in sync.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the attendee with the given external id. If there is no such attendee, `None` is returned.
    pub async fn user(&self, user_id: &str) -> Result<Option<UserAccount>, AccountApiError> {
        self.db.fetch_user(user_id).await
    }

    /// Creates or updates an attendee. The `paid` flag of an existing attendee is never changed by this call.
    pub async fn upsert_user(&self, user: NewUserAccount) -> Result<UserAccount, AccountApiError> {
        if user.user_id.trim().is_empty() {
            return Err(AccountApiError::InvalidUser("user_id cannot be empty".into()));
        }
        trace!("👤️ Upserting attendee {}", user.user_id);
        self.db.upsert_user(user).await
    }

    pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, AccountApiError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    pub async fn order_by_trade_no(&self, trade_no: &TradeNo) -> Result<Option<Order>, AccountApiError> {
        self.db.fetch_order_by_trade_no(trade_no).await
    }

    /// The attendee, their trade numbers in issuance order, and the orders themselves. `None` if the attendee does
    /// not exist.
    pub async fn payment_summary(&self, user_id: &str) -> Result<Option<PaymentSummary>, AccountApiError> {
        let Some(user) = self.db.fetch_user(user_id).await? else {
            return Ok(None);
        };
        let order_ids = self.db.fetch_trade_nos_for_user(user_id).await?;
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(Some(PaymentSummary { user, order_ids, orders }))
    }
}
