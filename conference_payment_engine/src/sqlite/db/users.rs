use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewUserAccount, TradeNo, UserAccount},
    traits::AccountApiError,
};

pub async fn fetch_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<UserAccount>, sqlx::Error> {
    let user = sqlx::query_as("SELECT * FROM users WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

/// Inserts the user, or refreshes the contact details of an existing user. The `paid` flag is left alone.
pub async fn upsert_user(user: NewUserAccount, conn: &mut SqliteConnection) -> Result<UserAccount, AccountApiError> {
    if user.user_id.trim().is_empty() {
        return Err(AccountApiError::InvalidUser("The user id cannot be empty".into()));
    }
    let account = sqlx::query_as(
        r#"
        INSERT INTO users (user_id, email, display_name) VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET
            email = COALESCE(excluded.email, users.email),
            display_name = COALESCE(excluded.display_name, users.display_name),
            updated_at = CURRENT_TIMESTAMP
        RETURNING *;
        "#,
    )
    .bind(user.user_id.trim())
    .bind(user.email)
    .bind(user.display_name)
    .fetch_one(conn)
    .await?;
    trace!("🧑️ User upserted: {account:?}");
    Ok(account)
}

/// Sets `paid` on the user if it is not already set. The returned flag is `true` only if this statement changed the
/// row.
pub(crate) async fn mark_user_paid(
    user_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET paid = 1, paid_at = $1, updated_at = $1 WHERE user_id = $2 AND paid = 0")
        .bind(now)
        .bind(user_id)
        .execute(conn)
        .await?;
    let flipped = result.rows_affected() > 0;
    if flipped {
        debug!("🧑️ User {user_id} is now marked as paid");
    }
    Ok(flipped)
}

/// Records that `trade_no` was issued to `user_id`. The list is append-only.
pub(crate) async fn link_order(user_id: &str, trade_no: &TradeNo, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO user_orders (user_id, trade_no) VALUES ($1, $2)")
        .bind(user_id)
        .bind(trade_no.as_str())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_trade_nos_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<TradeNo>, sqlx::Error> {
    let ids = sqlx::query_scalar("SELECT trade_no FROM user_orders WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(ids)
}

pub async fn fetch_users_with_orders(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let ids = sqlx::query_scalar("SELECT DISTINCT user_id FROM user_orders ORDER BY user_id ASC").fetch_all(conn).await?;
    Ok(ids)
}
