use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::PaymentOption, traits::PaymentOptionError};

pub async fn fetch_payment_option(
    option_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentOption>, sqlx::Error> {
    let option = sqlx::query_as("SELECT option_id, name, price, valid_from, valid_until FROM payment_options WHERE option_id = $1")
        .bind(option_id)
        .fetch_optional(conn)
        .await?;
    Ok(option)
}

pub async fn fetch_payment_options(conn: &mut SqliteConnection) -> Result<Vec<PaymentOption>, sqlx::Error> {
    let options = sqlx::query_as(
        "SELECT option_id, name, price, valid_from, valid_until FROM payment_options ORDER BY valid_from ASC, option_id \
         ASC",
    )
    .fetch_all(conn)
    .await?;
    Ok(options)
}

pub async fn upsert_payment_option(
    option: PaymentOption,
    conn: &mut SqliteConnection,
) -> Result<PaymentOption, PaymentOptionError> {
    let option = sqlx::query_as(
        r#"
        INSERT INTO payment_options (option_id, name, price, valid_from, valid_until) VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (option_id) DO UPDATE SET
            name = excluded.name,
            price = excluded.price,
            valid_from = excluded.valid_from,
            valid_until = excluded.valid_until,
            updated_at = CURRENT_TIMESTAMP
        RETURNING option_id, name, price, valid_from, valid_until;
        "#,
    )
    .bind(option.option_id)
    .bind(option.name)
    .bind(option.price)
    .bind(option.valid_from)
    .bind(option.valid_until)
    .fetch_one(conn)
    .await?;
    debug!("🎟️ Payment option saved: {option:?}");
    Ok(option)
}
