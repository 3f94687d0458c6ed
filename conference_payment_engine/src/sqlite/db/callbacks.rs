use ecpay_tools::TradeParams;
use log::trace;
use sqlx::SqliteConnection;

use crate::{db_types::CallbackLogEntry, traits::PaymentGatewayError};

pub async fn insert_callback(
    raw_body: &str,
    payload: &TradeParams,
    remote_ip: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<i64, PaymentGatewayError> {
    let payload = serde_json::to_string(payload)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO gateway_callbacks (raw_body, payload, remote_ip) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(raw_body)
    .bind(payload)
    .bind(remote_ip)
    .fetch_one(conn)
    .await?;
    trace!("🧾️ Gateway callback #{id} logged");
    Ok(id)
}

pub async fn fetch_recent_callbacks(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<CallbackLogEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM gateway_callbacks ORDER BY id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
