use chrono::{DateTime, Utc};
use ecpay_tools::TradeParams;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, TradeNo},
    traits::PaymentGatewayError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
///
/// New orders always start out as `Created`.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    if fetch_order_by_trade_no(&order.trade_no, conn).await?.is_some() {
        return Err(PaymentGatewayError::OrderAlreadyExists(order.trade_no));
    }
    let request_params = serde_json::to_string(&order.request_params)?;
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                trade_no,
                user_id,
                option_id,
                amount,
                status,
                request_params,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(order.trade_no)
    .bind(order.user_id)
    .bind(order.option_id)
    .bind(order.amount)
    .bind(OrderStatusType::Created)
    .bind(request_params)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", order.trade_no, order.id);
    Ok(order)
}

pub async fn fetch_order_by_trade_no(
    trade_no: &TradeNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE trade_no = $1").bind(trade_no.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_user_with_status(
    user_id: &str,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 AND status = $2 ORDER BY created_at ASC, id ASC")
            .bind(user_id)
            .bind(status)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

/// Conditionally moves an order to `status`. Only orders that are `Created`, or already at `status`, are touched.
pub(crate) async fn update_order_status(
    trade_no: &TradeNo,
    status: OrderStatusType,
    gateway_response: &TradeParams,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let response = serde_json::to_string(gateway_response)?;
    trace!("📝️ Moving order [{trade_no}] to {status}");
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = $1, gateway_response = $2, updated_at = $3
            WHERE trade_no = $4 AND status IN ($5, $1)
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(response)
    .bind(now)
    .bind(trade_no.as_str())
    .bind(OrderStatusType::Created)
    .fetch_optional(conn)
    .await?;
    match &order {
        Some(o) => debug!("📝️ Order [{trade_no}] is now {}", o.status),
        None => debug!("📝️ Order [{trade_no}] was not moved to {status}. It is missing or already final."),
    }
    Ok(order)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions};

    use super::*;
    use crate::sqlite::db::{payment_options, users};

    async fn conn() -> SqliteConnection {
        let mut conn = "sqlite::memory:".parse::<SqliteConnectOptions>().unwrap().connect().await.unwrap();
        sqlx::migrate!("./src/sqlite/migrations").run(&mut conn).await.unwrap();
        conn
    }

    async fn seed(conn: &mut SqliteConnection) {
        users::upsert_user(crate::db_types::NewUserAccount::new("alice"), conn).await.unwrap();
        let option = crate::db_types::PaymentOption {
            option_id: "early".into(),
            name: "Early bird".into(),
            price: 900,
            valid_from: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            valid_until: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        };
        payment_options::upsert_payment_option(option, conn).await.unwrap();
    }

    fn new_order(trade_no: &str) -> NewOrder {
        let params = TradeParams::new().with("MerchantTradeNo", trade_no).with("TotalAmount", 900);
        NewOrder::new(TradeNo(trade_no.into()), "alice".into(), "early".into(), 900).with_request_params(params)
    }

    #[tokio::test]
    async fn insert_and_fetch() {
        let mut conn = conn().await;
        seed(&mut conn).await;
        let order = insert_order(new_order("aaaa0000bbbb1111cccc"), &mut conn).await.unwrap();
        assert_eq!(order.status, OrderStatusType::Created);
        assert_eq!(order.request_params.get("TotalAmount"), Some("900"));
        assert!(order.gateway_response.is_none());
        let fetched = fetch_order_by_trade_no(&order.trade_no, &mut conn).await.unwrap().unwrap();
        assert_eq!(fetched, order);
        let err = insert_order(new_order("aaaa0000bbbb1111cccc"), &mut conn).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::OrderAlreadyExists(_)));
    }

    #[tokio::test]
    async fn terminal_states_are_sticky() {
        let mut conn = conn().await;
        seed(&mut conn).await;
        let order = insert_order(new_order("aaaa0000bbbb1111cccc"), &mut conn).await.unwrap();
        let response = TradeParams::new().with("TradeStatus", 1);
        let now = Utc::now();
        let paid = update_order_status(&order.trade_no, OrderStatusType::Paid, &response, now, &mut conn)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, OrderStatusType::Paid);
        assert_eq!(paid.gateway_response, Some(response.clone()));
        // Same status again is allowed and refreshes the payload
        let again = TradeParams::new().with("TradeStatus", 1).with("PaymentDate", "2025/03/01 10:00:00");
        let paid = update_order_status(&order.trade_no, OrderStatusType::Paid, &again, now, &mut conn)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.gateway_response, Some(again));
        // But a paid order never fails
        let failed = TradeParams::new().with("TradeStatus", "10200095");
        let res = update_order_status(&order.trade_no, OrderStatusType::Failed, &failed, now, &mut conn).await.unwrap();
        assert!(res.is_none());
        let order = fetch_order_by_trade_no(&order.trade_no, &mut conn).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Paid);
    }
}
