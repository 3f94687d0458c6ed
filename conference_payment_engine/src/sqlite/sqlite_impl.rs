//! `SqliteDatabase` is a concrete implementation of a conference payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use ecpay_tools::TradeParams;
use log::*;
use sqlx::SqlitePool;

use super::db::{callbacks, db_url, new_pool, orders, payment_options, users};
use crate::{
    db_types::{
        CallbackLogEntry,
        NewOrder,
        NewUserAccount,
        Order,
        OrderStatusType,
        PaymentOption,
        TradeNo,
        UserAccount,
    },
    traits::{
        AccountApiError,
        AccountManagement,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        PaymentOptionError,
        PaymentOptions,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        if users::fetch_user(&order.user_id, &mut tx).await?.is_none() {
            return Err(PaymentGatewayError::UserNotFound(order.user_id));
        }
        let user_id = order.user_id.clone();
        let order = orders::insert_order(order, &mut tx).await?;
        users::link_order(&user_id, &order.trade_no, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] for {} has been saved for user {user_id}", order.trade_no, order.amount);
        Ok(order)
    }

    async fn fetch_created_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user_with_status(user_id, OrderStatusType::Created, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_users_with_orders(&self) -> Result<Vec<String>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let users = users::fetch_users_with_orders(&mut conn).await?;
        Ok(users)
    }

    async fn update_order_status(
        &self,
        trade_no: &TradeNo,
        status: OrderStatusType,
        gateway_response: &TradeParams,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(trade_no, status, gateway_response, now, &mut conn).await
    }

    async fn mark_user_paid(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let flipped = users::mark_user_paid(user_id, now, &mut conn).await?;
        Ok(flipped)
    }

    async fn record_gateway_callback(
        &self,
        raw_body: &str,
        payload: &TradeParams,
        remote_ip: Option<&str>,
    ) -> Result<i64, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        callbacks::insert_callback(raw_body, payload, remote_ip, &mut conn).await
    }

    async fn fetch_gateway_callbacks(&self, limit: i64) -> Result<Vec<CallbackLogEntry>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let entries = callbacks::fetch_recent_callbacks(limit, &mut conn).await?;
        Ok(entries)
    }

    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<UserAccount>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn upsert_user(&self, user: NewUserAccount) -> Result<UserAccount, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_user(user, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_order_by_trade_no(&self, trade_no: &TradeNo) -> Result<Option<Order>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_trade_no(trade_no, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_trade_nos_for_user(&self, user_id: &str) -> Result<Vec<TradeNo>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let ids = users::fetch_trade_nos_for_user(user_id, &mut conn).await?;
        Ok(ids)
    }
}

impl PaymentOptions for SqliteDatabase {
    async fn fetch_payment_option(&self, option_id: &str) -> Result<Option<PaymentOption>, PaymentOptionError> {
        let mut conn = self.pool.acquire().await?;
        let option = payment_options::fetch_payment_option(option_id, &mut conn).await?;
        Ok(option)
    }

    async fn fetch_payment_options(&self) -> Result<Vec<PaymentOption>, PaymentOptionError> {
        let mut conn = self.pool.acquire().await?;
        let options = payment_options::fetch_payment_options(&mut conn).await?;
        Ok(options)
    }

    async fn upsert_payment_option(&self, option: PaymentOption) -> Result<PaymentOption, PaymentOptionError> {
        let mut conn = self.pool.acquire().await?;
        payment_options::upsert_payment_option(option, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
