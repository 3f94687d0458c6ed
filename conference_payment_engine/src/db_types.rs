use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use ecpay_tools::TradeParams;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The lifecycle of an order. `Created` can move to `Paid` or `Failed`. Both of those are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been issued and the attendee has (probably) been sent to the gateway. No result yet.
    Created,
    /// The gateway has confirmed payment.
    Paid,
    /// The gateway has reported that the payment failed.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "created"),
            OrderStatusType::Paid => write!(f, "paid"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "paid" => Ok(Self::Paid),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Created");
            OrderStatusType::Created
        })
    }
}

//--------------------------------------        TradeNo        ---------------------------------------------------------
/// The merchant trade number (`MerchantTradeNo`). This is the order's identity on both sides of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TradeNo(pub String);

impl FromStr for TradeNo {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > 20 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConversionError(format!("'{s}' is not a valid trade number")));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for TradeNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TradeNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TradeNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub trade_no: TradeNo,
    pub user_id: String,
    pub option_id: String,
    pub amount: i64,
    pub status: OrderStatusType,
    /// The exact parameter set that was signed and handed to the browser at issuance, `CheckMacValue` included.
    pub request_params: TradeParams,
    /// The most recent status payload from the gateway, from either a notification or a query.
    pub gateway_response: Option<TradeParams>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for Order {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let request_params = json_column::<TradeParams>(row, "request_params")?;
        let gateway_response = row
            .try_get::<Option<String>, _>("gateway_response")?
            .map(|s| parse_json_column(&s, "gateway_response"))
            .transpose()?;
        Ok(Self {
            id: row.try_get("id")?,
            trade_no: row.try_get("trade_no")?,
            user_id: row.try_get("user_id")?,
            option_id: row.try_get("option_id")?,
            amount: row.try_get("amount")?,
            status: row.try_get("status")?,
            request_params,
            gateway_response,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let s: String = row.try_get(column)?;
    parse_json_column(&s, column)
}

fn parse_json_column<T: serde::de::DeserializeOwned>(s: &str, column: &str) -> Result<T, sqlx::Error> {
    serde_json::from_str(s)
        .map_err(|e| sqlx::Error::ColumnDecode { index: column.to_string(), source: Box::new(e) })
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub trade_no: TradeNo,
    pub user_id: String,
    pub option_id: String,
    pub amount: i64,
    pub request_params: TradeParams,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(trade_no: TradeNo, user_id: String, option_id: String, amount: i64) -> Self {
        Self {
            trade_no,
            user_id,
            option_id,
            amount,
            request_params: TradeParams::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_request_params(mut self, params: TradeParams) -> Self {
        self.request_params = params;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------     PaymentOption     ---------------------------------------------------------
/// A priced registration tier (early bird, regular, student, ...) that can only be bought inside its validity window.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentOption {
    pub option_id: String,
    /// Shown to the attendee on the gateway page as the `ItemName`.
    pub name: String,
    pub price: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl PaymentOption {
    /// Both ends of the window are inclusive.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }
}

//--------------------------------------      UserAccount      ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Set the first time any of the user's orders is observed as paid. Never reset.
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserAccount {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl NewUserAccount {
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self { user_id: user_id.into(), email: None, display_name: None }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

//--------------------------------------   CallbackLogEntry    ---------------------------------------------------------
/// A payment notification as it was received, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackLogEntry {
    pub id: i64,
    /// The request body, verbatim. Invalid UTF-8 sequences are replaced with U+FFFD.
    pub raw_body: String,
    /// The parameters parsed from `raw_body`. Repeated keys keep their last value.
    pub payload: TradeParams,
    pub remote_ip: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl FromRow<'_, SqliteRow> for CallbackLogEntry {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            raw_body: row.try_get("raw_body")?,
            payload: json_column(row, "payload")?,
            remote_ip: row.try_get("remote_ip")?,
            received_at: row.try_get("received_at")?,
        })
    }
}

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

pub type Roles = Vec<Role>;
