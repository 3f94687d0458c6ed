use thiserror::Error;

use crate::db_types::PaymentOption;

#[derive(Debug, Clone, Error)]
pub enum PaymentOptionError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid payment option: {0}")]
    InvalidOption(String),
}

impl From<sqlx::Error> for PaymentOptionError {
    fn from(e: sqlx::Error) -> Self {
        PaymentOptionError::DatabaseError(e.to_string())
    }
}

#[allow(async_fn_in_trait)]
pub trait PaymentOptions {
    async fn fetch_payment_option(&self, option_id: &str) -> Result<Option<PaymentOption>, PaymentOptionError>;

    /// All options, ordered by the start of their validity window.
    async fn fetch_payment_options(&self) -> Result<Vec<PaymentOption>, PaymentOptionError>;

    async fn upsert_payment_option(&self, option: PaymentOption) -> Result<PaymentOption, PaymentOptionError>;
}
