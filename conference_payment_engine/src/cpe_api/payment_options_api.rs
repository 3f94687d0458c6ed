use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::PaymentOption,
    traits::{PaymentOptionError, PaymentOptions},
};

/// Manages the priced registration tiers attendees can choose from.
pub struct PaymentOptionsApi<B> {
    db: B,
}

impl<B: Debug> Debug for PaymentOptionsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentOptionsApi ({:?})", self.db)
    }
}

impl<B> PaymentOptionsApi<B>
where B: PaymentOptions
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn options(&self) -> Result<Vec<PaymentOption>, PaymentOptionError> {
        self.db.fetch_payment_options().await
    }

    /// The options that can be bought at `now`.
    pub async fn active_options(&self, now: DateTime<Utc>) -> Result<Vec<PaymentOption>, PaymentOptionError> {
        let options = self.db.fetch_payment_options().await?;
        Ok(options.into_iter().filter(|o| o.is_active_at(now)).collect())
    }

    pub async fn option(&self, option_id: &str) -> Result<Option<PaymentOption>, PaymentOptionError> {
        self.db.fetch_payment_option(option_id).await
    }

    /// Creates or replaces a payment option. The price must be positive and the window must not be inverted.
    ///
    /// Orders already issued against the option keep the price they were issued with.
    pub async fn upsert_option(&self, option: PaymentOption) -> Result<PaymentOption, PaymentOptionError> {
        if option.option_id.trim().is_empty() {
            return Err(PaymentOptionError::InvalidOption("option_id cannot be empty".into()));
        }
        if option.price <= 0 {
            return Err(PaymentOptionError::InvalidOption(format!("price must be positive, got {}", option.price)));
        }
        if option.valid_from > option.valid_until {
            return Err(PaymentOptionError::InvalidOption(format!(
                "valid_from ({}) is after valid_until ({})",
                option.valid_from, option.valid_until
            )));
        }
        debug!("🏷️ Saving payment option {} at {}", option.option_id, option.price);
        self.db.upsert_payment_option(option).await
    }
}
