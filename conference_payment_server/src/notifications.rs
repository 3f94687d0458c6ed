//! Payment confirmations.
//!
//! The payment engine publishes a [`PaymentConfirmedEvent`] exactly once per attendee: when the conditional update of
//! their `paid` flag actually changes the row. This module subscribes to that event and tells the attendee.
//!
//! Mail is handed to an HTTP relay (`CPG_MAIL_RELAY_URL`) as a JSON document. If no relay is configured, or the
//! attendee has no email address on file, the confirmation is written to the log instead.
use conference_payment_engine::events::{EventHandlers, EventHooks, OrderFailedEvent, PaymentConfirmedEvent};
use futures::future::BoxFuture;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MailConfig;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 128;

#[derive(Debug, Clone, Error)]
pub enum MailerError {
    #[error("Could not reach the mail relay. {0}")]
    RelayUnreachable(String),
    #[error("The mail relay refused the message. Status {status}. {message}")]
    RelayRejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmationMailer {
    client: reqwest::Client,
    relay_url: Option<String>,
    from: String,
}

impl ConfirmationMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self { client: reqwest::Client::new(), relay_url: config.relay_url.clone(), from: config.from.clone() }
    }

    /// Builds the confirmation for a payment. Returns `None` if the attendee has no email address on file.
    pub fn compose(&self, event: &PaymentConfirmedEvent) -> Option<ConfirmationEmail> {
        let PaymentConfirmedEvent { user, order } = event;
        let to = user.email.as_ref().filter(|e| !e.trim().is_empty())?.clone();
        let name = user.display_name.as_deref().unwrap_or(user.user_id.as_str());
        let body = format!(
            "Dear {name},\n\nWe have received your registration fee of {} ({}). Your order reference is {}.\n\nSee you \
             at the conference!\n",
            order.amount, order.option_id, order.trade_no
        );
        Some(ConfirmationEmail {
            from: self.from.clone(),
            to,
            subject: "Your registration fee has been received".to_string(),
            body,
        })
    }

    pub async fn send(&self, email: &ConfirmationEmail) -> Result<(), MailerError> {
        let Some(url) = &self.relay_url else {
            info!("📬️ No mail relay configured. Confirmation for {}:\n{}", email.to, email.body);
            return Ok(());
        };
        let res = self
            .client
            .post(url)
            .json(email)
            .send()
            .await
            .map_err(|e| MailerError::RelayUnreachable(e.to_string()))?;
        let status = res.status();
        if status.is_success() {
            debug!("📬️ Confirmation mail for {} handed to the relay", email.to);
            Ok(())
        } else {
            let message = res.text().await.unwrap_or_default();
            Err(MailerError::RelayRejected { status: status.as_u16(), message })
        }
    }
}

/// Hooks the confirmation mailer (and a log line for failed payments) into the payment engine's events.
pub fn create_notification_event_handlers(mailer: ConfirmationMailer) -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On PaymentConfirmed Handler ---
    hooks.on_payment_confirmed(move |ev| {
        let trade_no = ev.order.trade_no.clone();
        let user_id = ev.user.user_id.clone();
        let Some(email) = mailer.compose(&ev) else {
            warn!("📬️ {user_id} has paid (order {trade_no}), but has no email address on file. No confirmation sent.");
            return no_op();
        };
        let mailer = mailer.clone();
        Box::pin(async move {
            match mailer.send(&email).await {
                Ok(()) => info!("📬️ Payment confirmation for order {trade_no} sent to {user_id}"),
                Err(e) => error!("📬️ Could not send the payment confirmation for order {trade_no} to {user_id}. {e}"),
            }
        })
    });
    // --- On OrderFailed Handler ---
    hooks.on_order_failed(move |ev| {
        let OrderFailedEvent { order } = ev;
        info!("📬️ Payment for order {} ({}) failed at the gateway", order.trade_no, order.user_id);
        no_op()
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
