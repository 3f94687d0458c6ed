use std::fmt::Debug;

use chrono::{DateTime, Utc};
use ecpay_tools::{CheckoutRequest, TradeInfo, TradeParams, TradeStatus, CHECK_MAC_VALUE, RTN_CODE_SUCCESS};
use log::*;

use crate::{
    cpe_api::{
        errors::{CallbackRejection, IssuanceError, ReconciliationError},
        order_objects::{CallbackAck, OrderDraft, OrderStatusView, StatusTransition, SweepFailure, SweepResult},
    },
    db_types::{NewOrder, Order, OrderStatusType, TradeNo, UserAccount},
    events::{EventProducers, OrderFailedEvent, PaymentConfirmedEvent},
    helpers::new_trade_no,
    traits::{PaymentGatewayClient, PaymentGatewayDatabase, PaymentGatewayError},
};

/// The fields a payment notification must carry before it is even considered.
pub const REQUIRED_CALLBACK_FIELDS: [&str; 4] = ["MerchantID", "MerchantTradeNo", "RtnCode", CHECK_MAC_VALUE];

/// `OrderFlowApi` drives the order lifecycle: issuing orders, and reconciling their status with the gateway.
///
/// Status reaches the engine in two ways:
/// * **push**: the gateway posts a signed notification to the server ([`Self::process_callback`]).
/// * **pull**: the engine asks the gateway for the current state of a trade ([`Self::query_status`]), either on
///   demand or as part of a sweep ([`Self::reconcile_user`], [`Self::reconcile_all`]).
///
/// The API holds no state of its own. Every decision re-reads the store, and every status change is a conditional
/// update, so any number of instances can run side by side.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: PaymentGatewayDatabase,
    G: PaymentGatewayClient,
{
    /// Issues a new order for `user_id` against the payment option `option_id`.
    ///
    /// The checks run in this order, and the first one that fails is returned:
    /// 1. The option must exist.
    /// 2. `now` must not be before the start of the option's validity window.
    /// 3. `now` must not be after the end of the window. Both ends are inclusive.
    /// 4. The user must exist. Their outstanding orders are reconciled with the gateway first, so that a payment
    ///    whose notification went missing is picked up before we decide anything.
    /// 5. The user must not have paid already.
    /// 6. Every outstanding order must have been reconciled. If the gateway could not be asked about one of them,
    ///    the attendee may have paid already, so no new order is issued.
    ///
    /// On success the order is stored as `Created` and the signed checkout form is returned. The gateway is not
    /// contacted during issuance apart from the reconciliation in step 4.
    pub async fn issue_order(
        &self,
        user_id: &str,
        option_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderDraft, IssuanceError> {
        let option = self
            .db
            .fetch_payment_option(option_id)
            .await?
            .ok_or_else(|| IssuanceError::OptionNotFound(option_id.to_string()))?;
        if now < option.valid_from {
            debug!("🧾️ Option {option_id} is not active until {}", option.valid_from);
            return Err(IssuanceError::OptionNotYetActive(option.valid_from));
        }
        if now > option.valid_until {
            debug!("🧾️ Option {option_id} expired at {}", option.valid_until);
            return Err(IssuanceError::OptionExpired(option.valid_until));
        }
        let sweep = self.reconcile_user(user_id).await?;
        let user = self.db.fetch_user(user_id).await?.ok_or_else(|| IssuanceError::UserNotFound(user_id.to_string()))?;
        if user.paid {
            info!("🧾️ {user_id} has already paid. No new order will be issued.");
            return Err(IssuanceError::AlreadyPaid);
        }
        if !sweep.failures.is_empty() {
            let reasons = sweep.failures.iter().map(|f| format!("{}: {}", f.subject, f.reason)).collect::<Vec<_>>();
            warn!(
                "🧾️ {} outstanding orders for {user_id} could not be reconciled. No new order will be issued. {}",
                reasons.len(),
                reasons.join("; ")
            );
            return Err(IssuanceError::GatewayUnavailable(reasons.join("; ")));
        }
        let trade_no = new_trade_no();
        let request = CheckoutRequest {
            trade_no: trade_no.to_string(),
            trade_date: now,
            amount: option.price,
            item_name: option.name.clone(),
        };
        let params = self.gateway.checkout_params(&request);
        let new_order = NewOrder::new(trade_no, user_id.to_string(), option.option_id.clone(), option.price)
            .with_request_params(params.clone())
            .with_created_at(now);
        let order = self.db.insert_order(new_order).await?;
        info!("🧾️ Order {} issued to {user_id} for {} ({})", order.trade_no, option.option_id, option.price);
        Ok(OrderDraft { order, action: self.gateway.checkout_url().to_string(), params })
    }

    /// Asks the gateway for the current state of an order and applies it.
    ///
    /// Returns every field the gateway reported, plus the order's status and the owner's `paid` flag as they stand
    /// after the update. Gateway failures are returned as [`ReconciliationError::UpstreamError`] and leave the order
    /// untouched. There is no automatic retry.
    pub async fn query_status(&self, trade_no: &TradeNo) -> Result<OrderStatusView, ReconciliationError> {
        let order = self
            .db
            .fetch_order_by_trade_no(trade_no)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(trade_no.clone()))?;
        let (info, transition) = self.reconcile_order(&order).await?;
        let payment_status = match transition {
            Some(t) => t.to,
            None => self.db.fetch_order_by_trade_no(trade_no).await?.map(|o| o.status).unwrap_or(order.status),
        };
        let is_paid = self.db.fetch_user(&order.user_id).await?.map(|u| u.paid).unwrap_or_default();
        Ok(OrderStatusView { gateway: info.fields, payment_status, is_paid })
    }

    /// Handles a payment notification pushed by the gateway.
    ///
    /// `raw_body` is the form-encoded request body. It is written to the audit log, verbatim, before anything else.
    /// It is then validated: the required fields must be present, the `CheckMacValue` must match, and the trade
    /// number must belong to a known order. A validation failure is returned as a [`CallbackRejection`] and nothing
    /// has been changed.
    ///
    /// Once validation passes the notification is committed: the result is always a [`CallbackAck`], and any
    /// internal error from this point on is logged and carried in [`CallbackAck::error`] instead, because the
    /// gateway must be acknowledged regardless.
    pub async fn process_callback(
        &self,
        raw_body: &str,
        remote_ip: Option<&str>,
    ) -> Result<CallbackAck, CallbackRejection> {
        let payload = TradeParams::from_urlencoded(raw_body);
        match self.db.record_gateway_callback(raw_body, &payload, remote_ip).await {
            Ok(id) => trace!("📥️ Payment notification stored in audit log as #{id}"),
            Err(e) => error!("📥️ Could not write payment notification to the audit log. {e}. Body: {raw_body}"),
        }
        for field in REQUIRED_CALLBACK_FIELDS {
            if payload.get(field).map(|v| v.trim().is_empty()).unwrap_or(true) {
                info!("📥️ Payment notification rejected. Missing {field}");
                return Err(CallbackRejection::MissingField(field));
            }
        }
        let presented = payload.get(CHECK_MAC_VALUE).unwrap_or_default();
        if !self.gateway.verify_checksum(&payload, presented) {
            warn!(
                "📥️ Payment notification failed CheckMacValue verification. This could be a forgery attempt. \
                 Source: {}. Payload: {payload}",
                remote_ip.unwrap_or("unknown")
            );
            return Err(CallbackRejection::ChecksumMismatch);
        }
        let trade_no = TradeNo::from(payload.get("MerchantTradeNo").unwrap_or_default().to_string());
        let order = match self.db.fetch_order_by_trade_no(&trade_no).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!("📥️ Payment notification for unknown order {trade_no}");
                return Err(CallbackRejection::UnknownOrder(trade_no.to_string()));
            },
            Err(e) => {
                error!("📥️ Could not look up order {trade_no} for a valid payment notification. {e}");
                return Ok(CallbackAck { trade_no, transition: None, error: Some(e.to_string()) });
            },
        };
        // Committed. From here on the gateway gets an acknowledgement no matter what.
        let rtn_code = payload.get("RtnCode").unwrap_or_default();
        if rtn_code != RTN_CODE_SUCCESS {
            info!(
                "📥️ Notification for {trade_no} reports RtnCode {rtn_code} ({}). Order left as {}",
                payload.get("RtnMsg").unwrap_or_default(),
                order.status
            );
            return Ok(CallbackAck { trade_no, transition: None, error: None });
        }
        match self.apply_status(&order, OrderStatusType::Paid, &payload).await {
            Ok(transition) => Ok(CallbackAck { trade_no, transition, error: None }),
            Err(e) => {
                error!("📥️ Could not mark order {trade_no} as paid after a valid notification. {e}");
                Ok(CallbackAck { trade_no, transition: None, error: Some(e.to_string()) })
            },
        }
    }

    /// Reconciles every `Created` order belonging to `user_id` with the gateway.
    ///
    /// Orders that cannot be reconciled are recorded in [`SweepResult::failures`] and skipped. Only an unknown user
    /// or a store failure aborts the sweep.
    ///
    /// If the user is not flagged as paid but already owns a paid order (e.g. the process died between the two
    /// updates), the flag is set here.
    pub async fn reconcile_user(&self, user_id: &str) -> Result<SweepResult, ReconciliationError> {
        let user =
            self.db.fetch_user(user_id).await?.ok_or_else(|| ReconciliationError::UserNotFound(user_id.to_string()))?;
        let pending = self.db.fetch_created_orders_for_user(user_id).await?;
        trace!("🔁️ {} outstanding orders for {user_id}", pending.len());
        let mut result = SweepResult::default();
        for order in pending {
            result.checked += 1;
            match self.reconcile_order(&order).await {
                Ok((_, Some(transition))) => result.transitions.push(transition),
                Ok((_, None)) => {},
                Err(e) => {
                    warn!("🔁️ Could not reconcile order {}. {e}", order.trade_no);
                    result.failures.push(SweepFailure { subject: order.trade_no.to_string(), reason: e.to_string() });
                },
            }
        }
        if !user.paid && !result.transitions.iter().any(|t| t.user_newly_paid) {
            self.heal_paid_flag(user_id).await?;
        }
        Ok(result)
    }

    /// Runs [`Self::reconcile_user`] for every user that has ever been issued an order. A user whose sweep fails is
    /// logged and skipped.
    pub async fn reconcile_all(&self) -> Result<SweepResult, ReconciliationError> {
        let users = self.db.fetch_users_with_orders().await?;
        debug!("🔁️ Reconciling orders for {} users", users.len());
        let mut result = SweepResult::default();
        for user_id in users {
            match self.reconcile_user(&user_id).await {
                Ok(r) => result.merge(r),
                Err(e) => {
                    warn!("🔁️ Skipping {user_id}. {e}");
                    result.failures.push(SweepFailure { subject: user_id, reason: e.to_string() });
                },
            }
        }
        info!(
            "🔁️ Sweep complete. {} orders checked. {} paid, {} failed, {} errors",
            result.checked,
            result.paid_count(),
            result.failed_count(),
            result.failures.len()
        );
        Ok(result)
    }

    async fn reconcile_order(
        &self,
        order: &Order,
    ) -> Result<(TradeInfo, Option<StatusTransition>), ReconciliationError> {
        let info = self
            .gateway
            .query_trade_info(order.trade_no.as_str())
            .await
            .map_err(|e| ReconciliationError::UpstreamError(e.to_string()))?;
        let target = match info.status() {
            TradeStatus::Paid => Some(OrderStatusType::Paid),
            TradeStatus::Failed => Some(OrderStatusType::Failed),
            TradeStatus::Pending => None,
            TradeStatus::Unrecognised(code) => {
                debug!("🔁️ Gateway reported TradeStatus '{code}' for {}. Treating as pending.", order.trade_no);
                None
            },
        };
        let transition = match target {
            Some(status) => self.apply_status(order, status, &info.fields).await?,
            None => None,
        };
        Ok((info, transition))
    }

    /// Moves `order` to `target` and fires the matching events.
    ///
    /// When the target is `Paid` the owner's flag is set with a conditional update, and the confirmation event is
    /// published only if that update is the one that flipped it. Returns `None` if nothing changed.
    async fn apply_status(
        &self,
        order: &Order,
        target: OrderStatusType,
        gateway_response: &TradeParams,
    ) -> Result<Option<StatusTransition>, PaymentGatewayError> {
        let now = Utc::now();
        let Some(updated) = self.db.update_order_status(&order.trade_no, target, gateway_response, now).await? else {
            warn!("🔁️ Order {} is already final and cannot become {target}. Ignoring.", order.trade_no);
            return Ok(None);
        };
        let mut user_newly_paid = false;
        match target {
            OrderStatusType::Paid => {
                user_newly_paid = self.db.mark_user_paid(&updated.user_id, now).await?;
                if user_newly_paid {
                    info!("💰️ {} has paid with order {}", updated.user_id, updated.trade_no);
                    self.notify_payment_confirmed(&updated).await;
                }
            },
            OrderStatusType::Failed if order.status != OrderStatusType::Failed => {
                info!("❌️ Payment for order {} failed", updated.trade_no);
                self.notify_order_failed(&updated).await;
            },
            _ => {},
        }
        if order.status == target && !user_newly_paid {
            trace!("🔁️ Order {} was already {target}", order.trade_no);
            return Ok(None);
        }
        Ok(Some(StatusTransition {
            trade_no: updated.trade_no.clone(),
            user_id: updated.user_id.clone(),
            from: order.status,
            to: target,
            user_newly_paid,
        }))
    }

    async fn heal_paid_flag(&self, user_id: &str) -> Result<(), PaymentGatewayError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        if let Some(paid) = orders.into_iter().find(|o| o.status == OrderStatusType::Paid) {
            if self.db.mark_user_paid(user_id, Utc::now()).await? {
                warn!("💰️ {user_id} owned paid order {} but was not flagged as paid. Fixed.", paid.trade_no);
                self.notify_payment_confirmed(&paid).await;
            }
        }
        Ok(())
    }

    async fn notify_payment_confirmed(&self, order: &Order) {
        let user = match self.db.fetch_user(&order.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("💰️ {} was paid but the user record has disappeared", order.user_id);
                UserAccount { user_id: order.user_id.clone(), ..Default::default() }
            },
            Err(e) => {
                warn!("💰️ Could not load {} for the payment confirmation. {e}", order.user_id);
                UserAccount { user_id: order.user_id.clone(), ..Default::default() }
            },
        };
        for emitter in &self.producers.payment_confirmed_producer {
            debug!("💰️ Notifying payment confirmed hook subscribers");
            emitter.publish_event(PaymentConfirmedEvent::new(user.clone(), order.clone())).await;
        }
    }

    async fn notify_order_failed(&self, order: &Order) {
        for emitter in &self.producers.order_failed_producer {
            debug!("❌️ Notifying order failed hook subscribers");
            emitter.publish_event(OrderFailedEvent::new(order.clone())).await;
        }
    }
}
