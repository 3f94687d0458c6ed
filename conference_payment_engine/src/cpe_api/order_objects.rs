use ecpay_tools::TradeParams;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, TradeNo, UserAccount};

/// A freshly issued order, together with the form the browser must submit to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub order: Order,
    /// The gateway's checkout URL; the form's `action`.
    pub action: String,
    /// The signed form fields. Identical to `order.request_params`.
    pub params: TradeParams,
}

/// The result of querying the gateway for one order: every field the gateway returned, plus the order's status
/// after reconciliation and the owner's aggregate paid flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusView {
    #[serde(flatten)]
    pub gateway: TradeParams,
    #[serde(rename = "paymentStatus")]
    pub payment_status: OrderStatusType,
    #[serde(rename = "isPaid")]
    pub is_paid: bool,
}

/// A status change that reconciliation actually applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub trade_no: TradeNo,
    pub user_id: String,
    pub from: OrderStatusType,
    pub to: OrderStatusType,
    /// True if this transition is the one that flipped the owner's `paid` flag (and triggered the notification).
    pub user_newly_paid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    /// The trade number or user id that could not be reconciled.
    pub subject: String,
    pub reason: String,
}

/// The outcome of a reconciliation sweep. Failures for individual orders or users do not stop the sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    pub checked: usize,
    pub transitions: Vec<StatusTransition>,
    pub failures: Vec<SweepFailure>,
}

impl SweepResult {
    pub fn merge(&mut self, other: SweepResult) {
        self.checked += other.checked;
        self.transitions.extend(other.transitions);
        self.failures.extend(other.failures);
    }

    pub fn paid_count(&self) -> usize {
        self.transitions.iter().filter(|t| t.to == OrderStatusType::Paid).count()
    }

    pub fn failed_count(&self) -> usize {
        self.transitions.iter().filter(|t| t.to == OrderStatusType::Failed).count()
    }
}

/// What happened to an accepted payment notification. Internal errors after acceptance are reported here rather
/// than as a rejection, since the gateway must be acknowledged regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    pub trade_no: TradeNo,
    pub transition: Option<StatusTransition>,
    pub error: Option<String>,
}

/// The attendee's payment state: the aggregate flag plus every order issued to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub user: UserAccount,
    pub order_ids: Vec<TradeNo>,
    pub orders: Vec<Order>,
}
