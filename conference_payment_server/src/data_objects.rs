use std::fmt::Display;

use conference_payment_engine::order_objects::{OrderDraft, OrderStatusView};
use ecpay_tools::TradeParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequestBody {
    pub option_id: String,
}

/// What the browser needs to submit the checkout form: post `params` as form fields to `action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub trade_no: String,
    pub action: String,
    pub params: TradeParams,
}

impl From<OrderDraft> for CheckoutResponse {
    fn from(draft: OrderDraft) -> Self {
        Self { trade_no: draft.order.trade_no.to_string(), action: draft.action, params: draft.params }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub success: bool,
    pub order: OrderStatusView,
}
