use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use reqwest::Client;

use crate::{
    checksum::{CheckMacCalculator, CHECK_MAC_VALUE},
    config::EcPayConfig,
    data_objects::{TradeInfo, TradeParams},
    EcPayApiError,
};

/// Everything needed to build the signed checkout form for one order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub trade_no: String,
    pub trade_date: DateTime<Utc>,
    pub amount: i64,
    pub item_name: String,
}

#[derive(Clone)]
pub struct EcPayApi {
    config: EcPayConfig,
    calculator: CheckMacCalculator,
    client: Arc<Client>,
}

impl EcPayApi {
    pub fn new(config: EcPayConfig) -> Result<Self, EcPayApiError> {
        let client = Client::builder()
            .user_agent(concat!("conference-payment-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EcPayApiError::Initialization(e.to_string()))?;
        let calculator = CheckMacCalculator::new(config.hash_key.clone(), config.hash_iv.clone());
        Ok(Self { config, calculator, client: Arc::new(client) })
    }

    pub fn config(&self) -> &EcPayConfig {
        &self.config
    }

    pub fn merchant_id(&self) -> &str {
        self.config.merchant_id.as_str()
    }

    pub fn checkout_url(&self) -> &str {
        self.config.checkout_url.as_str()
    }

    pub fn calculator(&self) -> &CheckMacCalculator {
        &self.calculator
    }

    /// Calculates the `CheckMacValue` for `params` and stores it in the set, replacing any previous value.
    pub fn sign(&self, mut params: TradeParams) -> TradeParams {
        let mac = self.calculator.compute(&params);
        params.insert(CHECK_MAC_VALUE, mac);
        params
    }

    pub fn verify(&self, params: &TradeParams, presented: &str) -> bool {
        self.calculator.verify(params, presented)
    }

    /// Builds the signed all-in-one checkout form. No request is made; the browser submits these fields to
    /// [`Self::checkout_url`].
    pub fn checkout_params(&self, req: &CheckoutRequest) -> TradeParams {
        let trade_date = req.trade_date.with_timezone(&self.config.utc_offset).format("%Y/%m/%d %H:%M:%S");
        let mut params = TradeParams::new()
            .with("MerchantID", &self.config.merchant_id)
            .with("MerchantTradeNo", &req.trade_no)
            .with("MerchantTradeDate", trade_date)
            .with("PaymentType", "aio")
            .with("TotalAmount", req.amount)
            .with("TradeDesc", &self.config.trade_desc)
            .with("ItemName", &req.item_name)
            .with("ReturnURL", &self.config.return_url)
            .with("ChoosePayment", "ALL")
            .with("EncryptType", 1)
            .with(CHECK_MAC_VALUE, "");
        if let Some(url) = &self.config.client_back_url {
            params.insert("ClientBackURL", url);
        }
        self.sign(params)
    }

    pub fn query_params(&self, trade_no: &str, timestamp: i64) -> TradeParams {
        let params = TradeParams::new()
            .with("MerchantID", &self.config.merchant_id)
            .with("MerchantTradeNo", trade_no)
            .with("TimeStamp", timestamp)
            .with("PlatformID", &self.config.platform_id);
        self.sign(params)
    }

    /// Asks the gateway for the current state of a trade.
    ///
    /// The request is not retried. Non-2xx responses, bodies that are not `key=value` lists, responses for a
    /// different trade, and responses whose `CheckMacValue` does not verify are all errors.
    pub async fn query_trade_info(&self, trade_no: &str) -> Result<TradeInfo, EcPayApiError> {
        let params = self.query_params(trade_no, Utc::now().timestamp());
        trace!("💳️ Querying trade info for {trade_no}");
        let response = self
            .client
            .post(self.config.query_url.as_str())
            .form(params.as_map())
            .send()
            .await
            .map_err(|e| EcPayApiError::RequestError(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| EcPayApiError::RequestError(e.to_string()))?;
        if !status.is_success() {
            return Err(EcPayApiError::QueryError { status: status.as_u16(), message: body });
        }
        trace!("💳️ Trade info response for {trade_no}: {body}");
        let info = parse_trade_info(trade_no, &body, &self.calculator)?;
        debug!("💳️ Gateway reports trade {trade_no} as {}", info.status());
        Ok(info)
    }
}

fn parse_trade_info(trade_no: &str, body: &str, calculator: &CheckMacCalculator) -> Result<TradeInfo, EcPayApiError> {
    if !body.contains('=') {
        return Err(EcPayApiError::MalformedResponse(body.to_string()));
    }
    let fields = TradeParams::from_urlencoded(body);
    if let Some(mac) = fields.get(CHECK_MAC_VALUE) {
        if !calculator.verify(&fields, mac) {
            warn!("💳️ Trade info for {trade_no} carried an invalid CheckMacValue");
            return Err(EcPayApiError::ResponseChecksumMismatch(trade_no.to_string()));
        }
    }
    match fields.get("MerchantTradeNo") {
        Some(t) if t != trade_no => {
            Err(EcPayApiError::MalformedResponse(format!("Asked for trade {trade_no}, but the response is for {t}")))
        },
        _ => Ok(TradeInfo::new(fields)),
    }
}
