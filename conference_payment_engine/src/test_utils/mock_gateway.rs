use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use ecpay_tools::{
    CheckoutRequest,
    EcPayApi,
    EcPayApiError,
    EcPayConfig,
    TradeInfo,
    TradeParams,
    RTN_CODE_SUCCESS,
};

use crate::traits::PaymentGatewayClient;

#[derive(Debug, Clone)]
enum Scripted {
    Status(String),
    Unreachable(String),
}

/// A gateway that signs and verifies with the real stage credentials, but answers trade queries from a script.
///
/// Trades that have not been scripted report `TradeStatus=0` (not paid yet).
#[derive(Clone)]
pub struct MockGateway {
    api: EcPayApi,
    script: Arc<Mutex<HashMap<String, Scripted>>>,
    queries: Arc<AtomicUsize>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        let api = EcPayApi::new(EcPayConfig::default()).expect("Could not create gateway client");
        Self { api, script: Arc::new(Mutex::new(HashMap::new())), queries: Arc::new(AtomicUsize::new(0)) }
    }

    /// Subsequent queries for `trade_no` report `TradeStatus=code`.
    pub fn set_trade_status(&self, trade_no: &str, code: &str) {
        self.script.lock().unwrap().insert(trade_no.to_string(), Scripted::Status(code.to_string()));
    }

    /// Subsequent queries for `trade_no` fail as if the gateway could not be reached.
    pub fn set_unreachable(&self, trade_no: &str, message: &str) {
        self.script.lock().unwrap().insert(trade_no.to_string(), Scripted::Unreachable(message.to_string()));
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn merchant_id(&self) -> &str {
        self.api.merchant_id()
    }

    pub fn sign(&self, params: TradeParams) -> TradeParams {
        self.api.sign(params)
    }

    /// A correctly signed payment notification like the gateway would send for `trade_no`.
    pub fn callback_payload(&self, trade_no: &str, rtn_code: &str, amount: i64) -> TradeParams {
        let rtn_msg = if rtn_code == RTN_CODE_SUCCESS { "Succeeded" } else { "Failed" };
        let params = TradeParams::new()
            .with("MerchantID", self.api.merchant_id())
            .with("MerchantTradeNo", trade_no)
            .with("PaymentDate", "2025/03/01 10:11:12")
            .with("PaymentType", "Credit_CreditCard")
            .with("PaymentTypeChargeFee", 20)
            .with("RtnCode", rtn_code)
            .with("RtnMsg", rtn_msg)
            .with("SimulatePaid", 0)
            .with("TradeAmt", amount)
            .with("TradeDate", "2025/03/01 10:10:01")
            .with("TradeNo", "2503011010018843");
        self.api.sign(params)
    }
}

impl PaymentGatewayClient for MockGateway {
    fn checkout_url(&self) -> &str {
        self.api.checkout_url()
    }

    fn checkout_params(&self, req: &CheckoutRequest) -> TradeParams {
        self.api.checkout_params(req)
    }

    fn verify_checksum(&self, params: &TradeParams, presented: &str) -> bool {
        self.api.verify(params, presented)
    }

    async fn query_trade_info(&self, trade_no: &str) -> Result<TradeInfo, EcPayApiError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().get(trade_no).cloned();
        let code = match scripted {
            Some(Scripted::Unreachable(message)) => return Err(EcPayApiError::RequestError(message)),
            Some(Scripted::Status(code)) => code,
            None => "0".to_string(),
        };
        let fields = TradeParams::new()
            .with("MerchantID", self.api.merchant_id())
            .with("MerchantTradeNo", trade_no)
            .with("TradeStatus", code);
        Ok(TradeInfo::new(self.api.sign(fields)))
    }
}
