use ecpay_tools::{CheckoutRequest, EcPayApi, EcPayApiError, TradeInfo, TradeParams};

/// The payment gateway as seen by the order flow.
///
/// [`EcPayApi`] is the production implementation. Tests substitute a scripted gateway.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayClient {
    /// Where the browser should submit the checkout form.
    fn checkout_url(&self) -> &str;

    /// The complete, signed checkout form for a new order.
    fn checkout_params(&self, req: &CheckoutRequest) -> TradeParams;

    /// Recomputes the `CheckMacValue` of `params` and compares it with `presented`.
    fn verify_checksum(&self, params: &TradeParams, presented: &str) -> bool;

    /// Queries the gateway for the current state of a trade. Not retried.
    async fn query_trade_info(&self, trade_no: &str) -> Result<TradeInfo, EcPayApiError>;
}

impl PaymentGatewayClient for EcPayApi {
    fn checkout_url(&self) -> &str {
        EcPayApi::checkout_url(self)
    }

    fn checkout_params(&self, req: &CheckoutRequest) -> TradeParams {
        EcPayApi::checkout_params(self, req)
    }

    fn verify_checksum(&self, params: &TradeParams, presented: &str) -> bool {
        self.verify(params, presented)
    }

    async fn query_trade_info(&self, trade_no: &str) -> Result<TradeInfo, EcPayApiError> {
        EcPayApi::query_trade_info(self, trade_no).await
    }
}
