use anyhow::{anyhow, Result};
use chrono::Utc;
use ecpay_tools::{EcPayApi, EcPayConfig, TradeParams, RTN_CODE_SUCCESS};

use crate::{client::PaymentServerClient, CallbackParams};

/// Builds a payment result notification for `trade_no`, signed with the configured merchant credentials.
pub fn build_notification(api: &EcPayApi, trade_no: &str, rtn_code: &str, amount: i64) -> TradeParams {
    let config = api.config();
    let now = Utc::now().with_timezone(&config.utc_offset).format("%Y/%m/%d %H:%M:%S").to_string();
    let rtn_msg = if rtn_code == RTN_CODE_SUCCESS { "Succeeded" } else { "Failed" };
    let params = TradeParams::new()
        .with("MerchantID", api.merchant_id())
        .with("MerchantTradeNo", trade_no)
        .with("PaymentDate", &now)
        .with("PaymentType", "Credit_CreditCard")
        .with("RtnCode", rtn_code)
        .with("RtnMsg", rtn_msg)
        .with("SimulatePaid", 1)
        .with("TradeAmt", amount)
        .with("TradeDate", &now);
    api.sign(params)
}

pub async fn send_notification(params: CallbackParams) -> Result<()> {
    let api = EcPayApi::new(EcPayConfig::new_from_env_or_default()).map_err(|e| anyhow!("{e}"))?;
    let notification = build_notification(&api, &params.trade_no, &params.rtn_code, params.amount);
    println!("Notification: {notification}");
    let client = PaymentServerClient::new(&params.server, String::default())?;
    let ack = client.send_callback(&notification).await?;
    println!("Server replied: {ack}");
    Ok(())
}
