use std::env;

use chrono::{FixedOffset, Offset, Utc};
use cpg_common::Secret;
use log::*;

pub const STAGE_CHECKOUT_URL: &str = "https://payment-stage.ecpay.com.tw/Cashier/AioCheckOut/V5";
pub const STAGE_QUERY_URL: &str = "https://payment-stage.ecpay.com.tw/Cashier/QueryTradeInfo/V5";
pub const PRODUCTION_CHECKOUT_URL: &str = "https://payment.ecpay.com.tw/Cashier/AioCheckOut/V5";
pub const PRODUCTION_QUERY_URL: &str = "https://payment.ecpay.com.tw/Cashier/QueryTradeInfo/V5";

// Public integration-test merchant published by the gateway. Useless for real payments.
const STAGE_MERCHANT_ID: &str = "3002607";
const STAGE_HASH_KEY: &str = "pwFHCqoQZGmho4w6";
const STAGE_HASH_IV: &str = "EkRm7iFT261dpevs";

/// The gateway's local time is UTC+8.
const DEFAULT_UTC_OFFSET_SECS: i32 = 8 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnvironment {
    Stage,
    Production,
}

impl GatewayEnvironment {
    pub fn checkout_url(&self) -> &'static str {
        match self {
            Self::Stage => STAGE_CHECKOUT_URL,
            Self::Production => PRODUCTION_CHECKOUT_URL,
        }
    }

    pub fn query_url(&self) -> &'static str {
        match self {
            Self::Stage => STAGE_QUERY_URL,
            Self::Production => PRODUCTION_QUERY_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EcPayConfig {
    pub merchant_id: String,
    pub hash_key: Secret<String>,
    pub hash_iv: Secret<String>,
    /// Where the browser posts the signed checkout form.
    pub checkout_url: String,
    /// Server-to-server trade status endpoint.
    pub query_url: String,
    /// Only used by platform merchants. Sent empty otherwise.
    pub platform_id: String,
    /// The payment result notification (webhook) URL that the gateway calls after payment.
    pub return_url: String,
    /// Optional "back to shop" link shown on the gateway's result page.
    pub client_back_url: Option<String>,
    pub trade_desc: String,
    /// Offset used to render `MerchantTradeDate` in gateway-local time.
    pub utc_offset: FixedOffset,
}

impl Default for EcPayConfig {
    fn default() -> Self {
        Self {
            merchant_id: STAGE_MERCHANT_ID.to_string(),
            hash_key: Secret::new(STAGE_HASH_KEY.to_string()),
            hash_iv: Secret::new(STAGE_HASH_IV.to_string()),
            checkout_url: STAGE_CHECKOUT_URL.to_string(),
            query_url: STAGE_QUERY_URL.to_string(),
            platform_id: String::default(),
            return_url: "http://localhost:8360/gateway/callback".to_string(),
            client_back_url: None,
            trade_desc: "Conference registration".to_string(),
            utc_offset: default_offset(),
        }
    }
}

impl EcPayConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let environment = match env::var("CPG_ECPAY_ENVIRONMENT").map(|s| s.to_lowercase()) {
            Ok(s) if s == "production" || s == "prod" => GatewayEnvironment::Production,
            Ok(s) if s == "stage" || s == "staging" => GatewayEnvironment::Stage,
            Ok(s) => {
                warn!("🪛️ '{s}' is not a valid value for CPG_ECPAY_ENVIRONMENT. Using the stage environment.");
                GatewayEnvironment::Stage
            },
            Err(_) => {
                warn!("🪛️ CPG_ECPAY_ENVIRONMENT not set, using the stage environment");
                GatewayEnvironment::Stage
            },
        };
        let merchant_id = env::var("CPG_ECPAY_MERCHANT_ID").unwrap_or_else(|_| {
            warn!("🪛️ CPG_ECPAY_MERCHANT_ID not set, using the (public, test-only) stage merchant");
            defaults.merchant_id.clone()
        });
        let hash_key = Secret::new(env::var("CPG_ECPAY_HASH_KEY").unwrap_or_else(|_| {
            warn!("🪛️ CPG_ECPAY_HASH_KEY not set, using the (public, test-only) stage key");
            defaults.hash_key.reveal().clone()
        }));
        let hash_iv = Secret::new(env::var("CPG_ECPAY_HASH_IV").unwrap_or_else(|_| {
            warn!("🪛️ CPG_ECPAY_HASH_IV not set, using the (public, test-only) stage IV");
            defaults.hash_iv.reveal().clone()
        }));
        let checkout_url =
            env::var("CPG_ECPAY_CHECKOUT_URL").unwrap_or_else(|_| environment.checkout_url().to_string());
        let query_url = env::var("CPG_ECPAY_QUERY_URL").unwrap_or_else(|_| environment.query_url().to_string());
        let platform_id = env::var("CPG_ECPAY_PLATFORM_ID").unwrap_or_default();
        let return_url = env::var("CPG_ECPAY_RETURN_URL").unwrap_or_else(|_| {
            error!(
                "🪛️ CPG_ECPAY_RETURN_URL is not set. The gateway will not be able to notify this server of payments. \
                 Using {} for now.",
                defaults.return_url
            );
            defaults.return_url.clone()
        });
        let client_back_url = env::var("CPG_ECPAY_CLIENT_BACK_URL").ok().filter(|s| !s.trim().is_empty());
        let trade_desc = env::var("CPG_ECPAY_TRADE_DESC").unwrap_or(defaults.trade_desc);
        let utc_offset = env::var("CPG_ECPAY_UTC_OFFSET")
            .ok()
            .and_then(|s| {
                parse_utc_offset(&s).or_else(|| {
                    warn!("🪛️ '{s}' is not a valid UTC offset for CPG_ECPAY_UTC_OFFSET. Expected e.g. '+08:00'.");
                    None
                })
            })
            .unwrap_or(defaults.utc_offset);
        info!("🪛️ Gateway endpoints: checkout {checkout_url}, query {query_url}");
        Self {
            merchant_id,
            hash_key,
            hash_iv,
            checkout_url,
            query_url,
            platform_id,
            return_url,
            client_back_url,
            trade_desc,
            utc_offset,
        }
    }
}

fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Parses offsets of the form `+08:00`, `-0530` or `8`.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    let (sign, rest) = match s.chars().next()? {
        '+' => (1, &s[1..]),
        '-' => (-1, &s[1..]),
        _ => (1, s),
    };
    let digits = rest.replace(':', "");
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
