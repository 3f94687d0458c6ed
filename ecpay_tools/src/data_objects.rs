use std::{
    collections::{btree_map, BTreeMap},
    fmt::Display,
};

use log::*;
use serde::{Deserialize, Serialize};

/// Success code carried by the `RtnCode` field of a payment result notification.
pub const RTN_CODE_SUCCESS: &str = "1";
/// The `TradeStatus` value reported for trades that failed authorisation.
pub const TRADE_STATUS_FAILED: &str = "10200095";

/// A flat, ordered set of gateway parameters. Keys are kept in byte order, which is also the order the gateway
/// requires when calculating a `CheckMacValue`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeParams(BTreeMap<String, String>);

impl TradeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<K: Into<String>, V: ToString>(&mut self, key: K, value: V) -> Option<String> {
        self.0.insert(key.into(), value.to_string())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    /// A copy of this parameter set without the named keys.
    pub fn without(&self, keys: &[&str]) -> Self {
        self.0.iter().filter(|(k, _)| !keys.contains(&k.as_str())).map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Parses a `key=value&key=value` response body. Each pair is URL-decoded (`+` is a space), pairs with an empty
    /// key are dropped, and a key without `=` gets an empty value.
    pub fn from_urlencoded(body: &str) -> Self {
        body.trim()
            .split('&')
            .filter_map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                let k = decode_component(k);
                if k.is_empty() {
                    return None;
                }
                Some((k, decode_component(v)))
            })
            .collect()
    }
}

impl TradeParams {
    /// Renders the set as a form body. The inverse of [`Self::from_urlencoded`].
    pub fn to_urlencoded(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<String>>()
            .join("&")
    }
}

fn decode_component(s: &str) -> String {
    let s = s.replace('+', " ");
    match urlencoding::decode(&s) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!("Could not URL-decode '{s}' in gateway response. {e}. Using the raw value.");
            s
        },
    }
}

impl From<BTreeMap<String, String>> for TradeParams {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for TradeParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.to_string())).collect())
    }
}

impl<'a> IntoIterator for &'a TradeParams {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for TradeParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<String>>().join("&");
        f.write_str(&s)
    }
}

/// The gateway's view of a trade, mapped onto the three outcomes the payment engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStatus {
    /// `TradeStatus=1`
    Paid,
    /// `TradeStatus=0`. The trade exists but has not been paid for yet.
    Pending,
    /// `TradeStatus=10200095`
    Failed,
    /// Any other code. Treated like `Pending`.
    Unrecognised(String),
}

impl TradeStatus {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => Self::Paid,
            "0" => Self::Pending,
            TRADE_STATUS_FAILED => Self::Failed,
            other => Self::Unrecognised(other.to_string()),
        }
    }
}

impl Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paid => write!(f, "Paid"),
            Self::Pending => write!(f, "Pending"),
            Self::Failed => write!(f, "Failed"),
            Self::Unrecognised(code) => write!(f, "Unrecognised ({code})"),
        }
    }
}

/// The result of a `QueryTradeInfo` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub fields: TradeParams,
}

impl TradeInfo {
    pub fn new(fields: TradeParams) -> Self {
        Self { fields }
    }

    pub fn merchant_trade_no(&self) -> Option<&str> {
        self.fields.get("MerchantTradeNo")
    }

    pub fn trade_status_code(&self) -> Option<&str> {
        self.fields.get("TradeStatus")
    }

    /// A missing `TradeStatus` is reported as unrecognised, i.e. no change.
    pub fn status(&self) -> TradeStatus {
        TradeStatus::from_code(self.trade_status_code().unwrap_or_default())
    }
}
