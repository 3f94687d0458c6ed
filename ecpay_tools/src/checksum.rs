//! CheckMacValue calculation
//!
//! The gateway protects every message in both directions with a keyed SHA-256 digest over the flat parameter set.
//! The digest is independent of parameter order: keys are sorted before the digest input is assembled.
//!
//! The digest input is built as follows:
//! 1. The `CheckMacValue` field itself is dropped.
//! 2. The remaining pairs are sorted by key (byte order, case-sensitive) and joined as `k1=v1&k2=v2&...`.
//! 3. The result is wrapped as `HashKey=<key>&...&HashIV=<iv>`.
//! 4. The whole string is percent-encoded as a URI component and lowercased.
//! 5. The gateway's encoder leaves a handful of characters alone, so their escapes are reverted (space becomes `+`).
//! 6. The SHA-256 digest of that string, hex-encoded in upper case, is the `CheckMacValue`.
use std::collections::BTreeMap;

use cpg_common::Secret;
use log::*;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::data_objects::TradeParams;

pub const CHECK_MAC_VALUE: &str = "CheckMacValue";

/// Escapes that the gateway's URL encoder does not produce, and the literal they are restored to.
const RESTORED_ESCAPES: [(&str, &str); 8] = [
    ("%20", "+"),
    ("%21", "!"),
    ("%28", "("),
    ("%29", ")"),
    ("%2a", "*"),
    ("%2d", "-"),
    ("%2e", "."),
    ("%5f", "_"),
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Parameter '{0}' is not a scalar value and cannot be signed")]
    NonScalarValue(String),
    #[error("Expected a flat JSON object of parameters")]
    NotAnObject,
}

/// Computes and verifies `CheckMacValue` digests with a merchant's `HashKey` and `HashIV`.
#[derive(Clone, Debug)]
pub struct CheckMacCalculator {
    hash_key: Secret<String>,
    hash_iv: Secret<String>,
}

impl CheckMacCalculator {
    pub fn new(hash_key: Secret<String>, hash_iv: Secret<String>) -> Self {
        Self { hash_key, hash_iv }
    }

    /// Calculates the `CheckMacValue` for the parameter set. Any `CheckMacValue` already present is ignored.
    pub fn compute(&self, params: &TradeParams) -> String {
        self.digest(params.iter())
    }

    /// Recomputes the digest for `params` (ignoring their own `CheckMacValue`, if any) and compares it against
    /// `presented`. A mismatch is a normal `false` outcome.
    pub fn verify(&self, params: &TradeParams, presented: &str) -> bool {
        let expected = self.compute(params);
        let valid = expected == presented;
        if !valid {
            debug!("🔏️ CheckMacValue mismatch. Presented {presented}, expected {expected}");
        }
        valid
    }

    /// Like [`Self::compute`], but takes a JSON object. Scalars are coerced to their string form (`true`, `null`,
    /// `30000`, `1.5`). Arrays and objects are rejected.
    pub fn compute_json(&self, params: &Value) -> Result<String, ChecksumError> {
        let params = json_to_params(params)?;
        Ok(self.compute(&params))
    }

    pub fn verify_json(&self, params: &Value, presented: &str) -> Result<bool, ChecksumError> {
        let params = json_to_params(params)?;
        Ok(self.verify(&params, presented))
    }

    fn digest<'a, I>(&self, pairs: I) -> String
    where I: Iterator<Item = (&'a String, &'a String)> {
        let joined = pairs
            .filter(|(k, _)| k.as_str() != CHECK_MAC_VALUE)
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<String>>()
            .join("&");
        let raw = format!("HashKey={}&{joined}&HashIV={}", self.hash_key.reveal(), self.hash_iv.reveal());
        let encoded = gateway_url_encode(&raw);
        trace!("🔏️ CheckMacValue input: {encoded}");
        let digest = Sha256::digest(encoded.as_bytes());
        hex::encode_upper(digest)
    }
}

/// Percent-encodes `raw` the way the gateway does before hashing: URI-component encoding, lower-cased, with the
/// escapes in [`RESTORED_ESCAPES`] reverted.
///
/// The apostrophe stays escaped as `%27` and `~` stays literal, matching the gateway's own reference encoder.
pub fn gateway_url_encode(raw: &str) -> String {
    let mut encoded = urlencoding::encode(raw).to_lowercase();
    for (escape, literal) in RESTORED_ESCAPES {
        encoded = encoded.replace(escape, literal);
    }
    encoded
}

/// Flattens a JSON object into a parameter set using the same scalar coercion as
/// [`CheckMacCalculator::compute_json`].
pub fn json_to_params(value: &Value) -> Result<TradeParams, ChecksumError> {
    let map: &Map<String, Value> = value.as_object().ok_or(ChecksumError::NotAnObject)?;
    let params = map
        .iter()
        .map(|(k, v)| scalar_to_string(k, v).map(|s| (k.clone(), s)))
        .collect::<Result<BTreeMap<String, String>, ChecksumError>>()?;
    Ok(TradeParams::from(params))
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String, ChecksumError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Array(_) | Value::Object(_) => Err(ChecksumError::NonScalarValue(key.to_string())),
    }
}
