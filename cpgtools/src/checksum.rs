use std::fs;

use anyhow::{anyhow, Result};
use ecpay_tools::{checksum::json_to_params, CheckMacCalculator, EcPayConfig, TradeParams, CHECK_MAC_VALUE};
use serde_json::Value;

use crate::ChecksumParams;

pub enum ChecksumOutcome {
    Computed(String),
    Verified { expected: String, valid: bool },
}

/// Parses `Key=Value` arguments. Values may themselves contain `=`.
pub fn parse_pairs(pairs: &[String]) -> Result<TradeParams> {
    pairs
        .iter()
        .map(|p| p.split_once('=').map(|(k, v)| (k.trim().to_string(), v.to_string())))
        .collect::<Option<Vec<(String, String)>>>()
        .map(|v| v.into_iter().collect())
        .ok_or_else(|| anyhow!("Parameters must be given as Key=Value"))
}

/// Reads a flat JSON object of parameters. Scalars are coerced exactly as the gateway signer does.
pub fn params_from_json(text: &str) -> Result<TradeParams> {
    let value: Value = serde_json::from_str(text)?;
    json_to_params(&value).map_err(|e| anyhow!("{e}"))
}

fn load_params(params: &ChecksumParams) -> Result<TradeParams> {
    if let Some(path) = &params.json {
        let text = fs::read_to_string(path).map_err(|e| anyhow!("Could not read {path}. {e}"))?;
        return params_from_json(&text).map_err(|e| anyhow!("{path}: {e}"));
    }
    if let Some(body) = &params.form {
        return Ok(TradeParams::from_urlencoded(body));
    }
    parse_pairs(&params.pairs)
}

/// Computes the `CheckMacValue` of the parameters. If they carry one, it is verified instead.
pub fn check(calculator: &CheckMacCalculator, params: &TradeParams) -> ChecksumOutcome {
    let expected = calculator.compute(params);
    match params.get(CHECK_MAC_VALUE) {
        Some(presented) => ChecksumOutcome::Verified { valid: calculator.verify(params, presented), expected },
        None => ChecksumOutcome::Computed(expected),
    }
}

pub fn print_checksum(params: ChecksumParams) {
    let trade_params = match load_params(&params) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return;
        },
    };
    let config = EcPayConfig::new_from_env_or_default();
    let calculator = CheckMacCalculator::new(config.hash_key, config.hash_iv);
    println!("---------------------------- CheckMacValue -----------------------------");
    println!("merchant: {}", config.merchant_id);
    match check(&calculator, &trade_params) {
        ChecksumOutcome::Computed(value) => println!("{CHECK_MAC_VALUE}: {value}"),
        ChecksumOutcome::Verified { expected, valid } => {
            println!("expected: {expected}");
            println!("valid: {valid}");
        },
    }
    println!("------------------------------------------------------------------------");
}
