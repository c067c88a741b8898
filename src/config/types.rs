use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::env;

use crate::report::Thresholds;

/// Where to find the submitted signature in each input row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignatureSource {
    /// A header label, matched against the input file's header row
    ByLabel(String),
    /// A zero-based column index
    ByIndex(usize),
}

/// Configuration for one audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Solana RPC URL
    pub rpc_url: String,
    /// Input CSV of submissions
    pub data_file: String,
    /// Output CSV path
    pub out_file: String,
    /// Signature column selector
    pub signature_source: SignatureSource,
    /// Wallet column label; absence disables wallet matching
    pub wallet_column_label: Option<String>,
    /// Submission window bounds (epoch milliseconds)
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    /// Minimum magnitude of the USD deposit value
    pub min_usd_deposit_value: f64,
    /// Minimum profit percent
    pub min_profit_percent: f64,
    /// Minimum hold duration in hours
    pub min_hours_open: f64,
    /// USD profit ratios above this are treated as pricing outliers
    pub profit_percent_sanity_ceiling: f64,
    /// Maximum concurrent external calls
    pub throttle_limit: usize,
    /// DLMM pair/position API base URL
    pub dlmm_api_url: String,
    /// Token directory URL
    pub token_api_url: String,
    /// Historical price API base URL and optional key
    pub price_api_url: String,
    pub price_api_key: Option<String>,
}

impl Config {
    /// The evaluator thresholds this configuration implies
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_usd_deposit: self.min_usd_deposit_value,
            min_profit_percent: self.min_profit_percent,
            min_hours_open: self.min_hours_open,
            window_start_ms: self.window_start_ms,
            window_end_ms: self.window_end_ms,
            profit_percent_sanity_ceiling: self.profit_percent_sanity_ceiling,
            require_wallet_match: self.wallet_column_label.is_some(),
        }
    }
}

/// Parse a date as RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_date_ms(value: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date: {}", value))?;
        return Ok(midnight.and_utc().timestamp_millis());
    }
    Err(anyhow!("could not parse date: {}", value))
}

/// Loads configuration from environment variables.
///
/// Every missing or malformed required setting is collected so the run
/// aborts once with the full list, before any processing starts.
pub fn load_config() -> Result<Config> {
    let mut errors: Vec<String> = Vec::new();

    let mut required = |variable: &str| -> String {
        match env::var(variable) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                errors.push(format!("{} environment variable not found", variable));
                String::new()
            }
        }
    };

    let signature_label = env::var("SIGNATURE_COLUMN_LABEL").ok();
    let signature_index = env::var("SIGNATURE_COLUMN_INDEX")
        .ok()
        .and_then(|value| value.parse::<usize>().ok());
    let rpc_url = required("RPC_URL");
    let data_file = required("DATA_FILE");
    let start_date = required("START_DATE");
    let end_date = required("END_DATE");
    let min_usd_deposit = required("MIN_USD_DEPOSIT_VALUE");
    let min_hours_open = required("MIN_HOURS_OPEN");

    let signature_source = match (signature_label, signature_index) {
        (Some(label), _) => Some(SignatureSource::ByLabel(label)),
        (None, Some(index)) => Some(SignatureSource::ByIndex(index)),
        (None, None) => {
            errors.push("SIGNATURE_COLUMN_LABEL environment variable not found".to_string());
            None
        }
    };

    let mut parse_field = |label: &str, value: &str, parsed: Result<f64, std::num::ParseFloatError>| {
        match parsed {
            Ok(number) => number,
            Err(_) => {
                if !value.is_empty() {
                    errors.push(format!("{} is not a number: {}", label, value));
                }
                0.0
            }
        }
    };
    let min_usd_deposit_value =
        parse_field("MIN_USD_DEPOSIT_VALUE", &min_usd_deposit, min_usd_deposit.parse());
    let min_hours_open_value = parse_field("MIN_HOURS_OPEN", &min_hours_open, min_hours_open.parse());

    let window_start_ms = match parse_date_ms(&start_date) {
        Ok(ms) => ms,
        Err(_) => {
            if !start_date.is_empty() {
                errors.push(format!("START_DATE could not be parsed: {}", start_date));
            }
            0
        }
    };
    let window_end_ms = match parse_date_ms(&end_date) {
        Ok(ms) => ms,
        Err(_) => {
            if !end_date.is_empty() {
                errors.push(format!("END_DATE could not be parsed: {}", end_date));
            }
            0
        }
    };

    if !errors.is_empty() {
        return Err(anyhow!(errors.join("\n")));
    }

    Ok(Config {
        rpc_url,
        data_file,
        out_file: env::var("OUT_FILE").unwrap_or_else(|_| "./out.csv".to_string()),
        signature_source: signature_source.expect("signature source checked above"),
        wallet_column_label: env::var("WALLET_COLUMN_LABEL").ok().filter(|v| !v.is_empty()),
        window_start_ms,
        window_end_ms,
        min_usd_deposit_value,
        min_profit_percent: env::var("MIN_PROFIT_PERCENT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(0.0),
        min_hours_open: min_hours_open_value,
        profit_percent_sanity_ceiling: env::var("PROFIT_PERCENT_SANITY_CEILING")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(10.0),
        throttle_limit: env::var("THROTTLE_LIMIT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(10),
        dlmm_api_url: env::var("DLMM_API_URL")
            .unwrap_or_else(|_| "https://dlmm-api.meteora.ag".to_string()),
        token_api_url: env::var("TOKEN_API_URL")
            .unwrap_or_else(|_| "https://token.jup.ag/all".to_string()),
        price_api_url: env::var("PRICE_API_URL")
            .unwrap_or_else(|_| "https://public-api.birdeye.so".to_string()),
        price_api_key: env::var("PRICE_API_KEY").ok().filter(|v| !v.is_empty()),
    })
}
