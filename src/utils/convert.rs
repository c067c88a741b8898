use anyhow::Result;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Convert a string to a Pubkey
pub fn pubkey_from_str(pubkey_str: &str) -> Result<Pubkey> {
    Ok(Pubkey::from_str(pubkey_str)?)
}

/// Convert a raw token amount string to UI units using the mint's decimals
pub fn raw_to_ui_amount(raw: &str, decimals: u8) -> f64 {
    match raw.parse::<u128>() {
        Ok(value) => value as f64 / 10f64.powi(decimals as i32),
        Err(_) => 0.0,
    }
}

/// Convert hours to milliseconds
pub fn hours_to_ms(hours: f64) -> i64 {
    (hours * 60.0 * 60.0 * 1000.0) as i64
}
