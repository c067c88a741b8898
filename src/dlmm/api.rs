use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::dlmm::program::QUOTE_MINTS;
use crate::errors::FetchError;

const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
const MAX_API_RETRIES: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// One pool from the DLMM pair directory
#[derive(Debug, Clone, Deserialize)]
pub struct DlmmPair {
    pub address: String,
    pub name: String,
    pub mint_x: String,
    pub mint_y: String,
    #[serde(default)]
    pub reward_mint_x: Option<String>,
    #[serde(default)]
    pub reward_mint_y: Option<String>,
}

impl DlmmPair {
    /// Reward mints in pool order, with the system-program placeholder
    /// the API uses for "no reward" filtered out
    pub fn reward_mints(&self) -> Vec<&str> {
        [self.reward_mint_x.as_deref(), self.reward_mint_y.as_deref()]
            .into_iter()
            .flatten()
            .filter(|mint| !mint.is_empty() && *mint != SYSTEM_PROGRAM_ID)
            .collect()
    }

    /// True when the registry lists the quote token on the X side, i.e. the
    /// pair is stored opposite to its canonical orientation
    pub fn is_inverted(&self) -> bool {
        QUOTE_MINTS.contains(&self.mint_x.as_str()) && !QUOTE_MINTS.contains(&self.mint_y.as_str())
    }
}

/// Pool directory, fetched once per run and read-only thereafter
#[derive(Debug, Default)]
pub struct PairRegistry {
    by_address: HashMap<String, DlmmPair>,
}

impl PairRegistry {
    pub fn new(pairs: Vec<DlmmPair>) -> Self {
        let by_address = pairs
            .into_iter()
            .map(|pair| (pair.address.clone(), pair))
            .collect();
        Self { by_address }
    }

    pub fn get(&self, lb_pair: &str) -> Option<&DlmmPair> {
        self.by_address.get(lb_pair)
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

/// Token metadata from the token directory
#[derive(Debug, Clone, Deserialize)]
pub struct TokenMeta {
    #[serde(rename = "address")]
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Token directory, fetched once per run
#[derive(Debug, Default)]
pub struct TokenDirectory {
    by_mint: HashMap<String, TokenMeta>,
}

impl TokenDirectory {
    pub fn new(tokens: Vec<TokenMeta>) -> Self {
        let by_mint = tokens
            .into_iter()
            .map(|token| (token.mint.clone(), token))
            .collect();
        Self { by_mint }
    }

    pub fn get(&self, mint: &str) -> Option<&TokenMeta> {
        self.by_mint.get(mint)
    }

    /// Symbol for a mint, falling back to a shortened address
    pub fn symbol(&self, mint: &str) -> String {
        match self.by_mint.get(mint) {
            Some(meta) => meta.symbol.clone(),
            None if mint.len() > 8 => format!("{}...", &mint[..8]),
            None => mint.to_string(),
        }
    }

    pub fn decimals(&self, mint: &str) -> Option<u8> {
        self.by_mint.get(mint).map(|meta| meta.decimals)
    }
}

/// Point-in-time unclaimed fee balances for a position
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UnclaimedFees {
    #[serde(rename = "fee_x")]
    pub x: f64,
    #[serde(rename = "fee_y")]
    pub y: f64,
}

#[derive(Debug, Deserialize)]
struct PairsResponse {
    pairs: Vec<DlmmPair>,
}

/// HTTP client for the DLMM pair directory, the token directory, and
/// per-position unclaimed fee snapshots
pub struct DlmmApiClient {
    http: reqwest::Client,
    dlmm_url: String,
    token_url: String,
}

impl DlmmApiClient {
    pub fn new(dlmm_url: &str, token_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            dlmm_url: dlmm_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the full pool directory
    pub async fn list_pairs(&self) -> Result<PairRegistry> {
        let url = format!("{}/pair/all", self.dlmm_url);
        let response: PairsResponse = self
            .get_json(&url)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to fetch DLMM pair directory")?;

        info!("Loaded {} DLMM pairs", response.pairs.len());
        Ok(PairRegistry::new(response.pairs))
    }

    /// Fetch the token directory
    pub async fn list_tokens(&self) -> Result<TokenDirectory> {
        let tokens: Vec<TokenMeta> = self
            .get_json(&self.token_url)
            .await
            .map_err(anyhow::Error::from)
            .context("Failed to fetch token directory")?;

        info!("Loaded {} token directory entries", tokens.len());
        Ok(TokenDirectory::new(tokens))
    }

    /// Unclaimed fee balances for a still-open position.
    ///
    /// Closed positions have no account left to query; callers use zero.
    pub async fn position_unclaimed_fees(&self, address: &str) -> Result<UnclaimedFees, FetchError> {
        let url = format!("{}/position/{}", self.dlmm_url, address);
        self.get_json(&url).await
    }

    /// GET a JSON payload with retry/backoff on transient failures
    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut attempt = 0;
        loop {
            match self.try_get_json(url).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > MAX_API_RETRIES || matches!(err, FetchError::NotFound(_)) {
                        return Err(err);
                    }
                    let backoff = RETRY_BASE_DELAY_MS * (1 << (attempt - 1).min(4));
                    let jitter = fastrand::u64(0..RETRY_BASE_DELAY_MS / 2);
                    debug!(
                        "Retrying {} after {} ms (attempt {}): {}",
                        url,
                        backoff + jitter,
                        attempt,
                        err
                    );
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
            }
        }
    }

    async fn try_get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| FetchError::Rpc(format!("malformed payload from {}: {}", url, e))),
            reqwest::StatusCode::NOT_FOUND => Err(FetchError::NotFound(url.to_string())),
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limited by {}", url);
                Err(FetchError::RateLimited)
            }
            status => Err(FetchError::Rpc(format!("{} returned {}", url, status))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(mint_x: &str, mint_y: &str) -> DlmmPair {
        DlmmPair {
            address: "pair".to_string(),
            name: "X-Y".to_string(),
            mint_x: mint_x.to_string(),
            mint_y: mint_y.to_string(),
            reward_mint_x: Some(SYSTEM_PROGRAM_ID.to_string()),
            reward_mint_y: None,
        }
    }

    #[test]
    fn placeholder_reward_mints_are_filtered() {
        assert!(pair("a", "b").reward_mints().is_empty());
    }

    #[test]
    fn quote_on_x_side_marks_pair_inverted() {
        let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
        assert!(pair(usdc, "SomeOtherMint").is_inverted());
        assert!(!pair("SomeOtherMint", usdc).is_inverted());
    }

    #[test]
    fn token_directory_falls_back_to_shortened_mint() {
        let directory = TokenDirectory::new(vec![TokenMeta {
            mint: "MintAAAAAAAA".to_string(),
            symbol: "AAA".to_string(),
            decimals: 6,
        }]);
        assert_eq!(directory.symbol("MintAAAAAAAA"), "AAA");
        assert_eq!(directory.symbol("MintBBBBBBBB"), "MintBBBB...");
        assert_eq!(directory.decimals("MintAAAAAAAA"), Some(6));
    }
}
