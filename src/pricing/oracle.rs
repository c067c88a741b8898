use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::FetchError;

const MAX_PRICE_RETRIES: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 400;

/// Historical USD price source: one point-in-time quote per
/// `(mint, timestamp)` pair, never cached beyond the lookup.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price per UI unit of `mint` at the given time, `None` when the
    /// oracle has no quote for that moment
    async fn price_at(&self, mint: &str, timestamp_ms: i64) -> Result<Option<f64>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: Option<PricePoint>,
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    value: f64,
}

/// HTTP implementation against a Birdeye-style historical price endpoint
pub struct HttpPriceOracle {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpPriceOracle {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn fetch_quote(&self, mint: &str, timestamp_ms: i64) -> Result<Option<f64>, FetchError> {
        let url = format!(
            "{}/defi/historical_price_unix?address={}&unixtime={}",
            self.base_url,
            mint,
            timestamp_ms / 1000
        );
        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let payload: PriceResponse = response
                    .json()
                    .await
                    .map_err(|e| FetchError::Rpc(format!("malformed price payload: {}", e)))?;
                if !payload.success {
                    return Ok(None);
                }
                Ok(payload.data.map(|point| point.value))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
            status => Err(FetchError::Rpc(format!("price api returned {}", status))),
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn price_at(&self, mint: &str, timestamp_ms: i64) -> Result<Option<f64>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_quote(mint, timestamp_ms).await {
                Ok(quote) => {
                    if quote.is_none() {
                        debug!("No quote for {} at {}", mint, timestamp_ms);
                    }
                    return Ok(quote);
                }
                Err(error) => {
                    attempt += 1;
                    if attempt > MAX_PRICE_RETRIES {
                        warn!(
                            "Price lookup for {} at {} failed after {} attempts: {}",
                            mint, timestamp_ms, attempt, error
                        );
                        return Err(error);
                    }
                    let backoff = RETRY_BASE_DELAY_MS * (1 << (attempt - 1).min(4));
                    let jitter = fastrand::u64(0..RETRY_BASE_DELAY_MS);
                    tokio::time::sleep(Duration::from_millis(backoff + jitter)).await;
                }
            }
        }
    }
}
