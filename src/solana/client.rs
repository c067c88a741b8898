use log::{debug, warn};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::future::Future;
use std::time::Duration;

use crate::errors::FetchError;

/// Retry behavior for transient RPC failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Wrapper around the Solana RPC client with retry logic and error handling
pub struct SolanaClient {
    rpc_client: RpcClient,
    retry_config: RetryConfig,
}

impl SolanaClient {
    /// Create a new Solana client with the given RPC URL
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_config(rpc_url, CommitmentConfig::confirmed(), RetryConfig::default())
    }

    /// Create a client with explicit commitment and retry configuration
    pub fn new_with_config(
        rpc_url: &str,
        commitment: CommitmentConfig,
        retry_config: RetryConfig,
    ) -> Self {
        let rpc_client = RpcClient::new_with_commitment(rpc_url.to_string(), commitment);
        Self {
            rpc_client,
            retry_config,
        }
    }

    /// Get the current Solana slot
    pub async fn get_slot(&self) -> Result<u64, FetchError> {
        self.with_retry("getSlot", || self.rpc_client.get_slot())
            .await
    }

    /// Fetch one transaction in jsonParsed encoding.
    ///
    /// Returns `Ok(None)` when the cluster does not know the signature, so
    /// batch callers can map missing entries instead of failing the chunk.
    pub async fn get_parsed_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<EncodedConfirmedTransactionWithStatusMeta>, FetchError> {
        let result = self
            .with_retry("getTransaction", || {
                let config = RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::JsonParsed),
                    commitment: Some(self.rpc_client.commitment()),
                    max_supported_transaction_version: Some(0),
                };
                self.rpc_client.get_transaction_with_config(signature, config)
            })
            .await;

        match result {
            Ok(tx) => Ok(Some(tx)),
            Err(FetchError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch one page of signatures for an address, newest first
    pub async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<Signature>,
        limit: usize,
    ) -> Result<Vec<RpcConfirmedTransactionStatusWithSignature>, FetchError> {
        self.with_retry("getSignaturesForAddress", || {
            let config = GetConfirmedSignaturesForAddress2Config {
                before,
                until: None,
                limit: Some(limit),
                commitment: Some(self.rpc_client.commitment()),
            };
            self.rpc_client
                .get_signatures_for_address_with_config(address, config)
        })
        .await
    }

    /// Run an RPC call, retrying transient failures with exponential
    /// backoff and jitter. Rate limiting always backs off the longest.
    async fn with_retry<T, F, Fut>(&self, method: &str, call: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = solana_client::client_error::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let fetch_error = classify_client_error(&error);
                    let retryable = !matches!(fetch_error, FetchError::NotFound(_));
                    attempt += 1;
                    if !retryable || attempt > self.retry_config.max_retries {
                        if retryable {
                            warn!("{} failed after {} attempts: {}", method, attempt, error);
                        }
                        return Err(fetch_error);
                    }

                    let exponential = self
                        .retry_config
                        .base_delay_ms
                        .saturating_mul(1 << (attempt - 1).min(6));
                    let mut delay = exponential.min(self.retry_config.max_delay_ms);
                    if matches!(fetch_error, FetchError::RateLimited) {
                        delay = self.retry_config.max_delay_ms;
                    }
                    let jitter = fastrand::u64(0..self.retry_config.base_delay_ms.max(1));
                    debug!(
                        "{} attempt {} failed ({}), retrying in {} ms",
                        method,
                        attempt,
                        error,
                        delay + jitter
                    );
                    tokio::time::sleep(Duration::from_millis(delay + jitter)).await;
                }
            }
        }
    }
}

/// Map a client error onto the fetch taxonomy
fn classify_client_error(error: &solana_client::client_error::ClientError) -> FetchError {
    let message = error.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("429") || lowered.contains("too many requests") {
        FetchError::RateLimited
    } else if lowered.contains("not found")
        || lowered.contains("invalid param: could not find")
        || lowered.contains("signature not found")
    {
        FetchError::NotFound(message)
    } else {
        FetchError::Rpc(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_config_backs_off() {
        let config = RetryConfig::default();
        assert!(config.max_retries >= 1);
        assert!(config.max_delay_ms >= config.base_delay_ms);
    }
}
