use async_trait::async_trait;
use log::debug;
use solana_sdk::signature::Signature;
use std::str::FromStr;
use std::sync::Arc;

use crate::dlmm::events::{events_for_position, extract_events};
use crate::dlmm::PairRegistry;
use crate::errors::FetchError;
use crate::models::PositionEvent;
use crate::solana::SolanaClient;
use crate::utils::{format_pubkey, pubkey_from_str};

const SIGNATURE_PAGE_LIMIT: usize = 1000;

/// A history fetch failure, carrying whatever prefix of the event stream
/// was recovered before the failure so the reconstructor can keep a
/// partial (flagged) result instead of discarding the position.
#[derive(Debug)]
pub struct HistoryError {
    pub error: FetchError,
    pub partial: Vec<PositionEvent>,
}

impl HistoryError {
    fn new(error: FetchError) -> Self {
        Self {
            error,
            partial: Vec::new(),
        }
    }
}

/// Supplies the complete, chronologically ordered event history of one
/// position address. Ties are broken by on-chain slot order, which the
/// underlying provider guarantees.
#[async_trait]
pub trait TransactionHistory: Send + Sync {
    async fn fetch_history(&self, address: &str) -> Result<Vec<PositionEvent>, HistoryError>;
}

/// RPC-backed history provider: pages the position's signature list and
/// fetches the parsed transactions one at a time, oldest first.
///
/// Fetches within one position are sequential on purpose; the pipeline
/// bounds concurrency across positions, so each in-flight reconstruction
/// accounts for exactly one external call at a time.
pub struct RpcTransactionHistory {
    client: Arc<SolanaClient>,
    registry: Arc<PairRegistry>,
}

impl RpcTransactionHistory {
    pub fn new(client: Arc<SolanaClient>, registry: Arc<PairRegistry>) -> Self {
        Self { client, registry }
    }

    /// All successful signatures for the address, oldest first
    async fn collect_signatures(&self, address: &str) -> Result<Vec<Signature>, FetchError> {
        let pubkey = pubkey_from_str(address)
            .map_err(|_| FetchError::NotFound(format!("invalid position address {}", address)))?;

        let mut statuses = Vec::new();
        let mut before: Option<Signature> = None;
        loop {
            let page = self
                .client
                .get_signatures_for_address(&pubkey, before, SIGNATURE_PAGE_LIMIT)
                .await?;
            let page_len = page.len();
            if let Some(last) = page.last() {
                before = Signature::from_str(&last.signature).ok();
            }
            statuses.extend(page);
            if page_len < SIGNATURE_PAGE_LIMIT || before.is_none() {
                break;
            }
        }

        // Newest first from the RPC; failed transactions carry no events.
        let mut signatures: Vec<Signature> = statuses
            .iter()
            .filter(|status| status.err.is_none())
            .filter_map(|status| Signature::from_str(&status.signature).ok())
            .collect();
        signatures.reverse();

        if signatures.is_empty() {
            return Err(FetchError::NotFound(format!(
                "no transaction history for {}",
                address
            )));
        }
        debug!(
            "Collected {} signatures for {}",
            signatures.len(),
            format_pubkey(&pubkey)
        );
        Ok(signatures)
    }
}

#[async_trait]
impl TransactionHistory for RpcTransactionHistory {
    async fn fetch_history(&self, address: &str) -> Result<Vec<PositionEvent>, HistoryError> {
        let signatures = self
            .collect_signatures(address)
            .await
            .map_err(HistoryError::new)?;

        // Keep the chronological prefix that fetched cleanly; folding past
        // a gap would corrupt the running totals.
        let mut events = Vec::new();
        let mut failure: Option<FetchError> = None;
        for signature in &signatures {
            match self.client.get_parsed_transaction(signature).await {
                Ok(Some(tx)) => {
                    events.extend(extract_events(&tx, &self.registry).events);
                }
                Ok(None) => continue,
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let events = events_for_position(events, address);

        match failure {
            Some(error) => Err(HistoryError {
                error,
                partial: events,
            }),
            None => Ok(events),
        }
    }
}
