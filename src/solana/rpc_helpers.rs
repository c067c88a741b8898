use log::{info, warn};
use solana_sdk::signature::Signature;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;
use std::sync::Arc;

use crate::errors::FetchError;
use crate::solana::client::SolanaClient;
use crate::throttle::TaskRunner;

/// Provider limit on signatures per batch request
pub const TRANSACTION_FETCH_CHUNK_SIZE: usize = 250;

/// Outcome of fetching one signature: the parsed transaction, `None` when
/// the cluster does not know it, or the error that survived retries
pub type FetchedTransaction = (
    Signature,
    Result<Option<EncodedConfirmedTransactionWithStatusMeta>, FetchError>,
);

/// Fetch parsed transactions chunked to respect provider limits and
/// throttled by the task runner. Results come back in submission order;
/// missing transactions map to `None` instead of failing the batch.
pub async fn fetch_chunked(
    client: Arc<SolanaClient>,
    runner: &TaskRunner,
    signatures: &[Signature],
) -> Vec<FetchedTransaction> {
    let mut fetched = Vec::with_capacity(signatures.len());
    for chunk in signatures.chunks(TRANSACTION_FETCH_CHUNK_SIZE) {
        let tasks: Vec<_> = chunk
            .iter()
            .map(|&signature| {
                let client = client.clone();
                async move {
                    let result = client.get_parsed_transaction(&signature).await;
                    (signature, result)
                }
            })
            .collect();
        fetched.extend(runner.run(tasks).await);
    }
    fetched
}

/// Batch fetch with per-chunk progress logging and a warning for every
/// signature that resolved to nothing, used for the submitted signatures
pub async fn get_parsed_transactions(
    client: Arc<SolanaClient>,
    runner: &TaskRunner,
    signatures: &[Signature],
) -> Vec<FetchedTransaction> {
    let total = signatures.len();
    let mut fetched = Vec::with_capacity(total);

    for chunk in signatures.chunks(TRANSACTION_FETCH_CHUNK_SIZE) {
        fetched.extend(fetch_chunked(client.clone(), runner, chunk).await);
        info!("Read {} of {} initial transactions.", fetched.len(), total);
    }

    for (signature, result) in &fetched {
        match result {
            Ok(None) => warn!("Transaction not found: {}", signature),
            Err(e) => warn!("Failed to fetch transaction {}: {}", signature, e),
            Ok(Some(_)) => {}
        }
    }

    fetched
}
