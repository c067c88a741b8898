use thiserror::Error;

/// Failures surfaced by external collaborators (RPC, HTTP APIs).
///
/// Transient variants are retried by the callers before they surface here;
/// once one of these reaches a position it degrades that position's quality
/// flags instead of aborting the run.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited by upstream provider")]
    RateLimited,
    #[error("rpc error: {0}")]
    Rpc(String),
}

/// Data-integrity problems found while classifying a transaction.
///
/// These are logged and the offending transaction skipped; they never abort
/// the run.
#[derive(Debug, Clone, Error)]
pub enum ClassifyError {
    #[error(
        "instruction {instruction} in {signature} expects at least {expected} accounts but lists {actual}"
    )]
    AccountListTooShort {
        signature: String,
        instruction: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("transaction {signature} touches unknown pair {lb_pair}")]
    UnknownPair { signature: String, lb_pair: String },
}
