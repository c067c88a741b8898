use serde::Serialize;
use std::collections::HashMap;

/// The economic action a DLMM instruction performs against a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Open,
    Deposit,
    Withdraw,
    FeeClaim,
    RewardClaim,
    Close,
}

/// One economic action against a position, produced from chain data.
///
/// Amounts are UI-unit magnitudes (decimal-adjusted, positive); the
/// negative-of-wallet-delta convention means a deposit's outflow from the
/// wallet is recorded as a positive deposit amount. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    pub kind: EventKind,
    /// Position account the instruction referenced
    pub position: String,
    /// Pool (LbPair) the position belongs to
    pub lb_pair: String,
    /// Wallet behind the instruction, when the account layout exposes it
    pub sender: Option<String>,
    pub token_x_amount: f64,
    pub token_y_amount: f64,
    /// Reward mint -> claimed amount
    pub reward_amounts: HashMap<String, f64>,
    pub timestamp_ms: i64,
    pub slot: u64,
    pub source_signature: String,
}

impl PositionEvent {
    pub fn new(
        kind: EventKind,
        position: String,
        lb_pair: String,
        timestamp_ms: i64,
        slot: u64,
        source_signature: String,
    ) -> Self {
        Self {
            kind,
            position,
            lb_pair,
            sender: None,
            token_x_amount: 0.0,
            token_y_amount: 0.0,
            reward_amounts: HashMap::new(),
            timestamp_ms,
            slot,
            source_signature,
        }
    }
}
