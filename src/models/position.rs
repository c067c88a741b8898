use serde::Serialize;

use crate::models::event::PositionEvent;

/// USD overlay for a position.
///
/// Grouped into its own struct so the all-or-nothing pricing rule is a type
/// invariant: either every USD figure exists (`Some(UsdValues)`) or none do.
/// Signs mirror the native fields they project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdValues {
    pub total_x_deposits: f64,
    pub total_y_deposits: f64,
    pub total_x_withdraws: f64,
    pub total_y_withdraws: f64,
    pub total_open_x_balance: f64,
    pub total_open_y_balance: f64,
    pub claimed_x_fees: f64,
    pub claimed_y_fees: f64,
    pub total_unclaimed_x_fees: f64,
    pub total_unclaimed_y_fees: f64,
    pub total_x_fees: f64,
    pub total_y_fees: f64,
    pub total_reward_1: f64,
    pub total_reward_2: f64,
    pub deposits_value: f64,
    pub withdraws_value: f64,
    pub net_deposits_and_withdraws_value: f64,
    pub open_balance_value: f64,
    pub claimed_fees_value: f64,
    pub unclaimed_fees_value: f64,
    pub total_fees_value: f64,
    pub profit_loss_value: f64,
}

/// Canonical financial record of one LP position, built by folding its
/// on-chain events in chronological order.
///
/// Native-unit totals are ground truth and always populated once at least
/// one event folded; the USD overlay is a best-effort projection. Deposits
/// and withdrawals are positive magnitudes; the open balance carries the
/// negative of the current holdings so
/// `profit_loss_value = -(net + open_balance)` holds for open and closed
/// positions alike, with a positive result denoting investor loss.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    // Identity
    pub address: String,
    pub lb_pair: String,
    pub sender: String,
    pub pair_name: String,
    pub mint_x: String,
    pub mint_y: String,
    pub mint_x_decimals: u8,
    pub mint_y_decimals: u8,
    pub reward_1_mint: Option<String>,
    pub reward_2_mint: Option<String>,
    pub symbol_x: String,
    pub symbol_y: String,
    pub symbol_reward_1: Option<String>,
    pub symbol_reward_2: Option<String>,

    // Flags
    pub is_closed: bool,
    pub is_hawksight: bool,
    pub inverted: bool,
    pub is_one_sided: bool,
    pub has_no_il: bool,
    pub has_no_fees: bool,
    pub has_api_error: bool,

    // Temporal
    pub open_timestamp_ms: i64,
    pub close_timestamp_ms: Option<i64>,
    pub transaction_count: usize,

    // Per-side totals (native UI units)
    pub total_x_deposits: f64,
    pub total_y_deposits: f64,
    pub deposit_count: usize,
    pub total_x_withdraws: f64,
    pub total_y_withdraws: f64,
    pub withdraw_count: usize,
    pub net_x_deposits_and_withdraws: f64,
    pub net_y_deposits_and_withdraws: f64,
    pub total_open_x_balance: f64,
    pub total_open_y_balance: f64,
    pub total_claimed_x_fees: f64,
    pub total_claimed_y_fees: f64,
    pub total_unclaimed_x_fees: f64,
    pub total_unclaimed_y_fees: f64,
    pub total_x_fees: f64,
    pub total_y_fees: f64,
    pub fee_claim_count: usize,
    pub total_reward_1: f64,
    pub total_reward_2: f64,
    pub reward_claim_count: usize,

    // Aggregate values (native UI units)
    pub deposits_value: f64,
    pub withdraws_value: f64,
    pub net_deposits_and_withdraws_value: f64,
    pub open_balance_value: f64,
    pub claimed_fees_value: f64,
    pub unclaimed_fees_value: f64,
    pub total_fees_value: f64,
    pub profit_loss_value: f64,

    /// USD overlay, present only when every contributing quote resolved
    pub usd: Option<UsdValues>,

    /// The folded event history, kept for valuation and the report
    #[serde(skip)]
    pub events: Vec<PositionEvent>,
}

impl Position {
    /// Create an empty record for a newly discovered position address
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Empty record marking a position whose history could not be fetched
    pub fn unresolved(address: &str) -> Self {
        Self {
            address: address.to_string(),
            has_api_error: true,
            ..Default::default()
        }
    }
}
