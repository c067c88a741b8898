use anyhow::{Context, Result};
use log::info;
use std::io::Write;

use crate::models::{Position, PositionOutcome, Submission, ValidityVerdict};
use crate::report::evaluator::{quote_profit_percent, usd_profit_percent};
use crate::utils::ms_to_iso;

/// Derived columns appended after the original submission columns, in the
/// reference report's order. The set is fixed: a row whose position could
/// not be resolved emits the same columns with empty cells so downstream
/// spreadsheets stay aligned.
pub const DERIVED_HEADERS: [&str; 87] = [
    "usdDepositAmount",
    "usdProfitPercent",
    "quoteProfitPercent",
    "openDate",
    "closeDate",
    "validProfitPercent",
    "validDate",
    "validTimeOpen",
    "validUsdAmount",
    "validWallet",
    "validSubmission",
    "position",
    "lbPair",
    "sender",
    "pairName",
    "mintX",
    "mintY",
    "mintXDecimals",
    "mintYDecimals",
    "reward1Mint",
    "reward2Mint",
    "symbolX",
    "symbolY",
    "symbolReward1",
    "symbolReward2",
    "isClosed",
    "isHawksight",
    "transactions",
    "transactionCount",
    "openTimestampMs",
    "closeTimestampMs",
    "totalXDeposits",
    "totalYDeposits",
    "usdTotalXDeposits",
    "usdTotalYDeposits",
    "totalOpenXBalance",
    "totalOpenYBalance",
    "usdTotalOpenXBalance",
    "usdTotalOpenYBalance",
    "depositCount",
    "totalXWithdraws",
    "totalYWithdraws",
    "usdTotalXWithdraws",
    "usdTotalYWithdraws",
    "withdrawCount",
    "netXDepositsAndWithdraws",
    "netYDepositsAndWithdraws",
    "totalClaimedXFees",
    "totalClaimedYFees",
    "totalClaimedFeesValue",
    "usdClaimedXFees",
    "usdClaimedYFees",
    "totalUnclaimedXFees",
    "totalUnclaimedYFees",
    "usdTotalUnclaimedXFees",
    "usdTotalUnclaimedYFees",
    "totalXFees",
    "totalYFees",
    "usdTotalXFees",
    "usdTotalYFees",
    "feeClaimCount",
    "totalReward1",
    "totalReward2",
    "usdTotalReward1",
    "usdTotalReward2",
    "rewardClaimCount",
    "inverted",
    "isOneSided",
    "hasNoIl",
    "hasNoFees",
    "depositsValue",
    "hasApiError",
    "usdDepositsValue",
    "withdrawsValue",
    "usdWithdrawsValue",
    "netDepositsAndWithdrawsValue",
    "usdNetDepositsAndWithdrawsValue",
    "openBalanceValue",
    "claimedFeesValue",
    "unclaimedFeesValue",
    "totalFeesValue",
    "profitLossValue",
    "usdOpenBalanceValue",
    "usdClaimedFeesValue",
    "usdUnclaimedFeesValue",
    "usdTotalFeesValue",
    "usdProfitLossValue",
];

/// One assembled output row
pub struct ReportRow<'a> {
    pub submission: &'a Submission,
    pub outcome: &'a PositionOutcome,
    pub verdict: Option<ValidityVerdict>,
}

fn float(value: f64) -> String {
    value.to_string()
}

fn opt_float(value: Option<f64>) -> String {
    value.map(float).unwrap_or_default()
}

fn boolean(value: bool) -> String {
    value.to_string()
}

fn opt_str(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// The derived cells for one row, aligned 1:1 with `DERIVED_HEADERS`
fn derived_cells(row: &ReportRow) -> Vec<String> {
    let Some(position) = row.outcome.position() else {
        return vec![String::new(); DERIVED_HEADERS.len()];
    };
    let usd = position.usd.as_ref();
    let verdict = row.verdict.unwrap_or_default();

    let mut cells = Vec::with_capacity(DERIVED_HEADERS.len());

    // Summary block
    cells.push(opt_float(usd.map(|u| u.deposits_value)));
    cells.push(opt_float(usd_profit_percent(position)));
    cells.push(opt_float(quote_profit_percent(position)));
    cells.push(ms_to_iso(position.open_timestamp_ms));
    cells.push(
        position
            .close_timestamp_ms
            .map(ms_to_iso)
            .unwrap_or_default(),
    );
    cells.push(boolean(verdict.valid_profit_percent));
    cells.push(boolean(verdict.valid_date));
    cells.push(boolean(verdict.valid_time_open));
    cells.push(boolean(verdict.valid_usd_amount));
    cells.push(boolean(verdict.valid_wallet));
    cells.push(boolean(verdict.valid_submission));

    // Identity
    cells.push(position.address.clone());
    cells.push(position.lb_pair.clone());
    cells.push(position.sender.clone());
    cells.push(position.pair_name.clone());
    cells.push(position.mint_x.clone());
    cells.push(position.mint_y.clone());
    cells.push(position.mint_x_decimals.to_string());
    cells.push(position.mint_y_decimals.to_string());
    cells.push(opt_str(&position.reward_1_mint));
    cells.push(opt_str(&position.reward_2_mint));
    cells.push(position.symbol_x.clone());
    cells.push(position.symbol_y.clone());
    cells.push(opt_str(&position.symbol_reward_1));
    cells.push(opt_str(&position.symbol_reward_2));
    cells.push(boolean(position.is_closed));
    cells.push(boolean(position.is_hawksight));
    cells.push(transactions_cell(position));
    cells.push(position.transaction_count.to_string());
    cells.push(position.open_timestamp_ms.to_string());
    cells.push(
        position
            .close_timestamp_ms
            .map(|ms| ms.to_string())
            .unwrap_or_default(),
    );

    // Per-side totals, native and USD interleaved as in the reference
    cells.push(float(position.total_x_deposits));
    cells.push(float(position.total_y_deposits));
    cells.push(opt_float(usd.map(|u| u.total_x_deposits)));
    cells.push(opt_float(usd.map(|u| u.total_y_deposits)));
    cells.push(float(position.total_open_x_balance));
    cells.push(float(position.total_open_y_balance));
    cells.push(opt_float(usd.map(|u| u.total_open_x_balance)));
    cells.push(opt_float(usd.map(|u| u.total_open_y_balance)));
    cells.push(position.deposit_count.to_string());
    cells.push(float(position.total_x_withdraws));
    cells.push(float(position.total_y_withdraws));
    cells.push(opt_float(usd.map(|u| u.total_x_withdraws)));
    cells.push(opt_float(usd.map(|u| u.total_y_withdraws)));
    cells.push(position.withdraw_count.to_string());
    cells.push(float(position.net_x_deposits_and_withdraws));
    cells.push(float(position.net_y_deposits_and_withdraws));
    cells.push(float(position.total_claimed_x_fees));
    cells.push(float(position.total_claimed_y_fees));
    cells.push(float(position.claimed_fees_value));
    cells.push(opt_float(usd.map(|u| u.claimed_x_fees)));
    cells.push(opt_float(usd.map(|u| u.claimed_y_fees)));
    cells.push(float(position.total_unclaimed_x_fees));
    cells.push(float(position.total_unclaimed_y_fees));
    cells.push(opt_float(usd.map(|u| u.total_unclaimed_x_fees)));
    cells.push(opt_float(usd.map(|u| u.total_unclaimed_y_fees)));
    cells.push(float(position.total_x_fees));
    cells.push(float(position.total_y_fees));
    cells.push(opt_float(usd.map(|u| u.total_x_fees)));
    cells.push(opt_float(usd.map(|u| u.total_y_fees)));
    cells.push(position.fee_claim_count.to_string());
    cells.push(float(position.total_reward_1));
    cells.push(float(position.total_reward_2));
    cells.push(opt_float(usd.map(|u| u.total_reward_1)));
    cells.push(opt_float(usd.map(|u| u.total_reward_2)));
    cells.push(position.reward_claim_count.to_string());

    // Flags
    cells.push(boolean(position.inverted));
    cells.push(boolean(position.is_one_sided));
    cells.push(boolean(position.has_no_il));
    cells.push(boolean(position.has_no_fees));

    // Aggregate values
    cells.push(float(position.deposits_value));
    cells.push(boolean(position.has_api_error));
    cells.push(opt_float(usd.map(|u| u.deposits_value)));
    cells.push(float(position.withdraws_value));
    cells.push(opt_float(usd.map(|u| u.withdraws_value)));
    cells.push(float(position.net_deposits_and_withdraws_value));
    cells.push(opt_float(usd.map(|u| u.net_deposits_and_withdraws_value)));
    cells.push(float(position.open_balance_value));
    cells.push(float(position.claimed_fees_value));
    cells.push(float(position.unclaimed_fees_value));
    cells.push(float(position.total_fees_value));
    cells.push(float(position.profit_loss_value));
    cells.push(opt_float(usd.map(|u| u.open_balance_value)));
    cells.push(opt_float(usd.map(|u| u.claimed_fees_value)));
    cells.push(opt_float(usd.map(|u| u.unclaimed_fees_value)));
    cells.push(opt_float(usd.map(|u| u.total_fees_value)));
    cells.push(opt_float(usd.map(|u| u.profit_loss_value)));

    cells
}

/// The position's event signatures as a JSON array, one cell
fn transactions_cell(position: &Position) -> String {
    let signatures: Vec<&str> = position
        .events
        .iter()
        .map(|event| event.source_signature.as_str())
        .collect();
    serde_json::to_string(&signatures).unwrap_or_default()
}

/// Write the full report: original submission columns first, then the
/// fixed derived column set
pub fn write_report<W: Write>(
    writer: W,
    original_headers: &[String],
    rows: &[ReportRow],
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header_record: Vec<&str> = original_headers.iter().map(String::as_str).collect();
    header_record.extend(DERIVED_HEADERS);
    csv_writer
        .write_record(&header_record)
        .context("Failed to write report header")?;

    for row in rows {
        let mut record: Vec<String> = row.submission.cells.clone();
        record.resize(original_headers.len(), String::new());
        record.extend(derived_cells(row));
        csv_writer
            .write_record(&record)
            .context("Failed to write report row")?;
    }

    csv_writer.flush().context("Failed to flush report")?;
    info!("Wrote {} report row(s)", rows.len());
    Ok(())
}
