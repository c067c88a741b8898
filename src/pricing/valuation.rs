use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::{EventKind, Position, UsdValues};
use crate::pricing::oracle::PriceOracle;
use crate::throttle::TaskRunner;

/// Resolved quotes for one valuation batch
type PriceBook = HashMap<(String, i64), Option<f64>>;

/// Overlays historical USD valuations onto reconstructed positions.
///
/// Every distinct `(mint, timestamp)` needed by the batch is looked up
/// exactly once, with concurrency bounded by the task runner. Pricing is
/// all-or-nothing per position: a single missing quote leaves the whole
/// USD overlay empty and flags the position, because a partially summed
/// USD aggregate would be silently misleading.
pub struct UsdValuationEngine {
    oracle: Arc<dyn PriceOracle>,
    runner: TaskRunner,
}

impl UsdValuationEngine {
    pub fn new(oracle: Arc<dyn PriceOracle>, runner: TaskRunner) -> Self {
        Self { oracle, runner }
    }

    /// Value a batch of positions, pricing event amounts at their event
    /// time and open balances at `report_timestamp_ms`
    pub async fn value_positions(
        &self,
        mut positions: Vec<Position>,
        report_timestamp_ms: i64,
    ) -> Vec<Position> {
        let mut requests: HashSet<(String, i64)> = HashSet::new();
        for position in &positions {
            if !position.has_api_error {
                collect_quote_requests(position, report_timestamp_ms, &mut requests);
            }
        }

        info!("Resolving {} distinct price quotes...", requests.len());
        let book = self.resolve_quotes(requests).await;

        let mut unpriced = 0usize;
        for position in &mut positions {
            if position.has_api_error {
                continue;
            }
            match compute_overlay(position, &book, report_timestamp_ms) {
                Some(usd) => position.usd = Some(usd),
                None => {
                    warn!(
                        "Incomplete price data for position {}, leaving USD values empty",
                        position.address
                    );
                    position.has_api_error = true;
                    unpriced += 1;
                }
            }
        }
        if unpriced > 0 {
            info!("{} position(s) could not be fully priced", unpriced);
        }
        positions
    }

    async fn resolve_quotes(&self, requests: HashSet<(String, i64)>) -> PriceBook {
        let tasks: Vec<_> = requests
            .into_iter()
            .map(|(mint, timestamp_ms)| {
                let oracle = self.oracle.clone();
                async move {
                    let quote = match oracle.price_at(&mint, timestamp_ms).await {
                        Ok(quote) => quote,
                        Err(_) => None,
                    };
                    ((mint, timestamp_ms), quote)
                }
            })
            .collect();

        self.runner.run(tasks).await.into_iter().collect()
    }
}

/// Every quote the overlay computation below will ask for.
///
/// Kept strictly in sync with `compute_overlay`: deposits, withdrawals and
/// fee claims price at their event time, rewards at claim time, the open
/// balance and unclaimed fees of a still-open position at report time.
fn collect_quote_requests(
    position: &Position,
    report_timestamp_ms: i64,
    requests: &mut HashSet<(String, i64)>,
) {
    for event in &position.events {
        if matches!(event.kind, EventKind::Open | EventKind::Close) {
            continue;
        }
        if event.token_x_amount != 0.0 {
            requests.insert((position.mint_x.clone(), event.timestamp_ms));
        }
        if event.token_y_amount != 0.0 {
            requests.insert((position.mint_y.clone(), event.timestamp_ms));
        }
        for (mint, amount) in &event.reward_amounts {
            if *amount != 0.0 {
                requests.insert((mint.clone(), event.timestamp_ms));
            }
        }
    }
    if position.total_open_x_balance != 0.0 || position.total_unclaimed_x_fees != 0.0 {
        requests.insert((position.mint_x.clone(), report_timestamp_ms));
    }
    if position.total_open_y_balance != 0.0 || position.total_unclaimed_y_fees != 0.0 {
        requests.insert((position.mint_y.clone(), report_timestamp_ms));
    }
}

/// Project the position's native totals into USD, or `None` as soon as any
/// required quote is missing
fn compute_overlay(
    position: &Position,
    book: &PriceBook,
    report_timestamp_ms: i64,
) -> Option<UsdValues> {
    if position.events.is_empty() || position.mint_x.is_empty() || position.mint_y.is_empty() {
        return None;
    }

    let price = |mint: &str, timestamp_ms: i64| -> Option<f64> {
        book.get(&(mint.to_string(), timestamp_ms)).copied().flatten()
    };

    let mut usd = UsdValues::default();
    for event in &position.events {
        if matches!(event.kind, EventKind::Open | EventKind::Close) {
            continue;
        }
        let usd_x = if event.token_x_amount != 0.0 {
            event.token_x_amount * price(&position.mint_x, event.timestamp_ms)?
        } else {
            0.0
        };
        let usd_y = if event.token_y_amount != 0.0 {
            event.token_y_amount * price(&position.mint_y, event.timestamp_ms)?
        } else {
            0.0
        };

        match event.kind {
            EventKind::Deposit => {
                usd.total_x_deposits += usd_x;
                usd.total_y_deposits += usd_y;
            }
            EventKind::Withdraw => {
                usd.total_x_withdraws += usd_x;
                usd.total_y_withdraws += usd_y;
            }
            EventKind::FeeClaim => {
                usd.claimed_x_fees += usd_x;
                usd.claimed_y_fees += usd_y;
            }
            EventKind::RewardClaim => {
                for (mint, amount) in &event.reward_amounts {
                    if *amount == 0.0 {
                        continue;
                    }
                    let value = amount * price(mint, event.timestamp_ms)?;
                    if position.reward_1_mint.as_deref() == Some(mint.as_str()) {
                        usd.total_reward_1 += value;
                    } else if position.reward_2_mint.as_deref() == Some(mint.as_str()) {
                        usd.total_reward_2 += value;
                    }
                }
            }
            EventKind::Open | EventKind::Close => {}
        }
    }

    if position.total_open_x_balance != 0.0 {
        usd.total_open_x_balance =
            position.total_open_x_balance * price(&position.mint_x, report_timestamp_ms)?;
    }
    if position.total_open_y_balance != 0.0 {
        usd.total_open_y_balance =
            position.total_open_y_balance * price(&position.mint_y, report_timestamp_ms)?;
    }
    if position.total_unclaimed_x_fees != 0.0 {
        usd.total_unclaimed_x_fees =
            position.total_unclaimed_x_fees * price(&position.mint_x, report_timestamp_ms)?;
    }
    if position.total_unclaimed_y_fees != 0.0 {
        usd.total_unclaimed_y_fees =
            position.total_unclaimed_y_fees * price(&position.mint_y, report_timestamp_ms)?;
    }

    usd.total_x_fees = usd.claimed_x_fees + usd.total_unclaimed_x_fees;
    usd.total_y_fees = usd.claimed_y_fees + usd.total_unclaimed_y_fees;
    usd.deposits_value = usd.total_x_deposits + usd.total_y_deposits;
    usd.withdraws_value = usd.total_x_withdraws + usd.total_y_withdraws;
    usd.net_deposits_and_withdraws_value = usd.deposits_value - usd.withdraws_value;
    usd.open_balance_value = usd.total_open_x_balance + usd.total_open_y_balance;
    usd.claimed_fees_value = usd.claimed_x_fees + usd.claimed_y_fees;
    usd.unclaimed_fees_value = usd.total_unclaimed_x_fees + usd.total_unclaimed_y_fees;
    usd.total_fees_value = usd.claimed_fees_value + usd.unclaimed_fees_value;
    usd.profit_loss_value = -(usd.net_deposits_and_withdraws_value + usd.open_balance_value);

    Some(usd)
}
