use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::dlmm::{DlmmApiClient, PairRegistry, TokenDirectory, UnclaimedFees};
use crate::models::{EventKind, Position, PositionEvent};
use crate::position::history::TransactionHistory;

/// Residual balances below this many UI units are treated as dust when
/// deriving the composition flags
const DUST_EPSILON: f64 = 1e-6;

/// Folds a position's chronological event history into its canonical
/// financial record, resolving pair and token metadata from the
/// directories loaded at the start of the run.
pub struct PositionReconstructor {
    registry: Arc<PairRegistry>,
    tokens: Arc<TokenDirectory>,
}

impl PositionReconstructor {
    pub fn new(registry: Arc<PairRegistry>, tokens: Arc<TokenDirectory>) -> Self {
        Self { registry, tokens }
    }

    /// Retrieve the position's full history and fold it.
    ///
    /// A history fetch failure degrades the result to a flagged partial
    /// record rather than an error: whatever prefix of the event stream was
    /// recovered is folded and `has_api_error` is set. Still-open positions
    /// get their unclaimed fees from a point-in-time balance query.
    pub async fn reconstruct(
        &self,
        address: &str,
        history: &dyn TransactionHistory,
        api: &DlmmApiClient,
    ) -> Position {
        let (events, mut api_error) = match history.fetch_history(address).await {
            Ok(events) => (events, false),
            Err(failure) => {
                warn!(
                    "History fetch for {} failed ({}), keeping {} folded event(s)",
                    address,
                    failure.error,
                    failure.partial.len()
                );
                (failure.partial, true)
            }
        };

        let mut position = self.fold(address, &events, UnclaimedFees::default());

        if !position.is_closed && !api_error && !events.is_empty() {
            match api.position_unclaimed_fees(address).await {
                Ok(unclaimed) => {
                    position = self.fold(address, &events, unclaimed);
                }
                Err(e) => {
                    warn!("Unclaimed fee lookup for {} failed: {}", address, e);
                    api_error = true;
                }
            }
        }

        if api_error {
            position.has_api_error = true;
        }
        position
    }

    /// Pure fold of an ordered event sequence into a `Position`.
    ///
    /// Events must already be in chronological (slot) order; later events
    /// depend on the running totals. Folding the same sequence twice yields
    /// an identical record.
    pub fn fold(&self, address: &str, events: &[PositionEvent], unclaimed: UnclaimedFees) -> Position {
        if events.is_empty() {
            return Position::unresolved(address);
        }

        let mut position = Position::new(address);
        let mut signatures: HashSet<&str> = HashSet::new();

        for event in events {
            signatures.insert(event.source_signature.as_str());
            if position.lb_pair.is_empty() {
                position.lb_pair = event.lb_pair.clone();
            }
            if position.open_timestamp_ms == 0 {
                position.open_timestamp_ms = event.timestamp_ms;
            }

            match event.kind {
                EventKind::Open => {
                    position.open_timestamp_ms = event.timestamp_ms;
                    if let Some(sender) = &event.sender {
                        position.sender = sender.clone();
                    }
                }
                EventKind::Deposit => {
                    position.total_x_deposits += event.token_x_amount;
                    position.total_y_deposits += event.token_y_amount;
                    position.deposit_count += 1;
                }
                EventKind::Withdraw => {
                    position.total_x_withdraws += event.token_x_amount;
                    position.total_y_withdraws += event.token_y_amount;
                    position.withdraw_count += 1;
                }
                EventKind::FeeClaim => {
                    position.total_claimed_x_fees += event.token_x_amount;
                    position.total_claimed_y_fees += event.token_y_amount;
                    position.fee_claim_count += 1;
                }
                EventKind::RewardClaim => {
                    self.accumulate_rewards(&mut position, event);
                    position.reward_claim_count += 1;
                }
                EventKind::Close => {
                    position.close_timestamp_ms = Some(event.timestamp_ms);
                    position.is_closed = true;
                }
            }
        }

        position.transaction_count = signatures.len();
        position.events = events.to_vec();
        self.resolve_identity(&mut position);
        finalize(&mut position, unclaimed);
        debug!(
            "Folded {} event(s) into position {} ({} transactions)",
            events.len(),
            address,
            position.transaction_count
        );
        position
    }

    /// Map a reward-claim event's mint-keyed amounts onto the pair's
    /// reward slots
    fn accumulate_rewards(&self, position: &mut Position, event: &PositionEvent) {
        let Some(pair) = self.registry.get(&event.lb_pair) else {
            return;
        };
        let reward_mints = pair.reward_mints();
        for (mint, amount) in &event.reward_amounts {
            match reward_mints.iter().position(|m| m == mint) {
                Some(0) => position.total_reward_1 += amount,
                Some(1) => position.total_reward_2 += amount,
                _ => {}
            }
        }
    }

    /// Fill the identity fields from the pair registry and token directory
    fn resolve_identity(&self, position: &mut Position) {
        let Some(pair) = self.registry.get(&position.lb_pair) else {
            warn!(
                "Pair {} for position {} is not in the registry",
                position.lb_pair, position.address
            );
            position.has_api_error = true;
            return;
        };

        position.pair_name = pair.name.clone();
        position.mint_x = pair.mint_x.clone();
        position.mint_y = pair.mint_y.clone();
        position.mint_x_decimals = self.tokens.decimals(&pair.mint_x).unwrap_or(0);
        position.mint_y_decimals = self.tokens.decimals(&pair.mint_y).unwrap_or(0);
        position.symbol_x = self.tokens.symbol(&pair.mint_x);
        position.symbol_y = self.tokens.symbol(&pair.mint_y);
        position.inverted = pair.is_inverted();

        let reward_mints = pair.reward_mints();
        position.reward_1_mint = reward_mints.first().map(|m| m.to_string());
        position.reward_2_mint = reward_mints.get(1).map(|m| m.to_string());
        position.symbol_reward_1 = position
            .reward_1_mint
            .as_deref()
            .map(|mint| self.tokens.symbol(mint));
        position.symbol_reward_2 = position
            .reward_2_mint
            .as_deref()
            .map(|mint| self.tokens.symbol(mint));
    }
}

/// Derive the totals, values, and composition flags once the raw
/// per-side sums are in place
fn finalize(position: &mut Position, unclaimed: UnclaimedFees) {
    position.net_x_deposits_and_withdraws =
        position.total_x_deposits - position.total_x_withdraws;
    position.net_y_deposits_and_withdraws =
        position.total_y_deposits - position.total_y_withdraws;

    // A closed position left nothing behind; anything remaining on an open
    // position is carried as the negative of the holdings so the
    // profit/loss identity below holds in both states.
    if position.is_closed {
        position.total_open_x_balance = 0.0;
        position.total_open_y_balance = 0.0;
        position.total_unclaimed_x_fees = 0.0;
        position.total_unclaimed_y_fees = 0.0;
    } else {
        position.total_open_x_balance = -position.net_x_deposits_and_withdraws;
        position.total_open_y_balance = -position.net_y_deposits_and_withdraws;
        position.total_unclaimed_x_fees = unclaimed.x;
        position.total_unclaimed_y_fees = unclaimed.y;
    }

    position.total_x_fees = position.total_claimed_x_fees + position.total_unclaimed_x_fees;
    position.total_y_fees = position.total_claimed_y_fees + position.total_unclaimed_y_fees;

    position.deposits_value = position.total_x_deposits + position.total_y_deposits;
    position.withdraws_value = position.total_x_withdraws + position.total_y_withdraws;
    position.net_deposits_and_withdraws_value =
        position.deposits_value - position.withdraws_value;
    position.open_balance_value = position.total_open_x_balance + position.total_open_y_balance;
    position.claimed_fees_value = position.total_claimed_x_fees + position.total_claimed_y_fees;
    position.unclaimed_fees_value =
        position.total_unclaimed_x_fees + position.total_unclaimed_y_fees;
    position.total_fees_value = position.claimed_fees_value + position.unclaimed_fees_value;
    position.profit_loss_value =
        -(position.net_deposits_and_withdraws_value + position.open_balance_value);

    position.is_one_sided = position.deposits_value > 0.0
        && (position.total_x_deposits == 0.0 || position.total_y_deposits == 0.0);
    position.has_no_fees =
        position.total_x_fees.abs() < DUST_EPSILON && position.total_y_fees.abs() < DUST_EPSILON;
    position.has_no_il = position.is_closed
        && position.net_x_deposits_and_withdraws.abs() < DUST_EPSILON
        && position.net_y_deposits_and_withdraws.abs() < DUST_EPSILON;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlmm::testutil::{registry_fixture, LB_PAIR, REWARD_MINT};
    use crate::models::EventKind;
    use crate::position::history::HistoryError;
    use async_trait::async_trait;

    fn reconstructor() -> PositionReconstructor {
        PositionReconstructor::new(
            Arc::new(registry_fixture()),
            Arc::new(crate::dlmm::TokenDirectory::default()),
        )
    }

    fn event(kind: EventKind, x: f64, y: f64, ts: i64) -> PositionEvent {
        let mut event = PositionEvent::new(
            kind,
            "position-1".to_string(),
            LB_PAIR.to_string(),
            ts,
            ts as u64,
            format!("sig-{:?}-{}", kind, ts),
        );
        event.token_x_amount = x;
        event.token_y_amount = y;
        event
    }

    fn open_event(ts: i64) -> PositionEvent {
        let mut e = event(EventKind::Open, 0.0, 0.0, ts);
        e.sender = Some("owner-wallet".to_string());
        e
    }

    #[test]
    fn deposit_withdraw_close_scenario() {
        // One deposit of 100 X, one withdrawal of 110 X, closed.
        let events = vec![
            open_event(1_000),
            event(EventKind::Deposit, 100.0, 0.0, 2_000),
            event(EventKind::Withdraw, 110.0, 0.0, 3_000),
            event(EventKind::Close, 0.0, 0.0, 3_000),
        ];
        let position = reconstructor().fold("position-1", &events, UnclaimedFees::default());

        assert_eq!(position.deposits_value, 100.0);
        assert_eq!(position.withdraws_value, 110.0);
        assert_eq!(position.net_deposits_and_withdraws_value, -10.0);
        assert_eq!(position.open_balance_value, 0.0);
        assert_eq!(position.profit_loss_value, 10.0);
        assert!(position.is_closed);
        assert!(!position.has_api_error);
        assert_eq!(position.sender, "owner-wallet");
        assert_eq!(position.open_timestamp_ms, 1_000);
        assert_eq!(position.close_timestamp_ms, Some(3_000));
        assert_eq!(position.transaction_count, 4);
        assert!(position.is_one_sided);
    }

    #[test]
    fn folding_twice_is_idempotent() {
        let events = vec![
            open_event(1_000),
            event(EventKind::Deposit, 50.0, 25.0, 2_000),
            event(EventKind::FeeClaim, 0.5, 0.25, 3_000),
            event(EventKind::Withdraw, 50.0, 25.0, 4_000),
            event(EventKind::Close, 0.0, 0.0, 4_000),
        ];
        let r = reconstructor();
        let first = r.fold("position-1", &events, UnclaimedFees::default());
        let second = r.fold("position-1", &events, UnclaimedFees::default());
        assert_eq!(first, second);
    }

    #[test]
    fn fee_totals_are_claimed_plus_unclaimed() {
        let events = vec![
            open_event(1_000),
            event(EventKind::Deposit, 10.0, 10.0, 2_000),
            event(EventKind::FeeClaim, 1.0, 2.0, 3_000),
        ];
        let unclaimed = UnclaimedFees { x: 0.5, y: 0.25 };
        let position = reconstructor().fold("position-1", &events, unclaimed);

        assert_eq!(position.claimed_fees_value, 3.0);
        assert_eq!(position.unclaimed_fees_value, 0.75);
        assert_eq!(
            position.total_fees_value,
            position.claimed_fees_value + position.unclaimed_fees_value
        );
        assert!(!position.has_no_fees);
    }

    #[test]
    fn open_position_carries_negative_holdings() {
        let events = vec![open_event(1_000), event(EventKind::Deposit, 100.0, 0.0, 2_000)];
        let position = reconstructor().fold("position-1", &events, UnclaimedFees::default());

        assert!(!position.is_closed);
        assert_eq!(position.total_open_x_balance, -100.0);
        assert_eq!(position.open_balance_value, -100.0);
        // Nothing withdrawn yet and no fees: economically flat.
        assert_eq!(position.profit_loss_value, 0.0);
    }

    #[test]
    fn balanced_closed_position_has_no_il() {
        let events = vec![
            open_event(1_000),
            event(EventKind::Deposit, 40.0, 60.0, 2_000),
            event(EventKind::Withdraw, 40.0, 60.0, 3_000),
            event(EventKind::Close, 0.0, 0.0, 3_000),
        ];
        let position = reconstructor().fold("position-1", &events, UnclaimedFees::default());
        assert!(position.has_no_il);
        assert!(position.has_no_fees);
        assert!(!position.is_one_sided);
    }

    #[test]
    fn reward_claims_map_to_pair_reward_slots() {
        let mut claim = event(EventKind::RewardClaim, 0.0, 0.0, 3_000);
        claim
            .reward_amounts
            .insert(REWARD_MINT.to_string(), 12.5);
        let events = vec![open_event(1_000), claim];
        let position = reconstructor().fold("position-1", &events, UnclaimedFees::default());

        assert_eq!(position.total_reward_1, 12.5);
        assert_eq!(position.total_reward_2, 0.0);
        assert_eq!(position.reward_claim_count, 1);
        assert_eq!(position.reward_1_mint.as_deref(), Some(REWARD_MINT));
    }

    #[test]
    fn empty_history_is_unresolved() {
        let position = reconstructor().fold("position-1", &[], UnclaimedFees::default());
        assert!(position.has_api_error);
        assert_eq!(position.deposits_value, 0.0);
    }

    struct FailingHistory {
        partial: Vec<PositionEvent>,
    }

    #[async_trait]
    impl TransactionHistory for FailingHistory {
        async fn fetch_history(&self, _address: &str) -> Result<Vec<PositionEvent>, HistoryError> {
            Err(HistoryError {
                error: crate::errors::FetchError::RateLimited,
                partial: self.partial.clone(),
            })
        }
    }

    #[tokio::test]
    async fn fetch_failure_keeps_partial_totals_and_flags() {
        let history = FailingHistory {
            partial: vec![
                open_event(1_000),
                event(EventKind::Deposit, 100.0, 0.0, 2_000),
                event(EventKind::Withdraw, 110.0, 0.0, 3_000),
                event(EventKind::Close, 0.0, 0.0, 3_000),
            ],
        };
        let api = DlmmApiClient::new("http://localhost:0", "http://localhost:0");
        let position = reconstructor()
            .reconstruct("position-1", &history, &api)
            .await;

        assert!(position.has_api_error);
        assert_eq!(position.deposits_value, 100.0);
        assert_eq!(position.withdraws_value, 110.0);
    }
}
