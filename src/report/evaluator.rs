use crate::models::{Position, ValidityVerdict};

/// Threshold configuration one batch is evaluated against
#[derive(Debug, Clone)]
pub struct Thresholds {
    /// Minimum magnitude of the USD deposit value
    pub min_usd_deposit: f64,
    /// Minimum profit, in percent (e.g. 5.0 for 5%)
    pub min_profit_percent: f64,
    /// Minimum time the position must have been held open, in hours
    pub min_hours_open: f64,
    /// Submission window bounds, inclusive, in epoch milliseconds
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    /// USD profit ratios at or above this bound are treated as pricing
    /// outliers and the native-unit percentage is used instead
    pub profit_percent_sanity_ceiling: f64,
    /// Whether the submitter wallet must match the position owner
    pub require_wallet_match: bool,
}

/// `-usdProfitLoss / usdDeposits`, when the overlay exists and deposits
/// are non-zero
pub fn usd_profit_percent(position: &Position) -> Option<f64> {
    let usd = position.usd.as_ref()?;
    if usd.deposits_value == 0.0 {
        return None;
    }
    Some(-usd.profit_loss_value / usd.deposits_value)
}

/// `-profitLoss / deposits` in native units, computable whenever any
/// deposit was recorded
pub fn quote_profit_percent(position: &Position) -> Option<f64> {
    if position.deposits_value == 0.0 {
        return None;
    }
    Some(-position.profit_loss_value / position.deposits_value)
}

/// Evaluate a priced position against the thresholds.
///
/// Pure function: no I/O, never fails. Any missing precondition (no USD
/// overlay, no close timestamp, no wallet) simply yields `false` for the
/// affected sub-check and, through the conjunction, for `valid_submission`.
pub fn evaluate(
    position: &Position,
    submitted_wallet: Option<&str>,
    thresholds: &Thresholds,
) -> ValidityVerdict {
    let usd_percent = usd_profit_percent(position);
    let quote_percent = quote_profit_percent(position);

    // Prefer the USD ratio, unless it is absent or absurd enough to signal
    // a mispriced amount, in which case fall back to the native-unit ratio
    // against the unscaled threshold (reference behavior).
    let valid_profit_percent = match usd_percent {
        Some(percent) if percent < thresholds.profit_percent_sanity_ceiling => {
            percent > thresholds.min_profit_percent / 100.0
        }
        _ => match quote_percent {
            Some(percent) => percent > thresholds.min_profit_percent,
            None => false,
        },
    };

    let valid_usd_amount = position
        .usd
        .as_ref()
        .map(|usd| usd.deposits_value.abs() > thresholds.min_usd_deposit)
        .unwrap_or(false);

    let valid_date = position.open_timestamp_ms >= thresholds.window_start_ms
        && position
            .close_timestamp_ms
            .map(|close| close <= thresholds.window_end_ms)
            .unwrap_or(false);

    // Judged on the position's own lifetime, not the configured window
    // length.
    let valid_time_open = position
        .close_timestamp_ms
        .map(|close| {
            let held_ms = close - position.open_timestamp_ms;
            held_ms >= crate::utils::hours_to_ms(thresholds.min_hours_open)
        })
        .unwrap_or(false);

    let valid_wallet = if thresholds.require_wallet_match {
        match submitted_wallet {
            Some(wallet) => !position.sender.is_empty() && wallet == position.sender,
            None => false,
        }
    } else {
        true
    };

    let valid_submission = valid_profit_percent
        && valid_usd_amount
        && valid_date
        && valid_time_open
        && valid_wallet
        && position.is_closed
        && !position.has_api_error;

    ValidityVerdict {
        valid_profit_percent,
        valid_usd_amount,
        valid_date,
        valid_time_open,
        valid_wallet,
        valid_submission,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UsdValues;

    fn thresholds() -> Thresholds {
        Thresholds {
            min_usd_deposit: 50.0,
            min_profit_percent: 5.0,
            min_hours_open: 1.0,
            window_start_ms: 0,
            window_end_ms: 1_000_000_000,
            profit_percent_sanity_ceiling: 10.0,
            require_wallet_match: true,
        }
    }

    /// A closed, profitable, fully priced position held ~28 hours
    fn good_position() -> Position {
        let mut position = Position::new("position-1");
        position.sender = "owner-wallet".to_string();
        position.is_closed = true;
        position.open_timestamp_ms = 1_000;
        position.close_timestamp_ms = Some(1_000 + 3_600_000 * 28);
        position.deposits_value = 100.0;
        position.withdraws_value = 90.0;
        position.net_deposits_and_withdraws_value = 10.0;
        position.profit_loss_value = -10.0;
        position.usd = Some(UsdValues {
            deposits_value: 100.0,
            withdraws_value: 90.0,
            net_deposits_and_withdraws_value: 10.0,
            profit_loss_value: -10.0,
            ..Default::default()
        });
        position
    }

    #[test]
    fn fully_valid_submission_passes_every_check() {
        let verdict = evaluate(&good_position(), Some("owner-wallet"), &thresholds());
        assert!(verdict.valid_profit_percent);
        assert!(verdict.valid_usd_amount);
        assert!(verdict.valid_date);
        assert!(verdict.valid_time_open);
        assert!(verdict.valid_wallet);
        assert!(verdict.valid_submission);
    }

    #[test]
    fn small_usd_deposit_fails_the_whole_submission() {
        let mut position = good_position();
        position.usd.as_mut().unwrap().deposits_value = 30.0;
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_usd_amount);
        assert!(!verdict.valid_submission);
    }

    #[test]
    fn absurd_usd_ratio_falls_back_to_quote_percent() {
        let mut position = good_position();
        // USD ratio of 1200% trips the sanity ceiling; the quote ratio of
        // -10% is then compared against the unscaled threshold and fails.
        position.usd.as_mut().unwrap().profit_loss_value = -1_200.0;
        position.profit_loss_value = 10.0;
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_profit_percent);
    }

    #[test]
    fn missing_overlay_uses_native_percentage_only() {
        let mut position = good_position();
        position.usd = None;
        // quote percent = -10/100 = -0.10, below min_profit_percent.
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_profit_percent);
        assert!(!verdict.valid_usd_amount);
        assert!(!verdict.valid_submission);
    }

    #[test]
    fn open_position_never_validates() {
        let mut position = good_position();
        position.is_closed = false;
        position.close_timestamp_ms = None;
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_date);
        assert!(!verdict.valid_time_open);
        assert!(!verdict.valid_submission);
    }

    #[test]
    fn hold_duration_is_measured_on_the_position() {
        let mut position = good_position();
        position.close_timestamp_ms = Some(position.open_timestamp_ms + 30 * 60 * 1000);
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_time_open);
    }

    #[test]
    fn wallet_mismatch_fails_only_when_required() {
        let position = good_position();
        let verdict = evaluate(&position, Some("someone-else"), &thresholds());
        assert!(!verdict.valid_wallet);
        assert!(!verdict.valid_submission);

        let mut relaxed = thresholds();
        relaxed.require_wallet_match = false;
        let verdict = evaluate(&position, Some("someone-else"), &relaxed);
        assert!(verdict.valid_wallet);
    }

    #[test]
    fn api_error_fails_the_submission_but_not_the_sub_checks() {
        let mut position = good_position();
        position.has_api_error = true;
        position.usd = None;
        let verdict = evaluate(&position, Some("owner-wallet"), &thresholds());
        assert!(!verdict.valid_submission);
    }

    #[test]
    fn profit_percent_signs_flip_the_loss_convention() {
        let position = good_position();
        assert_eq!(quote_profit_percent(&position), Some(0.1));
        assert_eq!(usd_profit_percent(&position), Some(0.1));

        // The reference scenario: deposit 100, withdraw 110, closed.
        let mut losing = good_position();
        losing.deposits_value = 100.0;
        losing.withdraws_value = 110.0;
        losing.net_deposits_and_withdraws_value = -10.0;
        losing.profit_loss_value = 10.0;
        assert_eq!(quote_profit_percent(&losing), Some(-0.1));
    }
}
