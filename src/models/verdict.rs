use serde::Serialize;

/// Structured validity verdict for one submission.
///
/// Each rule is independently inspectable; `valid_submission` is the
/// conjunction of all of them plus the closed/no-api-error requirements
/// checked by the evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityVerdict {
    pub valid_profit_percent: bool,
    pub valid_usd_amount: bool,
    pub valid_date: bool,
    pub valid_time_open: bool,
    pub valid_wallet: bool,
    pub valid_submission: bool,
}
