use log::debug;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;
use std::collections::HashSet;

use crate::dlmm::api::PairRegistry;
use crate::dlmm::events::{extract_events, ExtractedEvents};
use crate::errors::ClassifyError;

/// A submitted transaction resolved to the LP position account it touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteoraTransaction {
    pub signature: String,
    pub position: String,
    pub lb_pair: String,
    pub is_hawksight: bool,
}

/// Result of classifying one transaction: the position references it makes,
/// plus any data-integrity errors found along the way
#[derive(Debug, Default)]
pub struct Classification {
    pub positions: Vec<MeteoraTransaction>,
    pub errors: Vec<ClassifyError>,
}

/// Determine whether a parsed transaction touches the DLMM program and, if
/// so, which position account(s) it references.
///
/// A transaction with no matching instruction yields an empty result; that
/// is the common case and not an error. Account-layout violations are
/// reported through `errors` (and logged by the extractor), never silently
/// dropped.
pub fn classify_transaction(
    tx: &EncodedConfirmedTransactionWithStatusMeta,
    registry: &PairRegistry,
) -> Classification {
    let ExtractedEvents {
        events,
        errors,
        is_hawksight,
    } = extract_events(tx, registry);

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut positions = Vec::new();
    for event in events {
        if seen.insert((event.source_signature.clone(), event.position.clone())) {
            positions.push(MeteoraTransaction {
                signature: event.source_signature,
                position: event.position,
                lb_pair: event.lb_pair,
                is_hawksight,
            });
        }
    }

    if !positions.is_empty() {
        debug!(
            "Classified {} position reference(s) in {}",
            positions.len(),
            positions[0].signature
        );
    }

    Classification { positions, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlmm::program::HAWKSIGHT_PROGRAM_ID;
    use crate::dlmm::testutil::*;

    #[test]
    fn unrelated_transaction_is_silently_skipped() {
        let tx = transaction_fixture(
            "sig-unrelated",
            10,
            1_700_000_000,
            vec![token_transfer_checked("a", "b", MINT_X, 1.0, 9)],
            vec![],
            vec![],
        );
        let classification = classify_transaction(&tx, &registry_fixture());
        assert!(classification.positions.is_empty());
        assert!(classification.errors.is_empty());
    }

    #[test]
    fn position_account_extracted_by_instruction_layout() {
        let tx = transaction_fixture(
            "sig-open",
            11,
            1_700_000_000,
            vec![dlmm_instruction(
                "initialize_position",
                vec!["payer", "position-1", LB_PAIR, "owner-wallet"],
            )],
            vec![],
            vec![],
        );
        let classification = classify_transaction(&tx, &registry_fixture());
        assert_eq!(
            classification.positions,
            vec![MeteoraTransaction {
                signature: "sig-open".to_string(),
                position: "position-1".to_string(),
                lb_pair: LB_PAIR.to_string(),
                is_hawksight: false,
            }]
        );
    }

    #[test]
    fn duplicate_references_collapse_to_one() {
        let tx = transaction_fixture(
            "sig-open-add",
            12,
            1_700_000_000,
            vec![
                dlmm_instruction(
                    "initialize_position",
                    vec!["payer", "position-1", LB_PAIR, "owner-wallet"],
                ),
                dlmm_instruction("add_liquidity", vec!["position-1", LB_PAIR]),
            ],
            vec![],
            vec![],
        );
        let classification = classify_transaction(&tx, &registry_fixture());
        assert_eq!(classification.positions.len(), 1);
    }

    #[test]
    fn short_account_list_surfaces_as_error() {
        let tx = transaction_fixture(
            "sig-bad",
            13,
            1_700_000_000,
            vec![dlmm_instruction("claim_fee", vec![LB_PAIR])],
            vec![],
            vec![],
        );
        let classification = classify_transaction(&tx, &registry_fixture());
        assert!(classification.positions.is_empty());
        assert_eq!(classification.errors.len(), 1);
    }

    #[test]
    fn hawksight_involvement_is_flagged() {
        let mut keys: Vec<String> = ACCOUNT_KEYS.iter().map(|k| k.to_string()).collect();
        keys.push(HAWKSIGHT_PROGRAM_ID.to_string());
        let tx = transaction_fixture_with_keys(
            "sig-hawk",
            14,
            1_700_000_000,
            keys,
            vec![dlmm_instruction("add_liquidity", vec!["position-1", LB_PAIR])],
            vec![],
            vec![],
        );
        let classification = classify_transaction(&tx, &registry_fixture());
        assert!(classification.positions[0].is_hawksight);
    }
}
