use log::{debug, warn};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiMessage,
    UiParsedInstruction, UiPartiallyDecodedInstruction,
};
use std::collections::HashMap;

use crate::dlmm::api::{DlmmPair, PairRegistry};
use crate::dlmm::program::{self, InstructionSpec, DLMM_PROGRAM_ID, HAWKSIGHT_PROGRAM_ID};
use crate::errors::ClassifyError;
use crate::models::PositionEvent;
use crate::utils::raw_to_ui_amount;

/// Events and data-integrity errors recovered from one transaction
#[derive(Debug, Default)]
pub struct ExtractedEvents {
    pub events: Vec<PositionEvent>,
    pub errors: Vec<ClassifyError>,
    pub is_hawksight: bool,
}

/// Flattened view of a jsonParsed transaction: the first signature, the
/// block time, and each top-level instruction grouped with its inner
/// instructions in execution order.
struct TransactionView<'a> {
    signature: &'a str,
    slot: u64,
    timestamp_ms: i64,
    groups: Vec<Vec<&'a UiInstruction>>,
    /// Token account address -> (mint, decimals), from the pre/post
    /// token balances
    token_accounts: HashMap<&'a str, (&'a str, u8)>,
    touches_hawksight: bool,
}

fn opt<T>(value: &OptionSerializer<T>) -> Option<&T> {
    match value {
        OptionSerializer::Some(inner) => Some(inner),
        _ => None,
    }
}

impl<'a> TransactionView<'a> {
    /// Build the view, returning None for transactions that are not
    /// jsonParsed, failed on chain, or carry no block time
    fn build(tx: &'a EncodedConfirmedTransactionWithStatusMeta) -> Option<Self> {
        let meta = tx.transaction.meta.as_ref()?;
        if meta.err.is_some() {
            return None;
        }
        let ui_tx = match &tx.transaction.transaction {
            EncodedTransaction::Json(ui_tx) => ui_tx,
            _ => return None,
        };
        let message = match &ui_tx.message {
            UiMessage::Parsed(message) => message,
            _ => return None,
        };
        let signature = ui_tx.signatures.first()?.as_str();
        let timestamp_ms = tx.block_time? * 1000;

        // Inner instructions are grouped by the index of their top-level
        // instruction; flatten into [outer, inner...] execution groups.
        let inner = opt(&meta.inner_instructions);
        let mut groups: Vec<Vec<&UiInstruction>> = Vec::new();
        for (index, instruction) in message.instructions.iter().enumerate() {
            let mut group = vec![instruction];
            if let Some(inner) = inner {
                if let Some(inner_group) = inner.iter().find(|g| g.index as usize == index) {
                    group.extend(inner_group.instructions.iter());
                }
            }
            groups.push(group);
        }

        let mut token_accounts = HashMap::new();
        for balances in [opt(&meta.pre_token_balances), opt(&meta.post_token_balances)]
            .into_iter()
            .flatten()
        {
            for balance in balances {
                if let Some(account) = message.account_keys.get(balance.account_index as usize) {
                    token_accounts.insert(
                        account.pubkey.as_str(),
                        (balance.mint.as_str(), balance.ui_token_amount.decimals),
                    );
                }
            }
        }

        let touches_hawksight = message
            .account_keys
            .iter()
            .any(|account| account.pubkey == HAWKSIGHT_PROGRAM_ID);

        Some(Self {
            signature,
            slot: tx.slot,
            timestamp_ms,
            groups,
            token_accounts,
            touches_hawksight,
        })
    }
}

/// A DLMM instruction in partially-decoded form
fn as_dlmm_instruction<'a>(
    instruction: &'a UiInstruction,
) -> Option<(&'static InstructionSpec, &'a UiPartiallyDecodedInstruction)> {
    let UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(decoded)) = instruction else {
        return None;
    };
    if decoded.program_id != DLMM_PROGRAM_ID {
        return None;
    }
    let data = bs58::decode(&decoded.data).into_vec().ok()?;
    let spec = program::lookup_instruction(&data)?;
    Some((spec, decoded))
}

/// A parsed SPL-token transfer: resolved mint and UI-unit amount
struct TokenTransfer<'a> {
    mint: &'a str,
    ui_amount: f64,
}

fn as_token_transfer<'a>(
    instruction: &'a UiInstruction,
    token_accounts: &HashMap<&'a str, (&'a str, u8)>,
) -> Option<TokenTransfer<'a>> {
    let UiInstruction::Parsed(UiParsedInstruction::Parsed(parsed)) = instruction else {
        return None;
    };
    if parsed.program != "spl-token" {
        return None;
    }
    let kind = parsed.parsed.get("type")?.as_str()?;
    let info = parsed.parsed.get("info")?;

    match kind {
        "transferChecked" => {
            let mint = info.get("mint")?.as_str()?;
            let token_amount = info.get("tokenAmount")?;
            let ui_amount = match token_amount.get("uiAmount").and_then(|v| v.as_f64()) {
                Some(amount) => amount,
                None => {
                    let decimals = token_amount.get("decimals")?.as_u64()? as u8;
                    raw_to_ui_amount(token_amount.get("amount")?.as_str()?, decimals)
                }
            };
            Some(TokenTransfer { mint, ui_amount })
        }
        "transfer" => {
            // Plain transfers carry no mint; resolve it through the token
            // accounts seen in the transaction's balance records.
            let raw_amount = info.get("amount")?.as_str()?;
            let account = ["source", "destination"]
                .iter()
                .find_map(|key| info.get(*key).and_then(|v| v.as_str()))?;
            let (mint, decimals) = token_accounts.get(account)?;
            Some(TokenTransfer {
                mint,
                ui_amount: raw_to_ui_amount(raw_amount, *decimals),
            })
        }
        _ => None,
    }
}

/// Extract every DLMM position event from one parsed transaction.
///
/// Walks each instruction group in execution order; a DLMM instruction
/// opens an event and the SPL-token transfers that follow it (its CPI
/// effects) supply the amounts, assigned to the X/Y side or a reward slot
/// by mint. Transactions with no DLMM instruction yield an empty result,
/// silently. A DLMM instruction whose account list is shorter than its
/// layout requires is recorded as a data-integrity error and skipped.
pub fn extract_events(
    tx: &EncodedConfirmedTransactionWithStatusMeta,
    registry: &PairRegistry,
) -> ExtractedEvents {
    let mut extracted = ExtractedEvents::default();
    let Some(view) = TransactionView::build(tx) else {
        return extracted;
    };
    extracted.is_hawksight = view.touches_hawksight;

    for group in &view.groups {
        let mut current: Option<(PositionEvent, Option<&DlmmPair>)> = None;

        for instruction in group {
            if let Some((spec, decoded)) = as_dlmm_instruction(instruction) {
                if let Some((event, _)) = current.take() {
                    extracted.events.push(event);
                }
                if decoded.accounts.len() < spec.min_accounts() {
                    extracted.errors.push(ClassifyError::AccountListTooShort {
                        signature: view.signature.to_string(),
                        instruction: spec.name,
                        expected: spec.min_accounts(),
                        actual: decoded.accounts.len(),
                    });
                    continue;
                }

                let position = decoded.accounts[spec.position_index].clone();
                let lb_pair = decoded.accounts[spec.lb_pair_index].clone();
                let pair = registry.get(&lb_pair);
                if pair.is_none() {
                    extracted.errors.push(ClassifyError::UnknownPair {
                        signature: view.signature.to_string(),
                        lb_pair: lb_pair.clone(),
                    });
                }

                let mut event = PositionEvent::new(
                    spec.kind,
                    position,
                    lb_pair,
                    view.timestamp_ms,
                    view.slot,
                    view.signature.to_string(),
                );
                event.sender = spec
                    .sender_index
                    .map(|index| decoded.accounts[index].clone());
                current = Some((event, pair));
                continue;
            }

            if let Some(transfer) = as_token_transfer(instruction, &view.token_accounts) {
                let Some((event, Some(pair))) = current.as_mut() else {
                    continue;
                };
                if transfer.mint == pair.mint_x {
                    event.token_x_amount += transfer.ui_amount;
                } else if transfer.mint == pair.mint_y {
                    event.token_y_amount += transfer.ui_amount;
                } else if pair.reward_mints().contains(&transfer.mint) {
                    *event
                        .reward_amounts
                        .entry(transfer.mint.to_string())
                        .or_insert(0.0) += transfer.ui_amount;
                } else {
                    debug!(
                        "Ignoring transfer of unrelated mint {} in {}",
                        transfer.mint, view.signature
                    );
                }
            }
        }

        if let Some((event, _)) = current.take() {
            extracted.events.push(event);
        }
    }

    for error in &extracted.errors {
        warn!("Data integrity: {}", error);
    }

    if !extracted.events.is_empty() {
        debug!(
            "Extracted {} DLMM events from {}",
            extracted.events.len(),
            view.signature
        );
    }
    extracted
}

/// Events for one position address, in chronological (slot) order
pub fn events_for_position(events: Vec<PositionEvent>, address: &str) -> Vec<PositionEvent> {
    let mut events: Vec<PositionEvent> = events
        .into_iter()
        .filter(|event| event.position == address)
        .collect();
    events.sort_by_key(|event| (event.timestamp_ms, event.slot));
    events
}
