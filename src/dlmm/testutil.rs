//! Fixture builders for classifier and event-extraction tests.

use solana_account_decoder::parse_token::UiTokenAmount;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::parse_accounts::ParsedAccount;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, EncodedTransactionWithStatusMeta,
    UiInnerInstructions, UiInstruction, UiMessage, UiParsedInstruction, UiParsedMessage,
    UiPartiallyDecodedInstruction, UiTransaction, UiTransactionStatusMeta,
    UiTransactionTokenBalance,
};

use crate::dlmm::api::{DlmmPair, PairRegistry};
use crate::dlmm::program::{anchor_discriminator, DLMM_PROGRAM_ID, TOKEN_PROGRAM_ID};

pub const MINT_X: &str = "MintXxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";
pub const MINT_Y: &str = "MintYyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyyy";
pub const REWARD_MINT: &str = "MintRewardRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRR";
pub const LB_PAIR: &str = "PairAddressPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPPP";

/// Account keys every fixture transaction carries, in a fixed order so
/// token-balance indices are stable across tests
pub const ACCOUNT_KEYS: [&str; 8] = [
    "payer",
    "position-1",
    LB_PAIR,
    "user-x",
    "reserve-x",
    "user-y",
    "reserve-y",
    "owner-wallet",
];

pub fn registry_fixture() -> PairRegistry {
    PairRegistry::new(vec![DlmmPair {
        address: LB_PAIR.to_string(),
        name: "X-Y".to_string(),
        mint_x: MINT_X.to_string(),
        mint_y: MINT_Y.to_string(),
        reward_mint_x: Some(REWARD_MINT.to_string()),
        reward_mint_y: None,
    }])
}

pub fn dlmm_instruction(name: &str, accounts: Vec<&str>) -> UiInstruction {
    UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(
        UiPartiallyDecodedInstruction {
            program_id: DLMM_PROGRAM_ID.to_string(),
            accounts: accounts.into_iter().map(String::from).collect(),
            data: bs58::encode(anchor_discriminator(name)).into_string(),
            stack_height: None,
        },
    ))
}

pub fn token_transfer_checked(
    source: &str,
    destination: &str,
    mint: &str,
    ui_amount: f64,
    decimals: u8,
) -> UiInstruction {
    UiInstruction::Parsed(UiParsedInstruction::Parsed(
        solana_transaction_status::parse_instruction::ParsedInstruction {
            program: "spl-token".to_string(),
            program_id: TOKEN_PROGRAM_ID.to_string(),
            parsed: serde_json::json!({
                "type": "transferChecked",
                "info": {
                    "source": source,
                    "destination": destination,
                    "mint": mint,
                    "authority": "owner-wallet",
                    "tokenAmount": {
                        "uiAmount": ui_amount,
                        "decimals": decimals,
                        "amount": format!("{}", (ui_amount * 10f64.powi(decimals as i32)) as u128),
                        "uiAmountString": format!("{}", ui_amount),
                    },
                },
            }),
            stack_height: Some(2),
        },
    ))
}

pub fn token_transfer_plain(source: &str, destination: &str, raw_amount: &str) -> UiInstruction {
    UiInstruction::Parsed(UiParsedInstruction::Parsed(
        solana_transaction_status::parse_instruction::ParsedInstruction {
            program: "spl-token".to_string(),
            program_id: TOKEN_PROGRAM_ID.to_string(),
            parsed: serde_json::json!({
                "type": "transfer",
                "info": {
                    "source": source,
                    "destination": destination,
                    "authority": "owner-wallet",
                    "amount": raw_amount,
                },
            }),
            stack_height: Some(2),
        },
    ))
}

pub fn inner_group(index: u8, instructions: Vec<UiInstruction>) -> UiInnerInstructions {
    UiInnerInstructions {
        index,
        instructions,
    }
}

pub fn token_balance(account_index: u8, mint: &str, decimals: u8) -> UiTransactionTokenBalance {
    UiTransactionTokenBalance {
        account_index,
        mint: mint.to_string(),
        ui_token_amount: UiTokenAmount {
            ui_amount: None,
            decimals,
            amount: "0".to_string(),
            ui_amount_string: "0".to_string(),
        },
        owner: OptionSerializer::Skip,
        program_id: OptionSerializer::Skip,
    }
}

pub fn transaction_fixture(
    signature: &str,
    slot: u64,
    block_time_s: i64,
    instructions: Vec<UiInstruction>,
    inner_instructions: Vec<UiInnerInstructions>,
    token_balances: Vec<UiTransactionTokenBalance>,
) -> EncodedConfirmedTransactionWithStatusMeta {
    transaction_fixture_with_keys(
        signature,
        slot,
        block_time_s,
        ACCOUNT_KEYS.iter().map(|key| key.to_string()).collect(),
        instructions,
        inner_instructions,
        token_balances,
    )
}

pub fn transaction_fixture_with_keys(
    signature: &str,
    slot: u64,
    block_time_s: i64,
    account_keys: Vec<String>,
    instructions: Vec<UiInstruction>,
    inner_instructions: Vec<UiInnerInstructions>,
    token_balances: Vec<UiTransactionTokenBalance>,
) -> EncodedConfirmedTransactionWithStatusMeta {
    let message = UiParsedMessage {
        account_keys: account_keys
            .into_iter()
            .map(|pubkey| ParsedAccount {
                pubkey,
                writable: false,
                signer: false,
                source: None,
            })
            .collect(),
        recent_blockhash: "blockhash".to_string(),
        instructions,
        address_table_lookups: None,
    };

    let meta = UiTransactionStatusMeta {
        err: None,
        status: Ok(()),
        fee: 5000,
        pre_balances: vec![],
        post_balances: vec![],
        inner_instructions: OptionSerializer::Some(inner_instructions),
        log_messages: OptionSerializer::Skip,
        pre_token_balances: OptionSerializer::Some(vec![]),
        post_token_balances: OptionSerializer::Some(token_balances),
        rewards: OptionSerializer::Skip,
        loaded_addresses: OptionSerializer::Skip,
        return_data: OptionSerializer::Skip,
        compute_units_consumed: OptionSerializer::Skip,
    };

    EncodedConfirmedTransactionWithStatusMeta {
        slot,
        transaction: EncodedTransactionWithStatusMeta {
            transaction: EncodedTransaction::Json(UiTransaction {
                signatures: vec![signature.to_string()],
                message: UiMessage::Parsed(message),
            }),
            meta: Some(meta),
            version: None,
        },
        block_time: Some(block_time_s),
    }
}
