use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::models::EventKind;

/// The DLMM program whose instructions this tool classifies
pub const DLMM_PROGRAM_ID: &str = "LBUZKhRxPF3XUpBCjp4YzTKgLccjZhTSDM9YuVaPwxo";

/// Hawksight integrator program; its presence in a transaction's account
/// keys marks the position as opened through a third party
pub const HAWKSIGHT_PROGRAM_ID: &str = "HawkVKYkkoD5DZTGpcKN4c9B6DD7cxBAPj3ArzDvsVhu";

/// SPL token program, whose parsed transfer instructions carry the amounts
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Canonical quote mints, used to orient a pair when the registry lists the
/// quote token on the X side
pub const QUOTE_MINTS: [&str; 3] = [
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", // USDC
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", // USDT
    "So11111111111111111111111111111111111111112",  // wSOL
];

/// Where a DLMM instruction keeps the accounts we care about.
///
/// The account layout is program-version-specific knowledge maintained as an
/// explicit table, never inferred from the transaction itself.
#[derive(Debug, Clone, Copy)]
pub struct InstructionSpec {
    pub name: &'static str,
    pub kind: EventKind,
    /// Index of the position account in the instruction's account list
    pub position_index: usize,
    /// Index of the pool (LbPair) account
    pub lb_pair_index: usize,
    /// Index of the owner/sender wallet, where the layout exposes one
    pub sender_index: Option<usize>,
}

impl InstructionSpec {
    /// Minimum account-list length this layout requires
    pub fn min_accounts(&self) -> usize {
        let mut min = self.position_index.max(self.lb_pair_index);
        if let Some(sender) = self.sender_index {
            min = min.max(sender);
        }
        min + 1
    }
}

const INSTRUCTIONS: &[InstructionSpec] = &[
    InstructionSpec {
        name: "initialize_position",
        kind: EventKind::Open,
        position_index: 1,
        lb_pair_index: 2,
        sender_index: Some(3),
    },
    InstructionSpec {
        name: "initialize_position_pda",
        kind: EventKind::Open,
        position_index: 2,
        lb_pair_index: 3,
        sender_index: Some(4),
    },
    InstructionSpec {
        name: "initialize_position_by_operator",
        kind: EventKind::Open,
        position_index: 2,
        lb_pair_index: 3,
        sender_index: Some(4),
    },
    InstructionSpec {
        name: "add_liquidity",
        kind: EventKind::Deposit,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "add_liquidity_by_weight",
        kind: EventKind::Deposit,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "add_liquidity_by_strategy",
        kind: EventKind::Deposit,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "add_liquidity_by_strategy_one_side",
        kind: EventKind::Deposit,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "add_liquidity_one_side",
        kind: EventKind::Deposit,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "remove_liquidity",
        kind: EventKind::Withdraw,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "remove_liquidity_by_range",
        kind: EventKind::Withdraw,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: None,
    },
    InstructionSpec {
        name: "claim_fee",
        kind: EventKind::FeeClaim,
        position_index: 1,
        lb_pair_index: 0,
        sender_index: None,
    },
    InstructionSpec {
        name: "claim_reward",
        kind: EventKind::RewardClaim,
        position_index: 1,
        lb_pair_index: 0,
        sender_index: None,
    },
    InstructionSpec {
        name: "close_position",
        kind: EventKind::Close,
        position_index: 0,
        lb_pair_index: 1,
        sender_index: Some(4),
    },
];

/// Anchor instruction discriminator: first 8 bytes of sha256("global:<name>")
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("global:{}", name).as_bytes());
    let digest = hasher.finalize();
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&digest[..8]);
    discriminator
}

/// Discriminator -> instruction layout lookup table
pub fn instruction_table() -> &'static HashMap<[u8; 8], InstructionSpec> {
    static TABLE: OnceLock<HashMap<[u8; 8], InstructionSpec>> = OnceLock::new();
    TABLE.get_or_init(|| {
        INSTRUCTIONS
            .iter()
            .map(|spec| (anchor_discriminator(spec.name), *spec))
            .collect()
    })
}

/// Look up a DLMM instruction by the leading bytes of its bs58-decoded data
pub fn lookup_instruction(data: &[u8]) -> Option<&'static InstructionSpec> {
    if data.len() < 8 {
        return None;
    }
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&data[..8]);
    instruction_table().get(&discriminator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_instruction_once() {
        assert_eq!(instruction_table().len(), INSTRUCTIONS.len());
    }

    #[test]
    fn lookup_matches_by_discriminator() {
        let data = anchor_discriminator("add_liquidity");
        let spec = lookup_instruction(&data).expect("known instruction");
        assert_eq!(spec.kind, EventKind::Deposit);
        assert_eq!(spec.position_index, 0);
    }

    #[test]
    fn short_or_unknown_data_does_not_match() {
        assert!(lookup_instruction(&[1, 2, 3]).is_none());
        assert!(lookup_instruction(&[0u8; 8]).is_none());
    }

    #[test]
    fn min_accounts_covers_the_deepest_index() {
        let open = INSTRUCTIONS
            .iter()
            .find(|s| s.name == "initialize_position")
            .unwrap();
        assert_eq!(open.min_accounts(), 4);
    }
}
