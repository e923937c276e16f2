use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::error::LendingError;
use crate::nft::NftVaultInit;
use crate::state::MarketInit;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub enum LendingInstruction {
    /// Create the lending program state.
    /// Accounts:
    /// 0. `[signer]` Protocol owner
    /// 1. `[writable]` Lending state account
    Initialize { fee_to: Pubkey },

    /// Clone a whitelisted master contract into a fresh market.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Lending state account
    /// 2. `[writable]` Vault ledger account
    InitMarket {
        master: Pubkey,
        init: MarketInit,
        use_deterministic: bool,
    },

    /// Accounts (all market operations):
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Lending state account
    /// 2. `[writable]` Vault ledger account
    /// 3. `[]` Price feed account, where noted
    Accrue { market: Pubkey },

    UpdateExchangeRate { market: Pubkey },

    AddCollateral {
        market: Pubkey,
        to: Pubkey,
        share: u128,
        skim: bool,
    },

    RemoveCollateral {
        market: Pubkey,
        to: Pubkey,
        share: u128,
    },

    Borrow {
        market: Pubkey,
        to: Pubkey,
        amount: u128,
    },

    Repay {
        market: Pubkey,
        to: Pubkey,
        part: u128,
        skim: bool,
    },

    Liquidate {
        market: Pubkey,
        users: Vec<Pubkey>,
        max_borrow_parts: Vec<u128>,
        to: Pubkey,
    },

    /// The batched interpreter: parallel tags / attached values / payload
    /// blobs, executed in order, atomically.
    Cook {
        market: Pubkey,
        actions: Vec<u8>,
        values: Vec<u64>,
        datas: Vec<Vec<u8>>,
    },

    WithdrawFees { market: Pubkey },

    SetFeeTo { fee_to: Pubkey },

    InitNftVault {
        master: Pubkey,
        init: NftVaultInit,
        use_deterministic: bool,
    },

    NftAddCollateral { nft_vault: Pubkey, token_id: u64 },

    NftBorrow {
        nft_vault: Pubkey,
        token_id: u64,
        to: Pubkey,
        amount: u128,
    },

    NftRepay {
        nft_vault: Pubkey,
        token_id: u64,
        part: u128,
        skim: bool,
    },

    NftRemoveCollateral {
        nft_vault: Pubkey,
        token_id: u64,
        to: Pubkey,
    },

    NftLiquidate {
        nft_vault: Pubkey,
        token_id: u64,
        to: Pubkey,
    },
}

impl LendingInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| LendingError::InvalidInstruction.into())
    }

    pub fn pack(&self) -> Vec<u8> {
        self.try_to_vec().expect("instruction serialization")
    }
}

fn state_ix(
    program_id: &Pubkey,
    caller: &Pubkey,
    lending: &Pubkey,
    vault_ledger: &Pubkey,
    data: Vec<u8>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*lending, false),
            AccountMeta::new(*vault_ledger, false),
        ],
        data,
    }
}

pub fn init_market(
    program_id: &Pubkey,
    caller: &Pubkey,
    lending: &Pubkey,
    vault_ledger: &Pubkey,
    master: Pubkey,
    init: MarketInit,
    use_deterministic: bool,
) -> Instruction {
    state_ix(
        program_id,
        caller,
        lending,
        vault_ledger,
        LendingInstruction::InitMarket {
            master,
            init,
            use_deterministic,
        }
        .pack(),
    )
}

pub fn borrow(
    program_id: &Pubkey,
    caller: &Pubkey,
    lending: &Pubkey,
    vault_ledger: &Pubkey,
    market: Pubkey,
    to: Pubkey,
    amount: u128,
) -> Instruction {
    state_ix(
        program_id,
        caller,
        lending,
        vault_ledger,
        LendingInstruction::Borrow { market, to, amount }.pack(),
    )
}

pub fn cook(
    program_id: &Pubkey,
    caller: &Pubkey,
    lending: &Pubkey,
    vault_ledger: &Pubkey,
    price_feed: &Pubkey,
    market: Pubkey,
    actions: Vec<u8>,
    values: Vec<u64>,
    datas: Vec<Vec<u8>>,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*lending, false),
            AccountMeta::new(*vault_ledger, false),
            AccountMeta::new_readonly(*price_feed, false),
        ],
        data: LendingInstruction::Cook {
            market,
            actions,
            values,
            datas,
        }
        .pack(),
    }
}
