use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::approval::ApprovalSignature;
use crate::error::VaultError;

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq)]
pub enum VaultInstruction {
    /// Create the vault ledger.
    /// Accounts:
    /// 0. `[signer]` Protocol owner
    /// 1. `[writable]` Ledger account
    Initialize { chain_id: u64 },

    /// Move tokens into the vault, minting shares for `to`.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Source token account
    /// 3. `[writable]` Vault token account
    /// 4. `[]` Token program
    Deposit {
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        amount: u128,
        share: u128,
    },

    /// Burn shares from `from` and release tokens.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Ledger account
    /// 2. `[writable]` Vault token account
    /// 3. `[writable]` Destination token account
    /// 4. `[]` Vault transfer authority (PDA)
    /// 5. `[]` Token program
    Withdraw {
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        amount: u128,
        share: u128,
    },

    /// Move shares between ledger accounts.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Ledger account
    Transfer {
        token: Pubkey,
        from: Pubkey,
        to: Pubkey,
        share: u128,
    },

    /// Owner-only whitelist management for master contracts.
    /// Accounts:
    /// 0. `[signer]` Protocol owner
    /// 1. `[writable]` Ledger account
    WhitelistMasterContract { master: Pubkey, approved: bool },

    /// Register or revoke a delegated approval, directly or via a signed
    /// message.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Ledger account
    SetMasterContractApproval {
        user: Pubkey,
        master: Pubkey,
        approved: bool,
        nonce: u64,
        signature: ApprovalSignature,
    },

    /// Clone a whitelisted master contract.
    /// Accounts:
    /// 0. `[signer]` Caller
    /// 1. `[writable]` Ledger account
    Deploy {
        master: Pubkey,
        init_data: Vec<u8>,
        use_deterministic: bool,
    },
}

impl VaultInstruction {
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| VaultError::InvalidInstruction.into())
    }

    pub fn pack(&self) -> Vec<u8> {
        self.try_to_vec().expect("instruction serialization")
    }
}

fn ledger_ix(program_id: &Pubkey, caller: &Pubkey, ledger: &Pubkey, data: Vec<u8>) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*ledger, false),
        ],
        data,
    }
}

pub fn initialize(
    program_id: &Pubkey,
    owner: &Pubkey,
    ledger: &Pubkey,
    chain_id: u64,
) -> Instruction {
    ledger_ix(
        program_id,
        owner,
        ledger,
        VaultInstruction::Initialize { chain_id }.pack(),
    )
}

pub fn deposit(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger: &Pubkey,
    source: &Pubkey,
    vault_account: &Pubkey,
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    amount: u128,
    share: u128,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*ledger, false),
            AccountMeta::new(*source, false),
            AccountMeta::new(*vault_account, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: VaultInstruction::Deposit {
            token,
            from,
            to,
            amount,
            share,
        }
        .pack(),
    }
}

pub fn withdraw(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger: &Pubkey,
    vault_account: &Pubkey,
    destination: &Pubkey,
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    amount: u128,
    share: u128,
) -> Instruction {
    let (authority, _) = vault_authority(program_id, ledger);
    Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new(*ledger, false),
            AccountMeta::new(*vault_account, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(authority, false),
            AccountMeta::new_readonly(spl_token::id(), false),
        ],
        data: VaultInstruction::Withdraw {
            token,
            from,
            to,
            amount,
            share,
        }
        .pack(),
    }
}

pub fn transfer(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger: &Pubkey,
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    share: u128,
) -> Instruction {
    ledger_ix(
        program_id,
        caller,
        ledger,
        VaultInstruction::Transfer {
            token,
            from,
            to,
            share,
        }
        .pack(),
    )
}

pub fn whitelist_master_contract(
    program_id: &Pubkey,
    owner: &Pubkey,
    ledger: &Pubkey,
    master: Pubkey,
    approved: bool,
) -> Instruction {
    ledger_ix(
        program_id,
        owner,
        ledger,
        VaultInstruction::WhitelistMasterContract { master, approved }.pack(),
    )
}

pub fn set_master_contract_approval(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger: &Pubkey,
    user: Pubkey,
    master: Pubkey,
    approved: bool,
    nonce: u64,
    signature: ApprovalSignature,
) -> Instruction {
    ledger_ix(
        program_id,
        caller,
        ledger,
        VaultInstruction::SetMasterContractApproval {
            user,
            master,
            approved,
            nonce,
            signature,
        }
        .pack(),
    )
}

pub fn deploy(
    program_id: &Pubkey,
    caller: &Pubkey,
    ledger: &Pubkey,
    master: Pubkey,
    init_data: Vec<u8>,
    use_deterministic: bool,
) -> Instruction {
    ledger_ix(
        program_id,
        caller,
        ledger,
        VaultInstruction::Deploy {
            master,
            init_data,
            use_deterministic,
        }
        .pack(),
    )
}

/// PDA signing for token releases out of the vault.
pub fn vault_authority(program_id: &Pubkey, ledger: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"vault-authority", ledger.as_ref()], program_id)
}
