use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{
    approval::Secp256k1ApprovalVerifier,
    error::VaultError,
    instruction::{vault_authority, VaultInstruction},
    state::Vault,
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = VaultInstruction::unpack(instruction_data)?;

    match instruction {
        VaultInstruction::Initialize { chain_id } => {
            msg!("Instruction: Initialize");
            process_initialize(accounts, chain_id)
        }
        VaultInstruction::Deposit {
            token,
            from,
            to,
            amount,
            share,
        } => {
            msg!("Instruction: Deposit");
            process_deposit(accounts, token, from, to, amount, share)
        }
        VaultInstruction::Withdraw {
            token,
            from,
            to,
            amount,
            share,
        } => {
            msg!("Instruction: Withdraw");
            process_withdraw(program_id, accounts, token, from, to, amount, share)
        }
        VaultInstruction::Transfer {
            token,
            from,
            to,
            share,
        } => {
            msg!("Instruction: Transfer");
            process_transfer(accounts, token, from, to, share)
        }
        VaultInstruction::WhitelistMasterContract { master, approved } => {
            msg!("Instruction: WhitelistMasterContract");
            process_whitelist(accounts, master, approved)
        }
        VaultInstruction::SetMasterContractApproval {
            user,
            master,
            approved,
            nonce,
            signature,
        } => {
            msg!("Instruction: SetMasterContractApproval");
            process_set_approval(accounts, user, master, approved, nonce, signature)
        }
        VaultInstruction::Deploy {
            master,
            init_data,
            use_deterministic,
        } => {
            msg!("Instruction: Deploy");
            process_deploy(accounts, master, init_data, use_deterministic)
        }
    }
}

/// Read the ledger from an account, tolerating the zero padding left by a
/// previously longer state.
pub fn load_vault(account: &AccountInfo) -> Result<Vault, ProgramError> {
    let data = account.data.borrow();
    let vault = Vault::deserialize(&mut &data[..])
        .map_err(|_| ProgramError::from(VaultError::NotInitialized))?;
    if !vault.is_initialized {
        return Err(VaultError::NotInitialized.into());
    }
    Ok(vault)
}

/// Write the ledger back, zeroing the tail so stale bytes never survive a
/// shrinking state.
pub fn store_vault(vault: &Vault, account: &AccountInfo) -> ProgramResult {
    let bytes = vault
        .try_to_vec()
        .map_err(|_| ProgramError::from(VaultError::ArithmeticOverflow))?;
    let mut data = account.data.borrow_mut();
    if bytes.len() > data.len() {
        return Err(ProgramError::AccountDataTooSmall);
    }
    data[..bytes.len()].copy_from_slice(&bytes);
    data[bytes.len()..].fill(0);
    Ok(())
}

fn signer_key<'a>(account: &'a AccountInfo) -> Result<&'a Pubkey, ProgramError> {
    if !account.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    Ok(account.key)
}

fn process_initialize(accounts: &[AccountInfo], chain_id: u64) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    let owner = signer_key(owner_info)?;

    let data = ledger_info.data.borrow();
    if data.first().copied().unwrap_or(0) != 0 {
        return Err(VaultError::AlreadyInitialized.into());
    }
    drop(data);

    let vault = Vault::new(*owner, chain_id, *ledger_info.key);
    store_vault(&vault, ledger_info)?;
    msg!("Vault ledger initialized for chain {}", chain_id);
    Ok(())
}

fn process_deposit(
    accounts: &[AccountInfo],
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    amount: u128,
    share: u128,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let source_info = next_account_info(account_info_iter)?;
    let vault_token_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    let caller = signer_key(caller_info)?;
    let mut vault = load_vault(ledger_info)?;

    let (amount, share) = vault.deposit(caller, &token, &from, &to, amount, share)?;

    // Pull the tokens in; the ledger change above is only valid once the
    // backing amount has actually arrived.
    let token_amount: u64 = amount
        .try_into()
        .map_err(|_| ProgramError::from(VaultError::ArithmeticOverflow))?;
    invoke(
        &spl_token::instruction::transfer(
            token_program_info.key,
            source_info.key,
            vault_token_info.key,
            caller,
            &[],
            token_amount,
        )?,
        &[
            source_info.clone(),
            vault_token_info.clone(),
            caller_info.clone(),
        ],
    )?;

    store_vault(&vault, ledger_info)?;
    msg!("Deposited {} as {} shares", amount, share);
    Ok(())
}

fn process_withdraw(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    amount: u128,
    share: u128,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;
    let vault_token_info = next_account_info(account_info_iter)?;
    let destination_info = next_account_info(account_info_iter)?;
    let authority_info = next_account_info(account_info_iter)?;
    let token_program_info = next_account_info(account_info_iter)?;

    let caller = signer_key(caller_info)?;
    let mut vault = load_vault(ledger_info)?;

    let (amount, share) = vault.withdraw(caller, &token, &from, &to, amount, share)?;

    let token_amount: u64 = amount
        .try_into()
        .map_err(|_| ProgramError::from(VaultError::ArithmeticOverflow))?;
    let (authority, bump) = vault_authority(program_id, ledger_info.key);
    if authority != *authority_info.key {
        return Err(ProgramError::InvalidSeeds);
    }
    invoke_signed(
        &spl_token::instruction::transfer(
            token_program_info.key,
            vault_token_info.key,
            destination_info.key,
            &authority,
            &[],
            token_amount,
        )?,
        &[
            vault_token_info.clone(),
            destination_info.clone(),
            authority_info.clone(),
        ],
        &[&[b"vault-authority", ledger_info.key.as_ref(), &[bump]]],
    )?;

    store_vault(&vault, ledger_info)?;
    msg!("Withdrew {} burning {} shares", amount, share);
    Ok(())
}

fn process_transfer(
    accounts: &[AccountInfo],
    token: Pubkey,
    from: Pubkey,
    to: Pubkey,
    share: u128,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    let caller = signer_key(caller_info)?;
    let mut vault = load_vault(ledger_info)?;
    vault.transfer(caller, &token, &from, &to, share)?;
    store_vault(&vault, ledger_info)
}

fn process_whitelist(accounts: &[AccountInfo], master: Pubkey, approved: bool) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let owner_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    let owner = signer_key(owner_info)?;
    let mut vault = load_vault(ledger_info)?;
    vault.whitelist_master_contract(owner, &master, approved)?;
    store_vault(&vault, ledger_info)?;
    msg!("Master contract whitelist set to {}", approved);
    Ok(())
}

fn process_set_approval(
    accounts: &[AccountInfo],
    user: Pubkey,
    master: Pubkey,
    approved: bool,
    nonce: u64,
    signature: crate::approval::ApprovalSignature,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    let caller = signer_key(caller_info)?;
    let mut vault = load_vault(ledger_info)?;
    vault.set_master_contract_approval(
        caller,
        &user,
        &master,
        approved,
        nonce,
        &signature,
        &Secp256k1ApprovalVerifier,
    )?;
    store_vault(&vault, ledger_info)?;
    msg!("Master contract approval set to {}", approved);
    Ok(())
}

fn process_deploy(
    accounts: &[AccountInfo],
    master: Pubkey,
    init_data: Vec<u8>,
    use_deterministic: bool,
) -> ProgramResult {
    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let ledger_info = next_account_info(account_info_iter)?;

    signer_key(caller_info)?;
    let mut vault = load_vault(ledger_info)?;
    let clone_id = vault.deploy(&master, &init_data, use_deterministic)?;
    store_vault(&vault, ledger_info)?;
    msg!("Deployed clone {}", clone_id);
    Ok(())
}
