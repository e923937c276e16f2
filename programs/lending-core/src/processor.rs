use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::Clock,
    entrypoint::ProgramResult,
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
    sysvar::Sysvar,
};
use token_vault::approval::Secp256k1ApprovalVerifier;
use token_vault::state::Vault;

use crate::{
    cook, error::LendingError, instruction::LendingInstruction, oracle::PriceFeed, state::Lending,
};

pub fn process_instruction(
    _program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    let instruction = LendingInstruction::unpack(instruction_data)?;

    let account_info_iter = &mut accounts.iter();
    let caller_info = next_account_info(account_info_iter)?;
    let lending_info = next_account_info(account_info_iter)?;
    if !caller_info.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }
    let caller = *caller_info.key;

    if let LendingInstruction::Initialize { fee_to } = &instruction {
        msg!("Instruction: Initialize");
        let data = lending_info.data.borrow();
        if data.first().copied().unwrap_or(0) != 0 {
            return Err(ProgramError::AccountAlreadyInitialized);
        }
        drop(data);
        let lending = Lending::new(caller, *fee_to);
        return store_lending(&lending, lending_info);
    }

    let vault_ledger_info = next_account_info(account_info_iter)?;
    let mut lending = load_lending(lending_info)?;
    let mut vault = load_vault(vault_ledger_info)?;
    let now = Clock::get()?.unix_timestamp as u64;

    match instruction {
        LendingInstruction::Initialize { .. } => return Err(ProgramError::InvalidInstructionData),

        LendingInstruction::InitMarket {
            master,
            init,
            use_deterministic,
        } => {
            msg!("Instruction: InitMarket");
            let id = lending.init_market(&mut vault, &master, init, use_deterministic)?;
            msg!("Market deployed at {}", id);
        }

        LendingInstruction::Accrue { market } => {
            msg!("Instruction: Accrue");
            lending.market_mut(&market)?.accrue(now)?;
        }

        LendingInstruction::UpdateExchangeRate { market } => {
            msg!("Instruction: UpdateExchangeRate");
            let mut feed = load_price_feed(account_info_iter)?;
            let (updated, rate) = lending.market_mut(&market)?.update_exchange_rate(&mut feed);
            msg!("Exchange rate {} (updated: {})", rate, updated);
        }

        LendingInstruction::AddCollateral {
            market,
            to,
            share,
            skim,
        } => {
            msg!("Instruction: AddCollateral");
            lending
                .market_mut(&market)?
                .add_collateral(&mut vault, &caller, &to, share, skim)?;
        }

        LendingInstruction::RemoveCollateral { market, to, share } => {
            msg!("Instruction: RemoveCollateral");
            let market = lending.market_mut(&market)?;
            market.remove_collateral(&mut vault, &caller, &to, share, now)?;
            market.require_solvent(&vault, &caller)?;
        }

        LendingInstruction::Borrow { market, to, amount } => {
            msg!("Instruction: Borrow");
            let market = lending.market_mut(&market)?;
            let (part, share) = market.borrow(&mut vault, &caller, &to, amount, now)?;
            market.require_solvent(&vault, &caller)?;
            msg!("Borrowed {} as part {} / share {}", amount, part, share);
        }

        LendingInstruction::Repay {
            market,
            to,
            part,
            skim,
        } => {
            msg!("Instruction: Repay");
            let amount = lending
                .market_mut(&market)?
                .repay(&mut vault, &caller, &to, part, skim, now)?;
            msg!("Repaid {}", amount);
        }

        LendingInstruction::Liquidate {
            market,
            users,
            max_borrow_parts,
            to,
        } => {
            msg!("Instruction: Liquidate");
            let outcome = lending.market_mut(&market)?.liquidate(
                &mut vault,
                &caller,
                now,
                &users,
                &max_borrow_parts,
                &to,
                None,
            )?;
            msg!(
                "Liquidated {} parts for {} collateral shares",
                outcome.borrow_part,
                outcome.collateral_share
            );
        }

        LendingInstruction::Cook {
            market,
            actions,
            values,
            datas,
        } => {
            msg!("Instruction: Cook ({} actions)", actions.len());
            let mut feed = load_price_feed(account_info_iter)?;
            let market = lending.market_mut(&market)?;
            let results = cook::cook(
                market,
                &mut vault,
                &caller,
                now,
                &actions,
                &values,
                &datas,
                &Secp256k1ApprovalVerifier,
                &mut feed,
            )
            .map_err(|e| {
                msg!("Cook failed: {}", e);
                e
            })?;
            msg!("Cook executed {} actions", results.len());
        }

        LendingInstruction::WithdrawFees { market } => {
            msg!("Instruction: WithdrawFees");
            let fee_to = lending.fee_to;
            let share = lending
                .market_mut(&market)?
                .withdraw_fees(&mut vault, &fee_to, now)?;
            msg!("Fees withdrawn: {} shares", share);
        }

        LendingInstruction::SetFeeTo { fee_to } => {
            msg!("Instruction: SetFeeTo");
            lending.set_fee_to(&caller, fee_to)?;
        }

        LendingInstruction::InitNftVault {
            master,
            init,
            use_deterministic,
        } => {
            msg!("Instruction: InitNftVault");
            let id = lending.init_nft_vault(&mut vault, &master, init, use_deterministic)?;
            msg!("NFT vault deployed at {}", id);
        }

        LendingInstruction::NftAddCollateral { nft_vault, token_id } => {
            msg!("Instruction: NftAddCollateral");
            lending
                .nft_vault_mut(&nft_vault)?
                .add_collateral(token_id, &caller)?;
        }

        LendingInstruction::NftBorrow {
            nft_vault,
            token_id,
            to,
            amount,
        } => {
            msg!("Instruction: NftBorrow");
            let helper = load_nft_price_feed(account_info_iter)?;
            lending.nft_vault_mut(&nft_vault)?.borrow(
                &mut vault,
                &caller,
                token_id,
                &to,
                amount,
                &helper,
                now,
            )?;
        }

        LendingInstruction::NftRepay {
            nft_vault,
            token_id,
            part,
            skim,
        } => {
            msg!("Instruction: NftRepay");
            lending
                .nft_vault_mut(&nft_vault)?
                .repay(&mut vault, &caller, token_id, part, skim, now)?;
        }

        LendingInstruction::NftRemoveCollateral {
            nft_vault,
            token_id,
            to,
        } => {
            msg!("Instruction: NftRemoveCollateral");
            let release = lending
                .nft_vault_mut(&nft_vault)?
                .remove_collateral(token_id, &caller, &to)?;
            msg!("Release NFT {} to {}", release.token_id, release.to);
        }

        LendingInstruction::NftLiquidate {
            nft_vault,
            token_id,
            to,
        } => {
            msg!("Instruction: NftLiquidate");
            let helper = load_nft_price_feed(account_info_iter)?;
            let (release, amount, _share) = lending.nft_vault_mut(&nft_vault)?.liquidate(
                &mut vault,
                &caller,
                token_id,
                &to,
                &helper,
                now,
            )?;
            msg!(
                "NFT {} seized for {} debt, release to {}",
                release.token_id,
                amount,
                release.to
            );
        }
    }

    store_lending(&lending, lending_info)?;
    store_vault(&vault, vault_ledger_info)?;
    Ok(())
}

fn load_lending(account: &AccountInfo) -> Result<Lending, ProgramError> {
    let data = account.data.borrow();
    let lending = Lending::deserialize(&mut &data[..])
        .map_err(|_| ProgramError::UninitializedAccount)?;
    if !lending.is_initialized {
        return Err(ProgramError::UninitializedAccount);
    }
    Ok(lending)
}

fn store_lending(lending: &Lending, account: &AccountInfo) -> ProgramResult {
    let bytes = lending
        .try_to_vec()
        .map_err(|_| ProgramError::from(LendingError::ArithmeticOverflow))?;
    let mut data = account.data.borrow_mut();
    if bytes.len() > data.len() {
        return Err(ProgramError::AccountDataTooSmall);
    }
    data[..bytes.len()].copy_from_slice(&bytes);
    data[bytes.len()..].fill(0);
    Ok(())
}

fn load_vault(account: &AccountInfo) -> Result<Vault, ProgramError> {
    let data = account.data.borrow();
    let vault =
        Vault::deserialize(&mut &data[..]).map_err(|_| ProgramError::UninitializedAccount)?;
    if !vault.is_initialized {
        return Err(ProgramError::UninitializedAccount);
    }
    Ok(vault)
}

fn store_vault(vault: &Vault, account: &AccountInfo) -> ProgramResult {
    let bytes = vault
        .try_to_vec()
        .map_err(|_| ProgramError::from(LendingError::ArithmeticOverflow))?;
    let mut data = account.data.borrow_mut();
    if bytes.len() > data.len() {
        return Err(ProgramError::AccountDataTooSmall);
    }
    data[..bytes.len()].copy_from_slice(&bytes);
    data[bytes.len()..].fill(0);
    Ok(())
}

fn load_price_feed<'a, 'b, I>(iter: &mut I) -> Result<PriceFeed, ProgramError>
where
    I: Iterator<Item = &'a AccountInfo<'b>>,
    'b: 'a,
{
    let feed_info = next_account_info(iter)?;
    let data = feed_info.data.borrow();
    PriceFeed::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
}

/// On-chain helper feed: one valuation per (collection, token id).
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NftPriceFeed {
    pub collection: Pubkey,
    pub token_id: u64,
    pub value: u128,
}

impl crate::nft::NftPriceHelper for NftPriceFeed {
    fn value_of(&self, collection: &Pubkey, token_id: u64) -> Result<u128, LendingError> {
        if *collection != self.collection || token_id != self.token_id {
            return Err(LendingError::CollectionNotSupported);
        }
        Ok(self.value)
    }
}

fn load_nft_price_feed<'a, 'b, I>(iter: &mut I) -> Result<NftPriceFeed, ProgramError>
where
    I: Iterator<Item = &'a AccountInfo<'b>>,
    'b: 'a,
{
    let feed_info = next_account_info(iter)?;
    let data = feed_info.data.borrow();
    NftPriceFeed::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)
}
