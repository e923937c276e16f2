//! Non-fungible collateral variant: one unit of collateral is a distinct
//! token id with its own debt and open/closed state. Valuation comes from
//! an external price helper per id; custody of the NFT itself is the
//! host's token-move concern, the ledger only tracks positions.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;
use token_vault::math::{mul_div, Rebase};
use token_vault::state::Vault;

use crate::error::LendingError;
use crate::state::{
    AccrueInfo, BORROW_OPENING_FEE_PRECISION, COLLATERIZATION_RATE_PRECISION,
    INTEREST_RATE_PRECISION,
};

/// Per-id valuation in debt-token units. Implementations typically sit on
/// a floor-price oracle plus a per-collection whitelist; only this narrow
/// interface is consumed here. Unknown collections answer
/// `CollectionNotSupported`.
pub trait NftPriceHelper {
    fn value_of(&self, collection: &Pubkey, token_id: u64) -> Result<u128, LendingError>;
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct NftVaultConfig {
    pub collection: Pubkey,
    pub debt_token: Pubkey,
    pub price_helper: Pubkey,
    /// 1e18-scaled interest per second on outstanding debt.
    pub interest_per_second: u64,
    /// Fraction of an id's value that may be borrowed, over 1e5.
    pub credit_limit_rate: u128,
    /// Debt fraction of value beyond which an id is liquidatable, over 1e5.
    pub liquidation_limit_rate: u128,
    /// Fee added to the principal on every borrow, over 1e5.
    pub organization_fee: u128,
}

pub type NftVaultInit = NftVaultConfig;

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct NftPosition {
    pub owner: Pubkey,
    pub debt_part: u128,
}

/// Custody handoff the host performs after a position closes: token id
/// and the account the NFT goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NftRelease {
    pub token_id: u64,
    pub to: Pubkey,
}

/// A lending market over one NFT collection.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct NftVault {
    pub id: Pubkey,
    pub config: NftVaultConfig,
    /// elastic = debt amount incl. interest, base = debt parts.
    pub total_debt: Rebase,
    pub accrue_info: AccrueInfo,
    pub positions: BTreeMap<u64, NftPosition>,
}

impl NftVault {
    pub fn new(id: Pubkey, config: NftVaultConfig) -> Self {
        Self {
            id,
            config,
            total_debt: Rebase::default(),
            accrue_info: AccrueInfo::default(),
            positions: BTreeMap::new(),
        }
    }

    pub fn position(&self, token_id: u64) -> Result<&NftPosition, LendingError> {
        self.positions
            .get(&token_id)
            .ok_or(LendingError::PositionNotFound)
    }

    pub fn accrue(&mut self, now: u64) -> Result<(), LendingError> {
        let elapsed = now.saturating_sub(self.accrue_info.last_accrued);
        if elapsed == 0 {
            return Ok(());
        }
        self.accrue_info.last_accrued = now;
        if self.total_debt.base == 0 {
            return Ok(());
        }
        let rate_by_time = (self.config.interest_per_second as u128)
            .checked_mul(elapsed as u128)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let interest = mul_div(
            self.total_debt.elastic,
            rate_by_time,
            INTEREST_RATE_PRECISION,
            false,
        )?;
        self.total_debt.add_elastic(interest)?;
        self.accrue_info.fees_earned = self
            .accrue_info
            .fees_earned
            .checked_add(interest)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Open a position for `token_id`, owned by `owner`.
    pub fn add_collateral(&mut self, token_id: u64, owner: &Pubkey) -> Result<(), LendingError> {
        if self.positions.contains_key(&token_id) {
            return Err(LendingError::PositionAlreadyOpen);
        }
        self.positions.insert(
            token_id,
            NftPosition {
                owner: *owner,
                debt_part: 0,
            },
        );
        Ok(())
    }

    /// Draw debt against a single id, gated by the helper's valuation and
    /// the credit limit. Returns `(part, share)`.
    pub fn borrow(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        token_id: u64,
        to: &Pubkey,
        amount: u128,
        helper: &dyn NftPriceHelper,
        now: u64,
    ) -> Result<(u128, u128), LendingError> {
        self.accrue(now)?;

        let position = self
            .positions
            .get(&token_id)
            .ok_or(LendingError::PositionNotFound)?;
        if position.owner != *caller {
            return Err(LendingError::NotPositionOwner);
        }

        let fee = mul_div(
            amount,
            self.config.organization_fee,
            BORROW_OPENING_FEE_PRECISION,
            false,
        )?;
        let owed = amount
            .checked_add(fee)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let part = self.total_debt.add(owed, true)?;
        self.accrue_info.fees_earned = self
            .accrue_info
            .fees_earned
            .checked_add(fee)
            .ok_or(LendingError::ArithmeticOverflow)?;

        let new_part = position
            .debt_part
            .checked_add(part)
            .ok_or(LendingError::ArithmeticOverflow)?;

        // Credit gate against the helper's current valuation of this id.
        let value = helper.value_of(&self.config.collection, token_id)?;
        let limit = mul_div(
            value,
            self.config.credit_limit_rate,
            COLLATERIZATION_RATE_PRECISION,
            false,
        )?;
        let debt_after = self.total_debt.to_elastic(new_part, true)?;
        if debt_after > limit {
            return Err(LendingError::Insolvent);
        }

        self.positions
            .get_mut(&token_id)
            .ok_or(LendingError::PositionNotFound)?
            .debt_part = new_part;

        let share = vault.totals(&self.config.debt_token).to_base(amount, false)?;
        vault.transfer(&self.id, &self.config.debt_token, &self.id, to, share)?;
        Ok((part, share))
    }

    /// Pay down `part` of an id's debt. Returns the repaid amount.
    pub fn repay(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        token_id: u64,
        part: u128,
        skim: bool,
        now: u64,
    ) -> Result<u128, LendingError> {
        self.accrue(now)?;

        let position = self
            .positions
            .get_mut(&token_id)
            .ok_or(LendingError::PositionNotFound)?;
        position.debt_part = position
            .debt_part
            .checked_sub(part)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let amount = self.total_debt.sub(part, true)?;

        let share = vault.totals(&self.config.debt_token).to_base(amount, true)?;
        if !skim {
            vault.transfer(&self.id, &self.config.debt_token, caller, &self.id, share)?;
        }
        Ok(amount)
    }

    /// Close a debt-free position; the returned release tells the host
    /// where the NFT goes.
    pub fn remove_collateral(
        &mut self,
        token_id: u64,
        caller: &Pubkey,
        to: &Pubkey,
    ) -> Result<NftRelease, LendingError> {
        let position = self.position(token_id)?;
        if position.owner != *caller {
            return Err(LendingError::NotPositionOwner);
        }
        if position.debt_part != 0 {
            return Err(LendingError::PositionNotEmpty);
        }
        self.positions.remove(&token_id);
        Ok(NftRelease {
            token_id,
            to: *to,
        })
    }

    /// Liquidate one id: if its debt exceeds the liquidation fraction of
    /// its value, the caller pays the full outstanding debt and takes the
    /// id. A healthy id answers `InsolvencyNotFound`. Returns the custody
    /// release plus `(amount, share)` of the closing repayment.
    pub fn liquidate(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        token_id: u64,
        to: &Pubkey,
        helper: &dyn NftPriceHelper,
        now: u64,
    ) -> Result<(NftRelease, u128, u128), LendingError> {
        self.accrue(now)?;

        let position = self.position(token_id)?;
        let part = position.debt_part;
        if part == 0 {
            return Err(LendingError::InsolvencyNotFound);
        }

        let value = helper.value_of(&self.config.collection, token_id)?;
        let limit = mul_div(
            value,
            self.config.liquidation_limit_rate,
            COLLATERIZATION_RATE_PRECISION,
            false,
        )?;
        let owed = self.total_debt.to_elastic(part, true)?;
        if owed <= limit {
            return Err(LendingError::InsolvencyNotFound);
        }

        let amount = self.total_debt.sub(part, true)?;
        let share = vault.totals(&self.config.debt_token).to_base(amount, true)?;
        vault.transfer(caller, &self.config.debt_token, caller, &self.id, share)?;
        self.positions.remove(&token_id);
        Ok((
            NftRelease {
                token_id,
                to: *to,
            },
            amount,
            share,
        ))
    }
}
