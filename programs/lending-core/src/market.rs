//! Interest accrual, collateral and borrow operations on a market.
//!
//! These mutate ledger state only; solvency gating for the direct
//! instruction paths lives in `require_solvent`, while the cook
//! interpreter defers that check to the end of the batch.

use solana_program::pubkey::Pubkey;
use token_vault::math::mul_div;
use token_vault::state::Vault;

use crate::error::LendingError;
use crate::oracle::ExchangeRateSource;
use crate::state::{
    Market, BORROW_OPENING_FEE_PRECISION, COLLATERIZATION_RATE_PRECISION,
    EXCHANGE_RATE_PRECISION, INTEREST_RATE_PRECISION,
};

impl Market {
    /// Fold the interest since the last accrual into the borrow total.
    /// Idempotent at equal timestamps, so every debt-touching operation
    /// calls it first and ordering between callers cannot double-apply.
    pub fn accrue(&mut self, now: u64) -> Result<(), LendingError> {
        let elapsed = now.saturating_sub(self.accrue_info.last_accrued);
        if elapsed == 0 {
            return Ok(());
        }
        self.accrue_info.last_accrued = now;
        if self.total_borrow.base == 0 {
            return Ok(());
        }

        let rate_by_time = (self.config.interest_per_second as u128)
            .checked_mul(elapsed as u128)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let interest = mul_div(
            self.total_borrow.elastic,
            rate_by_time,
            INTEREST_RATE_PRECISION,
            false,
        )?;
        self.total_borrow.add_elastic(interest)?;
        self.accrue_info.fees_earned = self
            .accrue_info
            .fees_earned
            .checked_add(interest)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Refresh the cached price from the rate source. A source that
    /// reports "not updated" leaves the last cached value in place and
    /// never fails the market.
    pub fn update_exchange_rate(
        &mut self,
        source: &mut dyn ExchangeRateSource,
    ) -> (bool, u128) {
        let (updated, rate) = source.get(&self.config.oracle_data);
        if updated && rate > 0 {
            self.exchange_rate = rate;
            self.rate_is_cached = true;
            (true, rate)
        } else {
            (false, self.exchange_rate)
        }
    }

    /// Price-dependent operations must never run on a zero or
    /// never-initialized rate.
    pub fn cached_rate(&self) -> Result<u128, LendingError> {
        if self.rate_is_cached {
            Ok(self.exchange_rate)
        } else {
            Err(LendingError::StalePrice)
        }
    }

    /// Solvency: collateral value at the cached rate, scaled by the
    /// collateralization ratio, must cover the user's debt (debt rounded
    /// up against the user).
    pub fn is_solvent(&self, vault: &Vault, user: &Pubkey) -> Result<bool, LendingError> {
        let borrow_part = self.borrow_part_of(user);
        if borrow_part == 0 {
            return Ok(true);
        }
        let collateral_share = self.collateral_share_of(user);
        if collateral_share == 0 {
            return Ok(false);
        }
        let rate = self.cached_rate()?;

        let pool = vault.totals(&self.config.collateral);
        let collateral_amount = pool.to_elastic(collateral_share, false)?;
        let value = mul_div(collateral_amount, rate, EXCHANGE_RATE_PRECISION, false)?;
        let limit = mul_div(
            value,
            self.config.collateralization_rate,
            COLLATERIZATION_RATE_PRECISION,
            false,
        )?;
        let owed = self.total_borrow.to_elastic(borrow_part, true)?;
        Ok(limit >= owed)
    }

    pub fn require_solvent(&self, vault: &Vault, user: &Pubkey) -> Result<(), LendingError> {
        if self.is_solvent(vault, user)? {
            Ok(())
        } else {
            Err(LendingError::Insolvent)
        }
    }

    /// Pledge vault shares as collateral for `to`. With `skim`, surplus
    /// shares already parked on the market's vault balance are claimed
    /// instead of pulling from the caller.
    pub fn add_collateral(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        to: &Pubkey,
        share: u128,
        skim: bool,
    ) -> Result<(), LendingError> {
        if skim {
            let surplus = vault
                .balance_of(&self.config.collateral, &self.id)
                .saturating_sub(self.total_collateral_share);
            if share > surplus {
                return Err(LendingError::SkimTooMuch);
            }
        } else {
            vault.transfer(&self.id, &self.config.collateral, caller, &self.id, share)?;
        }

        let entry = self.user_collateral_share.entry(*to).or_insert(0);
        *entry = entry
            .checked_add(share)
            .ok_or(LendingError::ArithmeticOverflow)?;
        self.total_collateral_share = self
            .total_collateral_share
            .checked_add(share)
            .ok_or(LendingError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Unpledge collateral from the caller towards `to`. The caller's
    /// position must be re-checked for solvency afterwards (`require_solvent`
    /// on the direct path, batch end in cook).
    pub fn remove_collateral(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        to: &Pubkey,
        share: u128,
        now: u64,
    ) -> Result<(), LendingError> {
        self.accrue(now)?;

        let entry = self.user_collateral_share.entry(*caller).or_insert(0);
        *entry = entry
            .checked_sub(share)
            .ok_or(LendingError::ArithmeticOverflow)?;
        self.total_collateral_share = self
            .total_collateral_share
            .checked_sub(share)
            .ok_or(LendingError::ArithmeticOverflow)?;

        vault.transfer(&self.id, &self.config.collateral, &self.id, to, share)?;
        Ok(())
    }

    /// Draw debt against the caller's collateral. The opening fee is owed
    /// immediately (added to the principal) but never paid out; the
    /// borrowed amount leaves the market's vault balance as shares for
    /// `to`. Parts round up: the borrower bears the rounding cost.
    /// Returns `(part, share)`.
    pub fn borrow(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        to: &Pubkey,
        amount: u128,
        now: u64,
    ) -> Result<(u128, u128), LendingError> {
        self.accrue(now)?;
        self.cached_rate()?;

        let fee = mul_div(
            amount,
            self.config.borrow_opening_fee,
            BORROW_OPENING_FEE_PRECISION,
            false,
        )?;
        let owed = amount
            .checked_add(fee)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let part = self.total_borrow.add(owed, true)?;
        self.accrue_info.fees_earned = self
            .accrue_info
            .fees_earned
            .checked_add(fee)
            .ok_or(LendingError::ArithmeticOverflow)?;

        let entry = self.user_borrow_part.entry(*caller).or_insert(0);
        *entry = entry
            .checked_add(part)
            .ok_or(LendingError::ArithmeticOverflow)?;

        let share = vault.totals(&self.config.debt_token).to_base(amount, false)?;
        vault.transfer(&self.id, &self.config.debt_token, &self.id, to, share)?;
        Ok((part, share))
    }

    /// Pay down `part` of `to`'s debt. The repaid amount rounds up; the
    /// shares are pulled from the caller unless `skim` (already moved to
    /// the market's balance by an earlier action). Returns the repaid
    /// amount.
    pub fn repay(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        to: &Pubkey,
        part: u128,
        skim: bool,
        now: u64,
    ) -> Result<u128, LendingError> {
        self.accrue(now)?;

        let amount = self.total_borrow.sub(part, true)?;
        let entry = self.user_borrow_part.entry(*to).or_insert(0);
        *entry = entry
            .checked_sub(part)
            .ok_or(LendingError::ArithmeticOverflow)?;

        let share = vault.totals(&self.config.debt_token).to_base(amount, true)?;
        if !skim {
            vault.transfer(&self.id, &self.config.debt_token, caller, &self.id, share)?;
        }
        Ok(amount)
    }

    /// Move the protocol's accumulated interest and fees to `fee_to`,
    /// capped by the debt shares the market actually holds.
    pub fn withdraw_fees(
        &mut self,
        vault: &mut Vault,
        fee_to: &Pubkey,
        now: u64,
    ) -> Result<u128, LendingError> {
        self.accrue(now)?;

        let pool = vault.totals(&self.config.debt_token);
        let mut share = pool.to_base(self.accrue_info.fees_earned, false)?;
        let held = vault.balance_of(&self.config.debt_token, &self.id);
        if share > held {
            share = held;
        }
        if share > 0 {
            vault.transfer(&self.id, &self.config.debt_token, &self.id, fee_to, share)?;
        }
        self.accrue_info.fees_earned = 0;
        Ok(share)
    }
}
