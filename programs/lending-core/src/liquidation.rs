//! Closing undercollateralized positions.

use solana_program::pubkey::Pubkey;
use token_vault::math::mul_div;
use token_vault::state::Vault;

use crate::error::LendingError;
use crate::state::{Market, EXCHANGE_RATE_PRECISION, LIQUIDATION_MULTIPLIER_PRECISION};

/// Converts seized collateral into debt tokens during auto-repay
/// liquidations. `share_from` collateral shares were already delivered to
/// `recipient`; the implementation must make at least `share_to_min` debt
/// shares available to the liquidator.
pub trait Swapper {
    fn swap(
        &self,
        vault: &mut Vault,
        from_token: &Pubkey,
        to_token: &Pubkey,
        recipient: &Pubkey,
        share_to_min: u128,
        share_from: u128,
    ) -> Result<(), LendingError>;
}

/// Aggregate outcome of one liquidation call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquidationOutcome {
    pub collateral_share: u128,
    pub borrow_amount: u128,
    pub borrow_part: u128,
}

impl Market {
    /// Liquidate any of `users` that is undercollateralized at the
    /// current rate; solvent users are skipped, not errors. Per user at
    /// most `max_borrow_parts[i]` (and never more than the outstanding
    /// part) is closed. Seized collateral is priced at the repaid amount
    /// times the liquidation multiplier and moves to `to`, optionally
    /// through `swapper`; the closing debt shares are then pulled from
    /// the caller.
    pub fn liquidate(
        &mut self,
        vault: &mut Vault,
        caller: &Pubkey,
        now: u64,
        users: &[Pubkey],
        max_borrow_parts: &[u128],
        to: &Pubkey,
        swapper: Option<&dyn Swapper>,
    ) -> Result<LiquidationOutcome, LendingError> {
        if users.len() != max_borrow_parts.len() {
            return Err(LendingError::LengthMismatch);
        }
        self.accrue(now)?;
        let rate = self.cached_rate()?;

        let collateral_pool = vault.totals(&self.config.collateral);
        let mut all = LiquidationOutcome::default();
        for (user, max_part) in users.iter().zip(max_borrow_parts) {
            if self.is_solvent(vault, user)? {
                continue;
            }
            let part = self.borrow_part_of(user).min(*max_part);
            if part == 0 {
                continue;
            }

            let borrow_amount = self.total_borrow.to_elastic(part, false)?;
            let bonus_amount = mul_div(
                borrow_amount,
                self.config.liquidation_multiplier,
                LIQUIDATION_MULTIPLIER_PRECISION,
                false,
            )?;
            let collateral_amount =
                mul_div(bonus_amount, EXCHANGE_RATE_PRECISION, rate, false)?;
            let collateral_share = collateral_pool.to_base(collateral_amount, false)?;

            // A position too far gone to cover the seizure fails the whole
            // call rather than being silently truncated.
            let user_collateral = self.user_collateral_share.entry(*user).or_insert(0);
            *user_collateral = user_collateral
                .checked_sub(collateral_share)
                .ok_or(LendingError::ArithmeticOverflow)?;
            let user_part = self.user_borrow_part.entry(*user).or_insert(0);
            *user_part = user_part
                .checked_sub(part)
                .ok_or(LendingError::ArithmeticOverflow)?;

            all.collateral_share = all
                .collateral_share
                .checked_add(collateral_share)
                .ok_or(LendingError::ArithmeticOverflow)?;
            all.borrow_amount = all
                .borrow_amount
                .checked_add(borrow_amount)
                .ok_or(LendingError::ArithmeticOverflow)?;
            all.borrow_part = all
                .borrow_part
                .checked_add(part)
                .ok_or(LendingError::ArithmeticOverflow)?;
        }
        if all.borrow_amount == 0 {
            return Err(LendingError::InsolvencyNotFound);
        }

        self.total_borrow.sub_both(all.borrow_amount, all.borrow_part)?;
        self.total_collateral_share = self
            .total_collateral_share
            .checked_sub(all.collateral_share)
            .ok_or(LendingError::ArithmeticOverflow)?;

        vault.transfer(
            &self.id,
            &self.config.collateral,
            &self.id,
            to,
            all.collateral_share,
        )?;

        let borrow_share = vault
            .totals(&self.config.debt_token)
            .to_base(all.borrow_amount, true)?;
        if let Some(swapper) = swapper {
            swapper.swap(
                vault,
                &self.config.collateral,
                &self.config.debt_token,
                caller,
                borrow_share,
                all.collateral_share,
            )?;
        }
        vault.transfer(
            caller,
            &self.config.debt_token,
            caller,
            &self.id,
            borrow_share,
        )?;

        Ok(all)
    }
}
