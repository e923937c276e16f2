use borsh::{BorshDeserialize, BorshSerialize};

use super::{mul_div, MathError};

/// An elastic/base pair: `elastic` is an absolute token amount, `base` the
/// total shares issued against it. The ratio drifts as interest (or any
/// other amount-only growth) is folded into `elastic`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rebase {
    pub elastic: u128,
    pub base: u128,
}

impl Rebase {
    /// Convert an amount to shares. An empty pool converts 1:1. Rounds
    /// down unless `round_up`; minting paths round down so the pool can
    /// never be diluted below its backing amount.
    pub fn to_base(&self, elastic: u128, round_up: bool) -> Result<u128, MathError> {
        if self.elastic == 0 {
            return Ok(elastic);
        }
        let base = mul_div(elastic, self.base, self.elastic, false)?;
        if round_up && mul_div(base, self.elastic, self.base, false)? < elastic {
            return base.checked_add(1).ok_or(MathError::Overflow);
        }
        Ok(base)
    }

    /// Convert shares to an amount. An empty pool converts 1:1.
    pub fn to_elastic(&self, base: u128, round_up: bool) -> Result<u128, MathError> {
        if self.base == 0 {
            return Ok(base);
        }
        let elastic = mul_div(base, self.elastic, self.base, false)?;
        if round_up && mul_div(elastic, self.base, self.elastic, false)? < base {
            return elastic.checked_add(1).ok_or(MathError::Overflow);
        }
        Ok(elastic)
    }

    /// Grow both sides by `elastic`, returning the minted base.
    pub fn add(&mut self, elastic: u128, round_up: bool) -> Result<u128, MathError> {
        let base = self.to_base(elastic, round_up)?;
        self.elastic = self.elastic.checked_add(elastic).ok_or(MathError::Overflow)?;
        self.base = self.base.checked_add(base).ok_or(MathError::Overflow)?;
        Ok(base)
    }

    /// Shrink both sides by `base`, returning the removed elastic.
    pub fn sub(&mut self, base: u128, round_up: bool) -> Result<u128, MathError> {
        let elastic = self.to_elastic(base, round_up)?;
        self.elastic = self.elastic.checked_sub(elastic).ok_or(MathError::Overflow)?;
        self.base = self.base.checked_sub(base).ok_or(MathError::Overflow)?;
        Ok(elastic)
    }

    /// Grow only the amount side (interest accrual).
    pub fn add_elastic(&mut self, elastic: u128) -> Result<(), MathError> {
        self.elastic = self.elastic.checked_add(elastic).ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Remove `(elastic, base)` together, for aggregated settlements that
    /// already resolved their own conversion.
    pub fn sub_both(&mut self, elastic: u128, base: u128) -> Result<(), MathError> {
        self.elastic = self.elastic.checked_sub(elastic).ok_or(MathError::Overflow)?;
        self.base = self.base.checked_sub(base).ok_or(MathError::Overflow)?;
        Ok(())
    }
}
