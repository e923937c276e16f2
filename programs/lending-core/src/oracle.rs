//! External price plumbing, specified only at the interface boundary.

use borsh::{BorshDeserialize, BorshSerialize};

/// A source of the collateral price in debt-token units (1e18-scaled).
/// `get` reports `(updated, rate)`; a stale source answers
/// `(false, _)` and the market keeps its cached rate.
pub trait ExchangeRateSource {
    fn get(&mut self, data: &[u8]) -> (bool, u128);
}

/// Minimal on-chain feed layout the processor adapts into an
/// `ExchangeRateSource`.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriceFeed {
    pub rate: u128,
    pub updated: bool,
}

impl ExchangeRateSource for PriceFeed {
    fn get(&mut self, _data: &[u8]) -> (bool, u128) {
        (self.updated, self.rate)
    }
}
