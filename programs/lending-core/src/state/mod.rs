use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;
use token_vault::math::Rebase;
use token_vault::state::Vault;

use crate::error::LendingError;
use crate::nft::{NftVault, NftVaultInit};

/// Fixed-point scale of the cached exchange rate (debt units per one
/// collateral unit).
pub const EXCHANGE_RATE_PRECISION: u128 = 1_000_000_000_000_000_000;
/// Scale of the per-second interest rate.
pub const INTEREST_RATE_PRECISION: u128 = 1_000_000_000_000_000_000;
/// Collateralization ratio denominator (parts per 100000).
pub const COLLATERIZATION_RATE_PRECISION: u128 = 100_000;
/// Liquidation multiplier denominator.
pub const LIQUIDATION_MULTIPLIER_PRECISION: u128 = 100_000;
/// Borrow opening fee denominator.
pub const BORROW_OPENING_FEE_PRECISION: u128 = 100_000;

/// Immutable market configuration, fixed at clone initialization.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarketConfig {
    pub collateral: Pubkey,
    pub debt_token: Pubkey,
    pub oracle: Pubkey,
    pub oracle_data: Vec<u8>,
    /// 1e18-scaled interest per second applied to outstanding debt.
    pub interest_per_second: u64,
    /// Bonus factor on seized collateral, over 1e5 (e.g. 110000 = 110%).
    pub liquidation_multiplier: u128,
    /// Fraction of collateral value that may be borrowed, over 1e5.
    pub collateralization_rate: u128,
    /// Fee added to the principal on every borrow, over 1e5.
    pub borrow_opening_fee: u128,
}

/// Clone-initialization payload; the borsh encoding of this struct is the
/// `init_data` handed to the vault factory.
pub type MarketInit = MarketConfig;

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccrueInfo {
    pub last_accrued: u64,
    /// Interest and opening fees earned by the protocol, in debt amount.
    pub fees_earned: u128,
}

/// One lending market: a single collateral token against a single debt
/// token, settling all balances in the shared vault under its clone id.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Market {
    pub id: Pubkey,
    pub config: MarketConfig,
    pub total_collateral_share: u128,
    pub user_collateral_share: BTreeMap<Pubkey, u128>,
    /// elastic = debt amount incl. interest, base = borrow parts.
    pub total_borrow: Rebase,
    pub user_borrow_part: BTreeMap<Pubkey, u128>,
    pub accrue_info: AccrueInfo,
    pub exchange_rate: u128,
    pub rate_is_cached: bool,
}

impl Market {
    pub fn new(id: Pubkey, config: MarketConfig) -> Self {
        Self {
            id,
            config,
            total_collateral_share: 0,
            user_collateral_share: BTreeMap::new(),
            total_borrow: Rebase::default(),
            user_borrow_part: BTreeMap::new(),
            accrue_info: AccrueInfo::default(),
            exchange_rate: 0,
            rate_is_cached: false,
        }
    }

    pub fn collateral_share_of(&self, user: &Pubkey) -> u128 {
        self.user_collateral_share.get(user).copied().unwrap_or(0)
    }

    pub fn borrow_part_of(&self, user: &Pubkey) -> u128 {
        self.user_borrow_part.get(user).copied().unwrap_or(0)
    }
}

/// Program state: the market registry plus protocol-level configuration.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Lending {
    pub is_initialized: bool,
    pub owner: Pubkey,
    /// Recipient of protocol fees withdrawn from markets.
    pub fee_to: Pubkey,
    pub markets: BTreeMap<Pubkey, Market>,
    pub nft_vaults: BTreeMap<Pubkey, NftVault>,
}

impl Lending {
    pub fn new(owner: Pubkey, fee_to: Pubkey) -> Self {
        Self {
            is_initialized: true,
            owner,
            fee_to,
            markets: BTreeMap::new(),
            nft_vaults: BTreeMap::new(),
        }
    }

    /// Factory: clone `master` through the vault registry and allocate a
    /// fresh market under the resulting id.
    pub fn init_market(
        &mut self,
        vault: &mut Vault,
        master: &Pubkey,
        init: MarketInit,
        use_deterministic: bool,
    ) -> Result<Pubkey, LendingError> {
        let init_data = init
            .try_to_vec()
            .map_err(|_| LendingError::InvalidInstruction)?;
        let id = vault.deploy(master, &init_data, use_deterministic)?;
        if self.markets.contains_key(&id) || self.nft_vaults.contains_key(&id) {
            return Err(LendingError::MarketAlreadyExists);
        }
        self.markets.insert(id, Market::new(id, init));
        Ok(id)
    }

    /// Factory for the non-fungible collateral variant.
    pub fn init_nft_vault(
        &mut self,
        vault: &mut Vault,
        master: &Pubkey,
        init: NftVaultInit,
        use_deterministic: bool,
    ) -> Result<Pubkey, LendingError> {
        let init_data = init
            .try_to_vec()
            .map_err(|_| LendingError::InvalidInstruction)?;
        let id = vault.deploy(master, &init_data, use_deterministic)?;
        if self.markets.contains_key(&id) || self.nft_vaults.contains_key(&id) {
            return Err(LendingError::MarketAlreadyExists);
        }
        self.nft_vaults.insert(id, NftVault::new(id, init));
        Ok(id)
    }

    pub fn market_mut(&mut self, id: &Pubkey) -> Result<&mut Market, LendingError> {
        self.markets.get_mut(id).ok_or(LendingError::MarketNotFound)
    }

    pub fn nft_vault_mut(&mut self, id: &Pubkey) -> Result<&mut NftVault, LendingError> {
        self.nft_vaults
            .get_mut(id)
            .ok_or(LendingError::MarketNotFound)
    }

    pub fn set_fee_to(&mut self, caller: &Pubkey, fee_to: Pubkey) -> Result<(), LendingError> {
        if caller != &self.owner {
            return Err(LendingError::Unauthorized);
        }
        self.fee_to = fee_to;
        Ok(())
    }
}
