use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

use crate::math::Rebase;

/// Token id of the host's native currency inside the ledger.
pub const NATIVE_TOKEN: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// The complete vault ledger. One instance per deployment, serialized into
/// the ledger account; every market clone settles its balances here.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Vault {
    pub is_initialized: bool,
    /// Protocol owner; the only key allowed to manage the master-contract
    /// whitelist.
    pub owner: Pubkey,
    /// Approval signing domain.
    pub chain_id: u64,
    pub vault_id: Pubkey,
    /// Per-token pool: elastic = total amount held, base = total shares.
    pub pools: BTreeMap<Pubkey, Rebase>,
    /// token -> account -> shares.
    pub balances: BTreeMap<Pubkey, BTreeMap<Pubkey, u128>>,
    /// Master contracts approved for cloning.
    pub whitelisted_masters: BTreeMap<Pubkey, bool>,
    /// master -> user -> delegated approval flag.
    pub master_approved: BTreeMap<Pubkey, BTreeMap<Pubkey, bool>>,
    /// Per-user signed-approval nonces.
    pub nonces: BTreeMap<Pubkey, u64>,
    /// clone id -> master contract it was instantiated from.
    pub clones: BTreeMap<Pubkey, Pubkey>,
    /// Salt for non-deterministic clone ids.
    pub deploy_nonce: u64,
}

impl Vault {
    pub fn new(owner: Pubkey, chain_id: u64, vault_id: Pubkey) -> Self {
        Self {
            is_initialized: true,
            owner,
            chain_id,
            vault_id,
            pools: BTreeMap::new(),
            balances: BTreeMap::new(),
            whitelisted_masters: BTreeMap::new(),
            master_approved: BTreeMap::new(),
            nonces: BTreeMap::new(),
            clones: BTreeMap::new(),
            deploy_nonce: 0,
        }
    }

    /// Current share balance, zero for unknown (token, account) pairs.
    pub fn balance_of(&self, token: &Pubkey, account: &Pubkey) -> u128 {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(account))
            .copied()
            .unwrap_or(0)
    }

    /// Pool totals for a token; an untouched token reads as the empty pool.
    pub fn totals(&self, token: &Pubkey) -> Rebase {
        self.pools.get(token).copied().unwrap_or_default()
    }

    pub fn nonce_of(&self, user: &Pubkey) -> u64 {
        self.nonces.get(user).copied().unwrap_or(0)
    }

    pub fn is_master_approved(&self, master: &Pubkey, user: &Pubkey) -> bool {
        self.master_approved
            .get(master)
            .and_then(|users| users.get(user))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_whitelisted(&self, master: &Pubkey) -> bool {
        self.whitelisted_masters.get(master).copied().unwrap_or(false)
    }

    /// The master contract a clone was deployed from, if any.
    pub fn master_contract_of(&self, clone: &Pubkey) -> Option<&Pubkey> {
        self.clones.get(clone)
    }
}
