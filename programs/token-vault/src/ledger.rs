//! Ledger operations on the vault state. All balance movement in the
//! protocol funnels through these; the actual token transfers at the
//! deposit/withdraw edges are the processor's concern.

use sha3::{Digest, Keccak256};
use solana_program::pubkey::Pubkey;

use crate::approval::{approval_digest, ApprovalSignature, ApprovalVerifier};
use crate::error::VaultError;
use crate::state::Vault;

impl Vault {
    /// Authority gate: a caller may act on `from`'s funds when it is
    /// `from` itself, or a registered clone whose master contract `from`
    /// has approved.
    fn check_allowed(&self, caller: &Pubkey, from: &Pubkey) -> Result<(), VaultError> {
        if caller == from {
            return Ok(());
        }
        let master = self
            .clones
            .get(caller)
            .ok_or(VaultError::TransferNotApproved)?;
        if self.is_master_approved(master, from) {
            Ok(())
        } else {
            Err(VaultError::TransferNotApproved)
        }
    }

    fn credit(&mut self, token: &Pubkey, account: &Pubkey, share: u128) -> Result<(), VaultError> {
        let balance = self
            .balances
            .entry(*token)
            .or_default()
            .entry(*account)
            .or_insert(0);
        *balance = balance
            .checked_add(share)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok(())
    }

    fn debit(&mut self, token: &Pubkey, account: &Pubkey, share: u128) -> Result<(), VaultError> {
        let balance = self
            .balances
            .entry(*token)
            .or_default()
            .entry(*account)
            .or_insert(0);
        if *balance < share {
            return Err(VaultError::InsufficientBalance);
        }
        *balance -= share;
        Ok(())
    }

    /// Mint shares for `to` against `amount` tokens entering the pool.
    /// Exactly one of `amount`/`share` drives the conversion: a non-zero
    /// `share` wins and the amount charged for it rounds up; an amount
    /// mints shares rounding down, so rounding always favors the pool.
    /// Returns the resolved `(amount, share)`.
    pub fn deposit(
        &mut self,
        caller: &Pubkey,
        token: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
        share: u128,
    ) -> Result<(u128, u128), VaultError> {
        self.check_allowed(caller, from)?;
        if *to == Pubkey::default() {
            return Err(VaultError::InvalidUser);
        }

        let pool = self.pools.entry(*token).or_default();
        let (amount, share) = if share == 0 {
            (amount, pool.to_base(amount, false)?)
        } else {
            (pool.to_elastic(share, true)?, share)
        };
        pool.elastic = pool
            .elastic
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        pool.base = pool
            .base
            .checked_add(share)
            .ok_or(VaultError::ArithmeticOverflow)?;

        self.credit(token, to, share)?;
        Ok((amount, share))
    }

    /// Burn shares from `from` and release the matching amount. A burn
    /// driven by an amount rounds the shares up, never in the
    /// withdrawer's favor. Returns the resolved `(amount, share)`.
    pub fn withdraw(
        &mut self,
        caller: &Pubkey,
        token: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u128,
        share: u128,
    ) -> Result<(u128, u128), VaultError> {
        self.check_allowed(caller, from)?;
        if *to == Pubkey::default() {
            return Err(VaultError::InvalidUser);
        }

        let totals = self.totals(token);
        let (amount, share) = if share == 0 {
            (amount, totals.to_base(amount, true)?)
        } else {
            (totals.to_elastic(share, false)?, share)
        };
        self.debit(token, from, share)?;

        let pool = self.pools.entry(*token).or_default();
        pool.elastic = pool
            .elastic
            .checked_sub(amount)
            .ok_or(VaultError::ArithmeticOverflow)?;
        pool.base = pool
            .base
            .checked_sub(share)
            .ok_or(VaultError::ArithmeticOverflow)?;
        Ok((amount, share))
    }

    /// Move shares between accounts. No amount conversion, pool totals
    /// untouched.
    pub fn transfer(
        &mut self,
        caller: &Pubkey,
        token: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        share: u128,
    ) -> Result<(), VaultError> {
        self.check_allowed(caller, from)?;
        if *to == Pubkey::default() {
            return Err(VaultError::InvalidUser);
        }
        self.debit(token, from, share)?;
        self.credit(token, to, share)
    }

    /// Owner-only: gate which master contracts may be cloned.
    pub fn whitelist_master_contract(
        &mut self,
        caller: &Pubkey,
        master: &Pubkey,
        approved: bool,
    ) -> Result<(), VaultError> {
        if caller != &self.owner {
            return Err(VaultError::Unauthorized);
        }
        if *master == Pubkey::default() {
            return Err(VaultError::MasterContractNotSet);
        }
        self.whitelisted_masters.insert(*master, approved);
        Ok(())
    }

    /// Flip the delegated-approval flag for (user, master).
    ///
    /// Direct path (empty signature): the caller must be the user and the
    /// master contract must be whitelisted. Signed path: `nonce` must
    /// match the user's stored nonce, and the signature must recover the
    /// user over the structured approval digest; the nonce is consumed on
    /// success, so a signature can never be replayed.
    pub fn set_master_contract_approval(
        &mut self,
        caller: &Pubkey,
        user: &Pubkey,
        master: &Pubkey,
        approved: bool,
        nonce: u64,
        signature: &ApprovalSignature,
        verifier: &dyn ApprovalVerifier,
    ) -> Result<(), VaultError> {
        if *master == Pubkey::default() {
            return Err(VaultError::MasterContractNotSet);
        }

        if signature.is_empty() {
            if caller != user {
                return Err(VaultError::Unauthorized);
            }
            if !self.is_whitelisted(master) {
                return Err(VaultError::NotWhitelisted);
            }
        } else {
            if *user == Pubkey::default() {
                return Err(VaultError::InvalidUser);
            }
            let expected = self.nonce_of(user);
            if nonce != expected {
                return Err(VaultError::NonceMismatch);
            }
            let digest =
                approval_digest(self.chain_id, &self.vault_id, user, master, approved, nonce);
            let recovered = verifier.recover(&digest, signature)?;
            if recovered != *user {
                return Err(VaultError::InvalidSignature);
            }
            let next = expected
                .checked_add(1)
                .ok_or(VaultError::ArithmeticOverflow)?;
            self.nonces.insert(*user, next);
        }

        self.master_approved
            .entry(*master)
            .or_default()
            .insert(*user, approved);
        Ok(())
    }

    /// Instantiate a clone of a whitelisted master contract and register
    /// it. `use_deterministic` derives the clone id from the init data so
    /// repeat deploys collide; otherwise a rolling salt keeps ids unique.
    pub fn deploy(
        &mut self,
        master: &Pubkey,
        init_data: &[u8],
        use_deterministic: bool,
    ) -> Result<Pubkey, VaultError> {
        if !self.is_whitelisted(master) {
            return Err(VaultError::NotWhitelisted);
        }

        let salt: [u8; 32] = if use_deterministic {
            Keccak256::digest(init_data).into()
        } else {
            let mut salt = [0u8; 32];
            salt[..8].copy_from_slice(&self.deploy_nonce.to_le_bytes());
            self.deploy_nonce = self
                .deploy_nonce
                .checked_add(1)
                .ok_or(VaultError::ArithmeticOverflow)?;
            salt
        };

        let mut hasher = Keccak256::new();
        hasher.update(b"clone");
        hasher.update(self.vault_id.as_ref());
        hasher.update(master.as_ref());
        hasher.update(salt);
        let clone_id = Pubkey::new_from_array(hasher.finalize().into());

        if self.clones.contains_key(&clone_id) {
            return Err(VaultError::CloneAlreadyDeployed);
        }
        self.clones.insert(clone_id, *master);
        Ok(clone_id)
    }
}
