//! Ledger-level tests driving the vault state directly.

use solana_program::pubkey::Pubkey;
use token_vault::approval::{approval_digest, ApprovalSignature, ApprovalVerifier};
use token_vault::error::VaultError;
use token_vault::math::Rebase;
use token_vault::state::Vault;

fn new_vault() -> (Vault, Pubkey) {
    let owner = Pubkey::new_unique();
    let vault = Vault::new(owner, 1, Pubkey::new_unique());
    (vault, owner)
}

fn sig(byte: u8) -> ApprovalSignature {
    ApprovalSignature {
        v: 27,
        r: [byte; 32],
        s: [byte; 32],
    }
}

/// Verifier that accepts any signature as coming from a fixed signer.
struct FixedSigner(Pubkey);

impl ApprovalVerifier for FixedSigner {
    fn recover(
        &self,
        _digest: &[u8; 32],
        _signature: &ApprovalSignature,
    ) -> Result<Pubkey, VaultError> {
        Ok(self.0)
    }
}

#[test]
fn deposit_then_withdraw_round_trips() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();

    let (amount, share) = vault.deposit(&alice, &token, &alice, &alice, 1000, 0).unwrap();
    assert_eq!((amount, share), (1000, 1000));
    assert_eq!(vault.balance_of(&token, &alice), 1000);
    assert_eq!(vault.totals(&token), Rebase { elastic: 1000, base: 1000 });

    let (amount, share) = vault.withdraw(&alice, &token, &alice, &alice, 0, 1000).unwrap();
    assert_eq!((amount, share), (1000, 1000));
    assert_eq!(vault.balance_of(&token, &alice), 0);
    assert_eq!(vault.totals(&token), Rebase::default());
}

#[test]
fn round_trip_never_returns_more_than_deposited() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();

    // Skew the pool so one share is worth a fractional amount.
    vault.deposit(&bob, &token, &bob, &bob, 1000, 0).unwrap();
    let pool = vault.pools.get_mut(&token).unwrap();
    pool.add_elastic(333).unwrap(); // simulated yield

    for deposit_amount in [1u128, 7, 99, 1_000, 123_457] {
        let (_, share) = vault
            .deposit(&alice, &token, &alice, &alice, deposit_amount, 0)
            .unwrap();
        let (amount_out, _) = vault
            .withdraw(&alice, &token, &alice, &alice, 0, share)
            .unwrap();
        assert!(
            amount_out <= deposit_amount,
            "withdrew {amount_out} from a {deposit_amount} deposit"
        );
    }
}

#[test]
fn share_conservation_under_mixed_traffic() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let users: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();

    let mut net_in: u128 = 0;
    for (i, user) in users.iter().enumerate() {
        let amount = 1_000 + 37 * i as u128;
        vault.deposit(user, &token, user, user, amount, 0).unwrap();
        net_in += amount;
    }
    for user in &users[..2] {
        let half = vault.balance_of(&token, user) / 2;
        let (amount, _) = vault.withdraw(user, &token, user, user, 0, half).unwrap();
        net_in -= amount;
    }

    let totals = vault.totals(&token);
    let sum_shares: u128 = users.iter().map(|u| vault.balance_of(&token, u)).sum();
    assert_eq!(sum_shares, totals.base);
    // Redeemable value never exceeds what is actually backing the pool.
    let redeemable = totals.to_elastic(sum_shares, false).unwrap();
    assert!(redeemable <= net_in);
    assert_eq!(totals.elastic, net_in);
}

#[test]
fn withdraw_rounds_shares_against_the_withdrawer() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();

    vault.deposit(&alice, &token, &alice, &alice, 1000, 0).unwrap();
    vault.pools.get_mut(&token).unwrap().add_elastic(500).unwrap();

    // 100 units now cost ceil(100 * 1000 / 1500) = 67 shares, not 66.
    let (amount, share) = vault.withdraw(&alice, &token, &alice, &alice, 100, 0).unwrap();
    assert_eq!(amount, 100);
    assert_eq!(share, 67);
}

#[test]
fn withdraw_beyond_balance_fails() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let mallory = Pubkey::new_unique();

    vault.deposit(&alice, &token, &alice, &alice, 100, 0).unwrap();
    assert_eq!(
        vault.withdraw(&alice, &token, &alice, &alice, 0, 101),
        Err(VaultError::InsufficientBalance)
    );
    // Pool has enough in aggregate but mallory holds nothing.
    vault.deposit(&alice, &token, &alice, &alice, 900, 0).unwrap();
    assert_eq!(
        vault.withdraw(&mallory, &token, &mallory, &mallory, 0, 10),
        Err(VaultError::InsufficientBalance)
    );
}

#[test]
fn transfer_moves_shares_without_touching_totals() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let bob = Pubkey::new_unique();

    vault.deposit(&alice, &token, &alice, &alice, 500, 0).unwrap();
    let before = vault.totals(&token);
    vault.transfer(&alice, &token, &alice, &bob, 200).unwrap();
    assert_eq!(vault.balance_of(&token, &alice), 300);
    assert_eq!(vault.balance_of(&token, &bob), 200);
    assert_eq!(vault.totals(&token), before);

    assert_eq!(
        vault.transfer(&alice, &token, &alice, &bob, 301),
        Err(VaultError::InsufficientBalance)
    );
}

#[test]
fn strangers_cannot_move_other_users_funds() {
    let (mut vault, _) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let mallory = Pubkey::new_unique();

    vault.deposit(&alice, &token, &alice, &alice, 500, 0).unwrap();
    assert_eq!(
        vault.transfer(&mallory, &token, &alice, &mallory, 1),
        Err(VaultError::TransferNotApproved)
    );
    assert_eq!(
        vault.withdraw(&mallory, &token, &alice, &mallory, 0, 1),
        Err(VaultError::TransferNotApproved)
    );
}

#[test]
fn approved_clone_may_act_on_user_funds() {
    let (mut vault, owner) = new_vault();
    let token = Pubkey::new_unique();
    let alice = Pubkey::new_unique();
    let master = Pubkey::new_unique();

    vault.whitelist_master_contract(&owner, &master, true).unwrap();
    let clone = vault.deploy(&master, b"market-init", true).unwrap();

    vault.deposit(&alice, &token, &alice, &alice, 500, 0).unwrap();

    // Not yet approved.
    assert_eq!(
        vault.transfer(&clone, &token, &alice, &clone, 100),
        Err(VaultError::TransferNotApproved)
    );

    vault
        .set_master_contract_approval(
            &alice,
            &alice,
            &master,
            true,
            0,
            &ApprovalSignature::default(),
            &FixedSigner(alice),
        )
        .unwrap();
    vault.transfer(&clone, &token, &alice, &clone, 100).unwrap();
    assert_eq!(vault.balance_of(&token, &clone), 100);

    // Revocation closes the door again.
    vault
        .set_master_contract_approval(
            &alice,
            &alice,
            &master,
            false,
            0,
            &ApprovalSignature::default(),
            &FixedSigner(alice),
        )
        .unwrap();
    assert_eq!(
        vault.transfer(&clone, &token, &alice, &clone, 100),
        Err(VaultError::TransferNotApproved)
    );
}

#[test]
fn direct_approval_requires_caller_to_be_user() {
    let (mut vault, owner) = new_vault();
    let alice = Pubkey::new_unique();
    let mallory = Pubkey::new_unique();
    let master = Pubkey::new_unique();
    vault.whitelist_master_contract(&owner, &master, true).unwrap();

    assert_eq!(
        vault.set_master_contract_approval(
            &mallory,
            &alice,
            &master,
            true,
            0,
            &ApprovalSignature::default(),
            &FixedSigner(alice),
        ),
        Err(VaultError::Unauthorized)
    );
}

#[test]
fn direct_approval_requires_whitelisted_master() {
    let (mut vault, _) = new_vault();
    let alice = Pubkey::new_unique();
    let master = Pubkey::new_unique();

    assert_eq!(
        vault.set_master_contract_approval(
            &alice,
            &alice,
            &master,
            true,
            0,
            &ApprovalSignature::default(),
            &FixedSigner(alice),
        ),
        Err(VaultError::NotWhitelisted)
    );
}

#[test]
fn signed_approval_consumes_nonce_and_rejects_replay() {
    let (mut vault, _) = new_vault();
    let alice = Pubkey::new_unique();
    let master = Pubkey::new_unique();
    let verifier = FixedSigner(alice);

    assert_eq!(vault.nonce_of(&alice), 0);
    vault
        .set_master_contract_approval(&alice, &alice, &master, true, 0, &sig(7), &verifier)
        .unwrap();
    assert!(vault.is_master_approved(&master, &alice));
    assert_eq!(vault.nonce_of(&alice), 1);

    // Same payload again: the stored nonce moved on.
    assert_eq!(
        vault.set_master_contract_approval(&alice, &alice, &master, true, 0, &sig(7), &verifier),
        Err(VaultError::NonceMismatch)
    );
}

#[test]
fn signed_approval_rejects_wrong_signer() {
    let (mut vault, _) = new_vault();
    let alice = Pubkey::new_unique();
    let mallory = Pubkey::new_unique();
    let master = Pubkey::new_unique();

    assert_eq!(
        vault.set_master_contract_approval(
            &alice,
            &alice,
            &master,
            true,
            0,
            &sig(9),
            &FixedSigner(mallory),
        ),
        Err(VaultError::InvalidSignature)
    );
    // A failed verification must not burn the nonce.
    assert_eq!(vault.nonce_of(&alice), 0);
}

#[test]
fn approval_digest_changes_with_nonce() {
    let vault_id = Pubkey::new_unique();
    let user = Pubkey::new_unique();
    let master = Pubkey::new_unique();
    let d0 = approval_digest(1, &vault_id, &user, &master, true, 0);
    let d1 = approval_digest(1, &vault_id, &user, &master, true, 1);
    assert_ne!(d0, d1);
}

#[test]
fn deploy_requires_whitelist_and_registers_master() {
    let (mut vault, owner) = new_vault();
    let master = Pubkey::new_unique();

    assert_eq!(
        vault.deploy(&master, b"init", true),
        Err(VaultError::NotWhitelisted)
    );

    vault.whitelist_master_contract(&owner, &master, true).unwrap();
    let clone = vault.deploy(&master, b"init", true).unwrap();
    assert_eq!(vault.master_contract_of(&clone), Some(&master));

    // Deterministic redeploy of identical init data collides.
    assert_eq!(
        vault.deploy(&master, b"init", true),
        Err(VaultError::CloneAlreadyDeployed)
    );
    // The salted flavor keeps minting fresh ids.
    let a = vault.deploy(&master, b"init", false).unwrap();
    let b = vault.deploy(&master, b"init", false).unwrap();
    assert_ne!(a, b);
}

#[test]
fn whitelist_is_owner_only() {
    let (mut vault, _) = new_vault();
    let mallory = Pubkey::new_unique();
    let master = Pubkey::new_unique();
    assert_eq!(
        vault.whitelist_master_contract(&mallory, &master, true),
        Err(VaultError::Unauthorized)
    );
}
