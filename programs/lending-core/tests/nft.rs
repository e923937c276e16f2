//! Non-fungible collateral tests: per-id positions, credit limits,
//! per-id liquidation.

use std::collections::BTreeMap;

use lending_core::error::LendingError;
use lending_core::nft::{NftPriceHelper, NftVault, NftVaultConfig};
use lending_core::state::Lending;
use solana_program::pubkey::Pubkey;
use token_vault::approval::{ApprovalSignature, ApprovalVerifier};
use token_vault::error::VaultError;
use token_vault::state::Vault;

// --- Harness (duplicated across the lending test files) ---

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

/// Price helper with a per-id valuation table for one collection.
struct TableHelper {
    collection: Pubkey,
    values: BTreeMap<u64, u128>,
}

impl NftPriceHelper for TableHelper {
    fn value_of(&self, collection: &Pubkey, token_id: u64) -> Result<u128, LendingError> {
        if *collection != self.collection {
            return Err(LendingError::CollectionNotSupported);
        }
        self.values
            .get(&token_id)
            .copied()
            .ok_or(LendingError::CollectionNotSupported)
    }
}

struct Fixture {
    vault: Vault,
    lending: Lending,
    vault_id: Pubkey,
    collection: Pubkey,
    debt: Pubkey,
    alice: Pubkey,
    helper: TableHelper,
}

fn setup() -> Fixture {
    let owner = Pubkey::new_unique();
    let master = Pubkey::new_unique();
    let collection = Pubkey::new_unique();
    let debt = Pubkey::new_unique();
    let mut vault = Vault::new(owner, 1, Pubkey::new_unique());
    vault.whitelist_master_contract(&owner, &master, true).unwrap();

    let mut lending = Lending::new(owner, Pubkey::new_unique());
    let vault_id = lending
        .init_nft_vault(
            &mut vault,
            &master,
            NftVaultConfig {
                collection,
                debt_token: debt,
                price_helper: Pubkey::new_unique(),
                interest_per_second: 0,
                credit_limit_rate: 40_000,      // 40%
                liquidation_limit_rate: 50_000, // 50%
                organization_fee: 1_000,        // 1%
            },
            true,
        )
        .unwrap();

    let funder = Pubkey::new_unique();
    vault
        .deposit(&funder, &debt, &funder, &vault_id, 1_000_000_000, 0)
        .unwrap();

    let alice = Pubkey::new_unique();
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

    let mut values = BTreeMap::new();
    values.insert(7u64, 1_000_000u128);
    Fixture {
        vault,
        lending,
        vault_id,
        collection,
        debt,
        alice,
        helper: TableHelper { collection, values },
    }
}

fn parts(f: &mut Fixture) -> (&mut NftVault, &mut Vault) {
    let nft_vault = f.lending.nft_vaults.get_mut(&f.vault_id).unwrap();
    (nft_vault, &mut f.vault)
}

// --- Tests ---

#[test]
fn borrow_against_an_id_within_the_credit_limit() {
    let mut f = setup();
    let alice = f.alice;
    let helper = TableHelper {
        collection: f.collection,
        values: f.helper.values.clone(),
    };

    let (nft_vault, vault) = parts(&mut f);
    nft_vault.add_collateral(7, &alice).unwrap();
    // Value 1000000 at 40% credit: 300000 (+1% fee = 303000 owed) fits.
    let (part, share) = nft_vault
        .borrow(vault, &alice, 7, &alice, 300_000, &helper, 0)
        .unwrap();
    assert_eq!(part, 303_000);
    assert_eq!(share, 300_000);
    assert_eq!(nft_vault.position(7).unwrap().debt_part, 303_000);
    assert_eq!(f.vault.balance_of(&f.debt, &alice), 300_000);
}

#[test]
fn borrow_past_the_credit_limit_is_insolvent() {
    let mut f = setup();
    let alice = f.alice;
    let helper = TableHelper {
        collection: f.collection,
        values: f.helper.values.clone(),
    };
    let (nft_vault, vault) = parts(&mut f);
    nft_vault.add_collateral(7, &alice).unwrap();
    // 400000 + 1% fee = 404000 > 400000 limit.
    assert_eq!(
        nft_vault.borrow(vault, &alice, 7, &alice, 400_000, &helper, 0),
        Err(LendingError::Insolvent)
    );
}

#[test]
fn only_the_position_owner_may_borrow() {
    let mut f = setup();
    let alice = f.alice;
    let mallory = Pubkey::new_unique();
    let helper = TableHelper {
        collection: f.collection,
        values: f.helper.values.clone(),
    };
    let (nft_vault, vault) = parts(&mut f);
    nft_vault.add_collateral(7, &alice).unwrap();
    assert_eq!(
        nft_vault.borrow(vault, &mallory, 7, &mallory, 1, &helper, 0),
        Err(LendingError::NotPositionOwner)
    );
}

#[test]
fn each_id_is_a_distinct_unit() {
    let mut f = setup();
    let alice = f.alice;
    let (nft_vault, _) = parts(&mut f);
    nft_vault.add_collateral(7, &alice).unwrap();
    assert_eq!(
        nft_vault.add_collateral(7, &alice),
        Err(LendingError::PositionAlreadyOpen)
    );
    nft_vault.add_collateral(8, &alice).unwrap();
    assert_eq!(nft_vault.positions.len(), 2);
}

#[test]
fn unknown_collections_and_ids_are_rejected() {
    let mut f = setup();
    let alice = f.alice;
    let helper = TableHelper {
        collection: Pubkey::new_unique(), // some other collection
        values: f.helper.values.clone(),
    };
    let (nft_vault, vault) = parts(&mut f);
    nft_vault.add_collateral(7, &alice).unwrap();
    assert_eq!(
        nft_vault.borrow(vault, &alice, 7, &alice, 1, &helper, 0),
        Err(LendingError::CollectionNotSupported)
    );
}

#[test]
fn repay_then_close_releases_the_id() {
    let mut f = setup();
    let alice = f.alice;
    let helper = TableHelper {
        collection: f.collection,
        values: f.helper.values.clone(),
    };
    {
        let (nft_vault, vault) = parts(&mut f);
        nft_vault.add_collateral(7, &alice).unwrap();
        nft_vault
            .borrow(vault, &alice, 7, &alice, 100_000, &helper, 0)
            .unwrap();

        // Cannot walk away while the id still owes.
        assert_eq!(
            nft_vault.remove_collateral(7, &alice, &alice),
            Err(LendingError::PositionNotEmpty)
        );
    }

    // Top up to cover the 1% fee, then clear the full part.
    let donor = Pubkey::new_unique();
    f.vault
        .deposit(&donor, &f.debt, &donor, &alice, 1_000, 0)
        .unwrap();
    let (nft_vault, vault) = parts(&mut f);
    let amount = nft_vault.repay(vault, &alice, 7, 101_000, false, 0).unwrap();
    assert_eq!(amount, 101_000);

    let release = nft_vault.remove_collateral(7, &alice, &alice).unwrap();
    assert_eq!(release.token_id, 7);
    assert_eq!(release.to, alice);
    assert!(nft_vault.position(7).is_err());
}

#[test]
fn liquidation_targets_a_specific_id() {
    let mut f = setup();
    let alice = f.alice;
    let liquidator = Pubkey::new_unique();
    f.vault
        .deposit(&liquidator, &f.debt, &liquidator, &liquidator, 1_000_000, 0)
        .unwrap();

    let mut helper = TableHelper {
        collection: f.collection,
        values: f.helper.values.clone(),
    };
    {
        let (nft_vault, vault) = parts(&mut f);
        nft_vault.add_collateral(7, &alice).unwrap();
        nft_vault
            .borrow(vault, &alice, 7, &alice, 300_000, &helper, 0)
            .unwrap();

        // Debt 303000 is below the 50% liquidation line of 500000.
        assert_eq!(
            nft_vault.liquidate(vault, &liquidator, 7, &liquidator, &helper, 0),
            Err(LendingError::InsolvencyNotFound)
        );
    }

    // Floor collapses: the id is now worth 500000, line at 250000.
    helper.values.insert(7, 500_000);
    let (nft_vault, vault) = parts(&mut f);
    let (release, amount, share) = nft_vault
        .liquidate(vault, &liquidator, 7, &liquidator, &helper, 0)
        .unwrap();
    assert_eq!(release.token_id, 7);
    assert_eq!(release.to, liquidator);
    assert_eq!(amount, 303_000);
    assert_eq!(share, 303_000);
    assert!(nft_vault.position(7).is_err());
    assert_eq!(nft_vault.total_debt.base, 0);
    assert_eq!(f.vault.balance_of(&f.debt, &liquidator), 1_000_000 - 303_000);
}
