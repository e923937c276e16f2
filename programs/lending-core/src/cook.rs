//! The batched action interpreter.
//!
//! A cook call carries three parallel ordered sequences: raw action tags,
//! attached native-currency values and borsh payload blobs. Everything is
//! decoded into the closed `CookAction` enum before execution begins, so
//! payload shapes are checked up front and every tag is handled
//! exhaustively. Execution runs against a scratch copy of market and
//! vault: success commits, any failure discards the whole batch.

use borsh::{BorshDeserialize, BorshSerialize};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;
use solana_program::pubkey::Pubkey;
use token_vault::approval::{ApprovalSignature, ApprovalVerifier};
use token_vault::state::{Vault, NATIVE_TOKEN};

use crate::error::LendingError;
use crate::oracle::ExchangeRateSource;
use crate::state::Market;

/// Wire tags, kept compatible with the historical numbering.
#[derive(FromPrimitive, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionTag {
    Repay = 2,
    RemoveCollateral = 4,
    Borrow = 5,
    Accrue = 8,
    AddCollateral = 10,
    UpdateExchangeRate = 11,
    VaultDeposit = 20,
    VaultWithdraw = 21,
    VaultTransfer = 22,
    SetMasterContractApproval = 24,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RepayCall {
    pub part: u128,
    pub to: Pubkey,
    pub skim: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct RemoveCollateralCall {
    pub share: u128,
    pub to: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct BorrowCall {
    pub amount: u128,
    pub to: Pubkey,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct AddCollateralCall {
    pub share: u128,
    pub to: Pubkey,
    pub skim: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct VaultDepositCall {
    pub token: Pubkey,
    pub to: Pubkey,
    pub amount: u128,
    pub share: u128,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct VaultWithdrawCall {
    pub token: Pubkey,
    pub to: Pubkey,
    pub amount: u128,
    pub share: u128,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct VaultTransferCall {
    pub token: Pubkey,
    pub to: Pubkey,
    pub share: u128,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct SetApprovalCall {
    pub user: Pubkey,
    pub master_contract: Pubkey,
    pub approved: bool,
    pub nonce: u64,
    pub signature: ApprovalSignature,
}

/// One decoded cook step.
#[derive(Clone, Debug, PartialEq)]
pub enum CookAction {
    Repay(RepayCall),
    RemoveCollateral(RemoveCollateralCall),
    Borrow(BorrowCall),
    Accrue,
    UpdateExchangeRate,
    VaultDeposit(VaultDepositCall),
    VaultWithdraw(VaultWithdrawCall),
    VaultTransfer(VaultTransferCall),
    AddCollateral(AddCollateralCall),
    SetMasterContractApproval(SetApprovalCall),
}

impl CookAction {
    pub fn decode(tag: u8, data: &[u8]) -> Result<Self, LendingError> {
        let action_tag = ActionTag::from_u8(tag).ok_or(LendingError::UnknownAction(tag))?;
        let invalid = || LendingError::InvalidActionData(tag);
        Ok(match action_tag {
            ActionTag::Repay => {
                Self::Repay(RepayCall::try_from_slice(data).map_err(|_| invalid())?)
            }
            ActionTag::RemoveCollateral => Self::RemoveCollateral(
                RemoveCollateralCall::try_from_slice(data).map_err(|_| invalid())?,
            ),
            ActionTag::Borrow => {
                Self::Borrow(BorrowCall::try_from_slice(data).map_err(|_| invalid())?)
            }
            ActionTag::Accrue => Self::Accrue,
            ActionTag::AddCollateral => Self::AddCollateral(
                AddCollateralCall::try_from_slice(data).map_err(|_| invalid())?,
            ),
            ActionTag::UpdateExchangeRate => Self::UpdateExchangeRate,
            ActionTag::VaultDeposit => {
                Self::VaultDeposit(VaultDepositCall::try_from_slice(data).map_err(|_| invalid())?)
            }
            ActionTag::VaultWithdraw => Self::VaultWithdraw(
                VaultWithdrawCall::try_from_slice(data).map_err(|_| invalid())?,
            ),
            ActionTag::VaultTransfer => Self::VaultTransfer(
                VaultTransferCall::try_from_slice(data).map_err(|_| invalid())?,
            ),
            ActionTag::SetMasterContractApproval => Self::SetMasterContractApproval(
                SetApprovalCall::try_from_slice(data).map_err(|_| invalid())?,
            ),
        })
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Repay(_) => ActionTag::Repay as u8,
            Self::RemoveCollateral(_) => ActionTag::RemoveCollateral as u8,
            Self::Borrow(_) => ActionTag::Borrow as u8,
            Self::Accrue => ActionTag::Accrue as u8,
            Self::AddCollateral(_) => ActionTag::AddCollateral as u8,
            Self::UpdateExchangeRate => ActionTag::UpdateExchangeRate as u8,
            Self::VaultDeposit(_) => ActionTag::VaultDeposit as u8,
            Self::VaultWithdraw(_) => ActionTag::VaultWithdraw as u8,
            Self::VaultTransfer(_) => ActionTag::VaultTransfer as u8,
            Self::SetMasterContractApproval(_) => ActionTag::SetMasterContractApproval as u8,
        }
    }
}

/// Result row of one executed action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionResult {
    pub amount: u128,
    pub share: u128,
}

/// Execute a batch atomically. `values[i]` is the native amount attached
/// to step `i`; a non-zero value is only legal on a native-token vault
/// deposit. Borrow-affecting steps are solvency-checked once at the end
/// of the batch, so a batch may pass through transiently unsafe states.
#[allow(clippy::too_many_arguments)]
pub fn cook(
    market: &mut Market,
    vault: &mut Vault,
    caller: &Pubkey,
    now: u64,
    tags: &[u8],
    values: &[u64],
    datas: &[Vec<u8>],
    verifier: &dyn ApprovalVerifier,
    oracle: &mut dyn ExchangeRateSource,
) -> Result<Vec<ActionResult>, LendingError> {
    if tags.len() != values.len() || tags.len() != datas.len() {
        return Err(LendingError::LengthMismatch);
    }

    let mut actions = Vec::with_capacity(tags.len());
    for (i, (tag, data)) in tags.iter().zip(datas).enumerate() {
        let action = CookAction::decode(*tag, data).map_err(|e| LendingError::ActionFailed {
            index: i as u8,
            source: Box::new(e),
        })?;
        actions.push(action);
    }

    let mut scratch_market = market.clone();
    let mut scratch_vault = vault.clone();
    let mut results = Vec::with_capacity(actions.len());
    let mut check_solvency: Vec<Pubkey> = Vec::new();

    for (i, (action, value)) in actions.into_iter().zip(values).enumerate() {
        let result = execute(
            &mut scratch_market,
            &mut scratch_vault,
            caller,
            now,
            action,
            *value,
            verifier,
            oracle,
            &mut check_solvency,
        )
        .map_err(|e| LendingError::ActionFailed {
            index: i as u8,
            source: Box::new(e),
        })?;
        results.push(result);
    }

    for user in &check_solvency {
        scratch_market.require_solvent(&scratch_vault, user)?;
    }

    *market = scratch_market;
    *vault = scratch_vault;
    Ok(results)
}

#[allow(clippy::too_many_arguments)]
fn execute(
    market: &mut Market,
    vault: &mut Vault,
    caller: &Pubkey,
    now: u64,
    action: CookAction,
    value: u64,
    verifier: &dyn ApprovalVerifier,
    oracle: &mut dyn ExchangeRateSource,
    check_solvency: &mut Vec<Pubkey>,
) -> Result<ActionResult, LendingError> {
    if value != 0 && !matches!(action, CookAction::VaultDeposit(_)) {
        return Err(LendingError::UnexpectedValue);
    }

    match action {
        CookAction::Accrue => {
            market.accrue(now)?;
            Ok(ActionResult::default())
        }
        CookAction::UpdateExchangeRate => {
            let (updated, rate) = market.update_exchange_rate(oracle);
            Ok(ActionResult {
                amount: rate,
                share: updated as u128,
            })
        }
        CookAction::SetMasterContractApproval(call) => {
            vault.set_master_contract_approval(
                caller,
                &call.user,
                &call.master_contract,
                call.approved,
                call.nonce,
                &call.signature,
                verifier,
            )?;
            Ok(ActionResult::default())
        }
        CookAction::VaultDeposit(call) => {
            if call.token == NATIVE_TOKEN {
                if call.share != 0 || u128::from(value) != call.amount {
                    return Err(LendingError::UnexpectedValue);
                }
            } else if value != 0 {
                return Err(LendingError::UnexpectedValue);
            }
            let (amount, share) =
                vault.deposit(caller, &call.token, caller, &call.to, call.amount, call.share)?;
            Ok(ActionResult { amount, share })
        }
        CookAction::VaultWithdraw(call) => {
            let (amount, share) =
                vault.withdraw(caller, &call.token, caller, &call.to, call.amount, call.share)?;
            Ok(ActionResult { amount, share })
        }
        CookAction::VaultTransfer(call) => {
            vault.transfer(caller, &call.token, caller, &call.to, call.share)?;
            Ok(ActionResult {
                amount: 0,
                share: call.share,
            })
        }
        CookAction::AddCollateral(call) => {
            market.add_collateral(vault, caller, &call.to, call.share, call.skim)?;
            Ok(ActionResult {
                amount: 0,
                share: call.share,
            })
        }
        CookAction::RemoveCollateral(call) => {
            market.remove_collateral(vault, caller, &call.to, call.share, now)?;
            if !check_solvency.contains(caller) {
                check_solvency.push(*caller);
            }
            Ok(ActionResult {
                amount: 0,
                share: call.share,
            })
        }
        CookAction::Borrow(call) => {
            let (part, share) = market.borrow(vault, caller, &call.to, call.amount, now)?;
            if !check_solvency.contains(caller) {
                check_solvency.push(*caller);
            }
            Ok(ActionResult {
                amount: part,
                share,
            })
        }
        CookAction::Repay(call) => {
            let amount = market.repay(vault, caller, &call.to, call.part, call.skim, now)?;
            Ok(ActionResult {
                amount,
                share: call.part,
            })
        }
    }
}
