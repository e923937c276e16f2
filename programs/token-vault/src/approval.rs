//! Structured delegated-approval messages and their verification
//! capability. The ledger only does nonce bookkeeping; recovering a
//! signer from a digest is pluggable so hosts can bring their own
//! signature scheme.

use arrayref::array_refs;
use borsh::{BorshDeserialize, BorshSerialize};
use sha3::{Digest, Keccak256};
use solana_program::{pubkey::Pubkey, secp256k1_recover::secp256k1_recover};

use crate::error::VaultError;

/// Shown by wallets when signing a full-access approval.
pub const APPROVAL_WARNING: &str = "Give FULL access to funds in (and approved to) TokenVault?";
/// Shown when signing a revocation.
pub const REVOKE_WARNING: &str = "Revoke access to TokenVault?";

const DOMAIN_NAME: &str = "TokenVault V1";
const DOMAIN_TYPE: &[u8] = b"EIP712Domain(string name,uint256 chainId,address verifyingContract)";
const APPROVAL_TYPE: &[u8] =
    b"SetMasterContractApproval(string warning,address user,address masterContract,bool approved,uint256 nonce)";

/// A 65-byte recoverable signature in (v, r, s) form. The all-zero value
/// selects the direct caller-is-owner path instead of signature
/// verification.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApprovalSignature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl ApprovalSignature {
    pub fn is_empty(&self) -> bool {
        self.v == 0 && self.r == [0u8; 32] && self.s == [0u8; 32]
    }

    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let (v, r, s) = array_refs![bytes, 1, 32, 32];
        Self { v: v[0], r: *r, s: *s }
    }
}

/// Recover the signing identity for an approval digest.
pub trait ApprovalVerifier {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &ApprovalSignature,
    ) -> Result<Pubkey, VaultError>;
}

/// Production verifier: secp256k1 ECDSA recovery over the keccak digest.
/// Signers are addressed in the ledger as the keccak hash of their
/// recovered 64-byte public key.
pub struct Secp256k1ApprovalVerifier;

impl ApprovalVerifier for Secp256k1ApprovalVerifier {
    fn recover(
        &self,
        digest: &[u8; 32],
        signature: &ApprovalSignature,
    ) -> Result<Pubkey, VaultError> {
        let recovery_id = signature
            .v
            .checked_sub(27)
            .ok_or(VaultError::InvalidSignature)?;
        let mut sig_bytes = [0u8; 64];
        sig_bytes[..32].copy_from_slice(&signature.r);
        sig_bytes[32..].copy_from_slice(&signature.s);
        let pubkey = secp256k1_recover(digest, recovery_id, &sig_bytes)
            .map_err(|_| VaultError::InvalidSignature)?;
        let address: [u8; 32] = Keccak256::digest(pubkey.to_bytes()).into();
        Ok(Pubkey::new_from_array(address))
    }
}

fn keccak(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn domain_separator(chain_id: u64, vault_id: &Pubkey) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(keccak(DOMAIN_TYPE));
    hasher.update(keccak(DOMAIN_NAME.as_bytes()));
    hasher.update(word_u64(chain_id));
    hasher.update(vault_id.as_ref());
    hasher.finalize().into()
}

/// Digest of the structured approval message, bound to this vault's
/// signing domain. The warning string, the acting user, the master
/// contract, the approval direction and the user's current nonce are all
/// part of the signed payload.
pub fn approval_digest(
    chain_id: u64,
    vault_id: &Pubkey,
    user: &Pubkey,
    master: &Pubkey,
    approved: bool,
    nonce: u64,
) -> [u8; 32] {
    let warning = if approved {
        APPROVAL_WARNING
    } else {
        REVOKE_WARNING
    };

    let mut hasher = Keccak256::new();
    hasher.update(keccak(APPROVAL_TYPE));
    hasher.update(keccak(warning.as_bytes()));
    hasher.update(user.as_ref());
    hasher.update(master.as_ref());
    hasher.update(word_u64(approved as u64));
    hasher.update(word_u64(nonce));
    let struct_hash: [u8; 32] = hasher.finalize().into();

    let mut outer = Keccak256::new();
    outer.update([0x19, 0x01]);
    outer.update(domain_separator(chain_id, vault_id));
    outer.update(struct_hash);
    outer.finalize().into()
}
