use num_derive::FromPrimitive;
use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, FromPrimitive, PartialEq, Eq)]
pub enum VaultError {
    #[error("Invalid instruction")]
    InvalidInstruction = 0,

    #[error("Unauthorized")]
    Unauthorized = 1,

    #[error("Insufficient share balance")]
    InsufficientBalance = 2,

    #[error("Caller not approved to act on these funds")]
    TransferNotApproved = 3,

    #[error("Master contract not whitelisted")]
    NotWhitelisted = 4,

    #[error("Invalid approval signature")]
    InvalidSignature = 5,

    #[error("Approval nonce mismatch")]
    NonceMismatch = 6,

    #[error("Invalid user")]
    InvalidUser = 7,

    #[error("Master contract not set")]
    MasterContractNotSet = 8,

    #[error("Clone already deployed")]
    CloneAlreadyDeployed = 9,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow = 10,

    #[error("Division by zero")]
    DivisionByZero = 11,

    #[error("Account already initialized")]
    AlreadyInitialized = 12,

    #[error("Account not initialized")]
    NotInitialized = 13,
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for VaultError {
    fn type_of() -> &'static str {
        "VaultError"
    }
}

impl From<crate::math::MathError> for VaultError {
    fn from(e: crate::math::MathError) -> Self {
        match e {
            crate::math::MathError::Overflow => VaultError::ArithmeticOverflow,
            crate::math::MathError::DivisionByZero => VaultError::DivisionByZero,
        }
    }
}
