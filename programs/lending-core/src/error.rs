use solana_program::program_error::ProgramError;
use thiserror::Error;
use token_vault::error::VaultError;
use token_vault::math::MathError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Market not found")]
    MarketNotFound,

    #[error("Market already exists")]
    MarketAlreadyExists,

    #[error("User is insolvent")]
    Insolvent,

    #[error("No valid exchange rate has been cached")]
    StalePrice,

    #[error("None of the listed users is insolvent")]
    InsolvencyNotFound,

    #[error("Unknown cook action tag {0}")]
    UnknownAction(u8),

    #[error("Invalid payload for cook action tag {0}")]
    InvalidActionData(u8),

    #[error("Parallel cook arrays differ in length")]
    LengthMismatch,

    #[error("Unexpected attached value")]
    UnexpectedValue,

    #[error("Cook action {index} failed: {source}")]
    ActionFailed {
        index: u8,
        source: Box<LendingError>,
    },

    #[error("Skimmed shares exceed the market's surplus")]
    SkimTooMuch,

    #[error("Position not found")]
    PositionNotFound,

    #[error("Position already open")]
    PositionAlreadyOpen,

    #[error("Position still carries debt")]
    PositionNotEmpty,

    #[error("Caller does not own this position")]
    NotPositionOwner,

    #[error("Collection not supported by the price helper")]
    CollectionNotSupported,

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Vault: {0}")]
    Vault(#[from] VaultError),
}

impl LendingError {
    /// Stable error codes; vault errors keep their own range below 100.
    pub fn code(&self) -> u32 {
        match self {
            LendingError::Vault(e) => *e as u32,
            LendingError::InvalidInstruction => 100,
            LendingError::Unauthorized => 101,
            LendingError::MarketNotFound => 102,
            LendingError::MarketAlreadyExists => 103,
            LendingError::Insolvent => 104,
            LendingError::StalePrice => 105,
            LendingError::InsolvencyNotFound => 106,
            LendingError::UnknownAction(_) => 107,
            LendingError::InvalidActionData(_) => 108,
            LendingError::LengthMismatch => 109,
            LendingError::UnexpectedValue => 110,
            LendingError::ActionFailed { .. } => 111,
            LendingError::SkimTooMuch => 112,
            LendingError::PositionNotFound => 113,
            LendingError::PositionAlreadyOpen => 114,
            LendingError::PositionNotEmpty => 115,
            LendingError::NotPositionOwner => 116,
            LendingError::CollectionNotSupported => 117,
            LendingError::ArithmeticOverflow => 118,
        }
    }

    /// The failure a cook batch ultimately aborted on, unwrapped.
    pub fn root_cause(&self) -> &LendingError {
        match self {
            LendingError::ActionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<LendingError> for ProgramError {
    fn from(e: LendingError) -> Self {
        ProgramError::Custom(e.code())
    }
}

impl From<MathError> for LendingError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::Overflow => LendingError::ArithmeticOverflow,
            MathError::DivisionByZero => LendingError::ArithmeticOverflow,
        }
    }
}
