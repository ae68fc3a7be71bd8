use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Broad failure categories callers can branch on without matching every variant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The lottery is in the wrong state for the requested operation
    PreconditionViolation,
    /// The caller lacks the rights for the operation
    AuthorizationFailure,
    /// An amount, identifier or account did not match what was expected
    ValueMismatch,
    /// The oracle request or a value transfer failed
    ExternalDependencyFailure,
    /// A state-mutating operation was entered while another one was running
    ReentrantCall,
}

/// Errors that may be returned by the Lottery program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LotteryError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstruction,

    /// Entry fee must be positive
    #[error("Entry fee must be greater than zero")]
    InvalidEntryFee,

    /// Only the lottery admin can perform this action
    #[error("Only the lottery admin can perform this action")]
    Unauthorized,

    /// Only the registered oracle can deliver randomness
    #[error("Only the registered oracle can deliver randomness")]
    UnauthorizedOracle,

    #[error("A round is already active")]
    RoundAlreadyActive,

    #[error("Round is not open for entries")]
    RoundNotOpen,

    #[error("Round is not closed and awaiting randomness")]
    RoundNotClosed,

    /// Paid amount differs from the fixed entry fee
    #[error("Paid amount does not match the entry fee")]
    IncorrectFee,

    #[error("Participant ledger is full")]
    LedgerFull,

    #[error("Round has no participants")]
    NoParticipants,

    #[error("A randomness request is already outstanding")]
    RequestAlreadyOutstanding,

    /// The oracle fee could not be paid
    #[error("Insufficient funds to pay the oracle fee")]
    InsufficientOracleFunding,

    /// Request id does not match the pending request
    #[error("Fulfillment does not match the pending request")]
    StaleOrUnknownRequest,

    /// An account the operation needs was not passed to the instruction
    #[error("Required account was not supplied")]
    AccountNotSupplied,

    #[error("Insufficient funds for operation")]
    InsufficientFunds,

    /// The recipient cannot accept the transfer
    #[error("Transfer to recipient failed")]
    TransferFailure,

    #[error("Reentrant call into a state-mutating operation")]
    ReentrantCall,

    #[error("Arithmetic overflow")]
    Overflow,
}

impl LotteryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LotteryError::RoundAlreadyActive
            | LotteryError::RoundNotOpen
            | LotteryError::RoundNotClosed
            | LotteryError::LedgerFull
            | LotteryError::NoParticipants
            | LotteryError::RequestAlreadyOutstanding
            | LotteryError::InsufficientFunds
            | LotteryError::Overflow => ErrorKind::PreconditionViolation,
            LotteryError::Unauthorized | LotteryError::UnauthorizedOracle => {
                ErrorKind::AuthorizationFailure
            }
            LotteryError::InvalidInstruction
            | LotteryError::InvalidEntryFee
            | LotteryError::IncorrectFee
            | LotteryError::StaleOrUnknownRequest
            | LotteryError::AccountNotSupplied => ErrorKind::ValueMismatch,
            LotteryError::InsufficientOracleFunding | LotteryError::TransferFailure => {
                ErrorKind::ExternalDependencyFailure
            }
            LotteryError::ReentrantCall => ErrorKind::ReentrantCall,
        }
    }
}

impl From<LotteryError> for ProgramError {
    fn from(e: LotteryError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
