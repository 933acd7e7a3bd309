// Path: crates/client/src/error.rs
//! The facade-level error type.

use thiserror::Error;

use weft_types::error::{
    CommitError, ConfigError, CryptoError, EndorseError, ErrorCode, EventError, ProposalError,
    TxWaitError,
};

/// Any failure a channel operation can surface to the caller.
///
/// Each variant wraps one kind from the error taxonomy; the structured
/// context (peer endpoints, statuses, validation codes) lives inside the
/// wrapped error.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid or missing proposal input.
    #[error(transparent)]
    Proposal(#[from] ProposalError),
    /// The endorsement plan could not be satisfied.
    #[error(transparent)]
    Endorse(#[from] EndorseError),
    /// The ordering service refused or was unreachable.
    #[error(transparent)]
    Commit(#[from] CommitError),
    /// A block event hub failed.
    #[error(transparent)]
    Event(#[from] EventError),
    /// The commit wait rejected or timed out.
    #[error(transparent)]
    TxWait(#[from] TxWaitError),
    /// A signing or verification operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// The connection profile is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for ClientError {
    fn code(&self) -> &'static str {
        match self {
            Self::Proposal(e) => e.code(),
            Self::Endorse(e) => e.code(),
            Self::Commit(e) => e.code(),
            Self::Event(e) => e.code(),
            Self::TxWait(e) => e.code(),
            Self::Crypto(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }
}
