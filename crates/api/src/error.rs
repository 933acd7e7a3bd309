// Path: crates/api/src/error.rs
// Re-export all core error types from the central types crate.
pub use weft_types::error::{
    CommitError, ConfigError, CryptoError, EndorseError, ErrorCode, EventError, ProposalError,
    TxWaitError, WalletError,
};
