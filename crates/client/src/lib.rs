// Path: crates/client/src/lib.rs
//! # weft-client Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # weft-client
//!
//! The client core: builds and signs proposals, runs the endorsement plan
//! against peers, broadcasts the endorsed envelope to orderers with
//! failover, and observes commits over long-lived block-delivery streams.

pub mod channel;
pub mod commit;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod endorse;
pub mod error;
pub mod events;
pub mod proposal;
pub mod signer;

// Re-export for convenience
pub use channel::{Channel, ChannelBuilder};
pub use commit::CommitCoordinator;
pub use endorse::EndorsementCoordinator;
pub use error::ClientError;
pub use events::hub::BlockEventHub;
pub use events::tx_handler::TransactionEventHandler;
pub use proposal::{ProposalBuilder, TransactionProposal};
pub use signer::Signer;
