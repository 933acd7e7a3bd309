// Path: crates/api/src/lib.rs
//! # weft-api
//!
//! Capability traits consumed and produced at the seams of the client: the
//! crypto suite, the identity wallet, service discovery, and the pluggable
//! endorse/commit/event-strategy handlers. Default implementations live in
//! sibling crates (`weft-crypto`, `weft-client`); anything that satisfies a
//! trait here can be injected per channel.

pub mod crypto;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod strategy;
pub mod wallet;

pub use crypto::CryptoSuite;
pub use discovery::{Discovery, PlanHint};
pub use handler::{CommitHandler, EndorsementHandler};
pub use strategy::{EventStrategyFactory, HubIdentity, TxEventStrategy};
pub use wallet::Wallet;
