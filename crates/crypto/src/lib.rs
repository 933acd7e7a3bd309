// Path: crates/crypto/src/lib.rs
//! # weft-crypto
//!
//! Default implementations of the crypto and wallet seams: a software ECDSA
//! P-256 suite (SHA-256 digests, DER signatures normalized to low-S, PKCS#8
//! key import) and file/in-memory identity wallets. Private keys are held
//! behind opaque handles inside the suite and zeroized when the suite is
//! dropped; nothing outside this crate ever sees key bytes.

pub mod suite;
pub mod wallet;

pub use suite::SoftwareCryptoSuite;
pub use wallet::{enroll, FileWallet, MemoryWallet};
