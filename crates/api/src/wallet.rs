// Path: crates/api/src/wallet.rs
//! Identity persistence.

use weft_types::error::WalletError;
use weft_types::identity::IdentityRecord;

/// A labeled store of enrollable identities.
///
/// Records carry PEM key material; callers re-import a record into a
/// [`crate::CryptoSuite`] to obtain a usable identity.
pub trait Wallet: Send + Sync {
    /// Fetches the record stored under `label`.
    fn get(&self, label: &str) -> Result<IdentityRecord, WalletError>;

    /// Stores `record` under `label`, replacing any existing record.
    fn put(&self, label: &str, record: &IdentityRecord) -> Result<(), WalletError>;

    /// Lists all stored labels.
    fn list(&self) -> Result<Vec<String>, WalletError>;

    /// Removes the record stored under `label`.
    fn remove(&self, label: &str) -> Result<(), WalletError>;
}
