// Path: crates/types/src/identity.rs
//! Client identities and transaction ids.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProposalError;

/// An opaque handle to a private key held inside a crypto suite.
///
/// The handle is the only representation of key material that ever leaves
/// the suite; the key bytes themselves stay behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyHandle(pub u64);

/// A ledger identity: an MSP namespace, a PEM-encoded certificate, and a
/// handle to the private signing key registered with the crypto suite.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The membership-service-provider id this identity belongs to.
    pub msp_id: String,
    /// The PEM-encoded X.509 certificate.
    pub certificate: Vec<u8>,
    /// Handle to the private key inside the crypto suite.
    pub key: KeyHandle,
}

impl Identity {
    /// Returns the certificate PEM as a string slice, if it is valid UTF-8.
    pub fn certificate_pem(&self) -> Option<&str> {
        std::str::from_utf8(&self.certificate).ok()
    }
}

/// The persistable form of an identity, as stored in a wallet.
///
/// Unlike [`Identity`] this carries the private key PEM; it exists only at
/// the wallet boundary and is re-imported into a crypto suite on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// The membership-service-provider id.
    pub msp_id: String,
    /// The PEM-encoded X.509 certificate.
    pub certificate_pem: String,
    /// The PKCS#8 PEM-encoded private key.
    pub private_key_pem: String,
}

/// A transaction id: the lowercase hex digest of `nonce || creator_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps a digest computed by the configured crypto suite.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Parses an id from its hex string form.
    ///
    /// Fails with [`ProposalError::MissingTxId`] on an empty string so that
    /// a blank id is caught before it reaches the wire.
    pub fn parse(s: &str) -> Result<Self, ProposalError> {
        if s.is_empty() {
            return Err(ProposalError::MissingTxId);
        }
        Ok(Self(s.to_string()))
    }

    /// The hex string form sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
