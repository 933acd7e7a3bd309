// Path: crates/api/src/crypto.rs
//! The cryptographic suite injected per channel.

use weft_types::error::CryptoError;
use weft_types::identity::KeyHandle;

/// A pluggable cryptographic suite.
///
/// Implementations must be safe for concurrent use: `sign` may be invoked
/// from many tasks at once with the same handle, so any non-reentrant
/// backing handle (an HSM session, for instance) has to be guarded
/// internally. Private key material never crosses this interface; callers
/// hold only [`KeyHandle`]s.
pub trait CryptoSuite: Send + Sync {
    /// Imports a PKCS#8 PEM-encoded private key and returns a handle to it.
    fn import_key(&self, pkcs8_pem: &str) -> Result<KeyHandle, CryptoError>;

    /// Signs a digest with the key behind `handle`.
    ///
    /// For ECDSA keys the signature must be DER-encoded with `s` normalized
    /// to the lower half-order, so two signers cannot produce distinct valid
    /// encodings of the same signature.
    fn sign(&self, handle: KeyHandle, digest: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Verifies a signature over `digest` against the public key in a
    /// PEM-encoded certificate.
    fn verify(
        &self,
        certificate_pem: &[u8],
        signature: &[u8],
        digest: &[u8],
    ) -> Result<bool, CryptoError>;

    /// The configured digest over arbitrary bytes.
    fn hash(&self, bytes: &[u8]) -> Vec<u8>;
}
