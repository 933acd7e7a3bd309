// Path: crates/crypto/src/suite.rs
//! Software ECDSA P-256 implementation of the crypto suite.

use dashmap::DashMap;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use x509_cert::der::Decode;

use weft_api::CryptoSuite;
use weft_types::error::CryptoError;
use weft_types::identity::KeyHandle;

/// A software crypto suite over NIST P-256 and SHA-256.
///
/// Keys imported into the suite are kept in an internal registry and
/// addressed by handle only. Signing uses RFC 6979 deterministic nonces and
/// normalizes `s` to the lower half-order, so a given (key, digest) pair has
/// exactly one valid signature encoding.
#[derive(Debug, Default)]
pub struct SoftwareCryptoSuite {
    keys: DashMap<u64, SigningKey>,
    next_handle: AtomicU64,
}

impl SoftwareCryptoSuite {
    /// Creates an empty suite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an already-parsed signing key and returns its handle.
    pub fn register_key(&self, key: SigningKey) -> KeyHandle {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.keys.insert(id, key);
        KeyHandle(id)
    }

    fn certificate_verifying_key(certificate_pem: &[u8]) -> Result<VerifyingKey, CryptoError> {
        let mut reader = std::io::BufReader::new(certificate_pem);
        let der = rustls_pemfile::certs(&mut reader)
            .next()
            .ok_or_else(|| CryptoError::Pem("no certificate in PEM input".to_string()))?
            .map_err(|e| CryptoError::Pem(e.to_string()))?;
        let cert = x509_cert::Certificate::from_der(der.as_ref())
            .map_err(|e| CryptoError::InvalidKey(format!("certificate parse failed: {}", e)))?;
        let spki = &cert.tbs_certificate.subject_public_key_info;
        VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("unsupported public key: {}", e)))
    }
}

impl CryptoSuite for SoftwareCryptoSuite {
    fn import_key(&self, pkcs8_pem: &str) -> Result<KeyHandle, CryptoError> {
        let key = SigningKey::from_pkcs8_pem(pkcs8_pem)
            .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 parse failed: {}", e)))?;
        Ok(self.register_key(key))
    }

    fn sign(&self, handle: KeyHandle, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let key = self.keys.get(&handle.0).ok_or(CryptoError::UnknownKey)?;
        let sig: Signature = key
            .sign_prehash(digest)
            .map_err(|e| CryptoError::OperationFailed(format!("signing failed: {}", e)))?;
        // Reject the malleable high-s encoding.
        let sig = sig.normalize_s().unwrap_or(sig);
        Ok(sig.to_der().as_bytes().to_vec())
    }

    fn verify(
        &self,
        certificate_pem: &[u8],
        signature: &[u8],
        digest: &[u8],
    ) -> Result<bool, CryptoError> {
        let vk = Self::certificate_verifying_key(certificate_pem)?;
        let sig = Signature::from_der(signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("DER parse failed: {}", e)))?;
        Ok(vk.verify_prehash(digest, &sig).is_ok())
    }

    fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        Sha256::digest(bytes).to_vec()
    }
}
