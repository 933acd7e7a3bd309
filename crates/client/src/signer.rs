// Path: crates/client/src/signer.rs
//! Header material and payload signing for one identity.

use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;

use weft_api::CryptoSuite;
use weft_proto::common::SerializedIdentity;
use weft_types::codec;
use weft_types::error::CryptoError;
use weft_types::identity::{Identity, TransactionId};

/// Bytes of fresh randomness per proposal nonce.
const NONCE_LEN: usize = 24;

/// Signs byte payloads with an identity's key and produces the
/// creator + nonce pair carried in signature headers.
///
/// The signer is a thin, concurrency-safe wrapper over the injected crypto
/// suite; it holds no per-call state and can be shared across submits.
#[derive(Clone)]
pub struct Signer {
    suite: Arc<dyn CryptoSuite>,
}

impl Signer {
    pub fn new(suite: Arc<dyn CryptoSuite>) -> Self {
        Self { suite }
    }

    /// The crypto suite backing this signer.
    pub fn suite(&self) -> &Arc<dyn CryptoSuite> {
        &self.suite
    }

    /// Fresh random bytes for one proposal.
    pub fn new_nonce(&self) -> Vec<u8> {
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// The canonical creator bytes for `identity`: its MSP id plus
    /// certificate, serialized as a `SerializedIdentity`.
    pub fn serialize_creator(&self, identity: &Identity) -> Vec<u8> {
        let creator = SerializedIdentity {
            msp_id: identity.msp_id.clone(),
            id_bytes: identity.certificate.clone(),
        };
        codec::to_bytes_canonical(&creator)
    }

    /// Derives the transaction id for a (nonce, creator) pair:
    /// `hash(nonce || creator_bytes)` under the configured digest.
    pub fn transaction_id(&self, nonce: &[u8], creator: &[u8]) -> TransactionId {
        let mut preimage = Vec::with_capacity(nonce.len() + creator.len());
        preimage.extend_from_slice(nonce);
        preimage.extend_from_slice(creator);
        TransactionId::from_digest(&self.suite.hash(&preimage))
    }

    /// Signs `payload` with the identity's key: the payload is digested and
    /// the digest signed by the suite.
    pub fn sign(&self, identity: &Identity, payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let digest = self.suite.hash(payload);
        self.suite.sign(identity.key, &digest)
    }

    /// The configured digest over arbitrary bytes.
    pub fn hash(&self, bytes: &[u8]) -> Vec<u8> {
        self.suite.hash(bytes)
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_crypto::SoftwareCryptoSuite;

    fn test_signer() -> (Signer, Identity) {
        let certified =
            rcgen::generate_simple_self_signed(vec!["client.org1".to_string()]).expect("cert");
        let suite = Arc::new(SoftwareCryptoSuite::new());
        let handle = suite.import_key(&certified.key_pair.serialize_pem()).expect("import");
        let identity = Identity {
            msp_id: "Org1MSP".to_string(),
            certificate: certified.cert.pem().into_bytes(),
            key: handle,
        };
        (Signer::new(suite), identity)
    }

    #[test]
    fn nonces_are_fresh_and_sized() {
        let (signer, _) = test_signer();
        let a = signer.new_nonce();
        let b = signer.new_nonce();
        assert_eq!(a.len(), NONCE_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn transaction_id_depends_on_nonce_and_creator() {
        let (signer, identity) = test_signer();
        let creator = signer.serialize_creator(&identity);
        let id_a = signer.transaction_id(&[1, 2, 3], &creator);
        let id_b = signer.transaction_id(&[1, 2, 4], &creator);
        assert_ne!(id_a, id_b);
        // Same inputs, same id.
        assert_eq!(signer.transaction_id(&[1, 2, 3], &creator), id_a);
    }

    #[test]
    fn signed_payload_verifies_against_certificate() {
        let (signer, identity) = test_signer();
        let payload = b"proposal bytes";
        let sig = signer.sign(&identity, payload).expect("sign");
        let digest = signer.hash(payload);
        assert!(signer
            .suite()
            .verify(&identity.certificate, &sig, &digest)
            .expect("verify"));
    }
}
