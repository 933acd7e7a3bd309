// Path: crates/types/src/codec.rs
//! Canonical binary codec helpers.
//!
//! All wire structures the client signs or hashes are protobuf messages, and
//! the encoding must be byte-for-byte stable so that a replica hashing the
//! same message independently arrives at the same digest. `prost` encodes
//! fields in tag order with deterministic varint framing, which gives us the
//! stability we need; these wrappers centralize the encode/decode calls so
//! every component uses the same entry point.

use prost::Message;

/// Encodes a message into its canonical byte representation.
pub fn to_bytes_canonical<T: Message>(v: &T) -> Vec<u8> {
    v.encode_to_vec()
}

/// Decodes a message from its canonical byte representation, failing fast on
/// malformed or trailing bytes.
pub fn from_bytes_canonical<T: Message + Default>(b: &[u8]) -> Result<T, String> {
    T::decode(b).map_err(|e| format!("canonical decode failed: {}", e))
}
