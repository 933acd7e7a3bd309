// Path: crates/proto/src/lib.rs
//! # weft-proto
//!
//! Generated wire types and gRPC stubs for the ledger's published schemas.
//! The client must interoperate bit-exactly with replicas: fields, tags and
//! ordering here match the platform's canonical encoding so that a proposal
//! hash computed independently by a replica matches the client's.

// Re-export the generated Protobuf/Tonic code.
// Each package is nested inside `v1` to match the proto package hierarchy
// (`weft.common.v1` and friends) so that cross-package references generated
// by prost (`super::super::common::v1::...`) resolve correctly.

pub mod common {
    pub mod v1 {
        tonic::include_proto!("weft.common.v1");
    }
    // Flatten the API for users.
    pub use v1::*;
}

pub mod peer {
    pub mod v1 {
        tonic::include_proto!("weft.peer.v1");
    }
    pub use v1::*;
}

pub mod orderer {
    pub mod v1 {
        tonic::include_proto!("weft.orderer.v1");
    }
    pub use v1::*;
}

/// The symbolic name of a `common.Status` wire value, or `"UNKNOWN"` for
/// values outside the published set.
pub fn status_name(status: i32) -> &'static str {
    common::Status::try_from(status)
        .map(|s| s.as_str_name())
        .unwrap_or("UNKNOWN")
}
