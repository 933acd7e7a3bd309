// Path: crates/types/src/events.rs
//! Event registration options and transaction validation codes.

use serde::{Deserialize, Serialize};

/// Where a block-delivery subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartPosition {
    /// Start at the newest block the server holds.
    Newest,
    /// Start at the oldest retained block.
    Oldest,
    /// Resume after the last block this hub previously observed, falling
    /// back to `Newest` when the hub has seen nothing yet.
    LastSeen,
    /// Start at an exact block number.
    Exact(u64),
}

/// Where a block-delivery subscription stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndPosition {
    /// Stop after the newest block as resolved by the server when it
    /// receives the registration envelope.
    Newest,
    /// Stop after an exact block number.
    Exact(u64),
}

/// Per-registration listener options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOpts {
    /// Replay start. Only one registration per hub lifetime may set this,
    /// and only before the hub connects.
    pub start_block: Option<StartPosition>,
    /// Replay end. Setting this makes the hub request a bounded stream.
    pub end_block: Option<EndPosition>,
    /// Remove the registration after its terminal delivery.
    pub unregister: bool,
    /// Shut the hub down after this registration's terminal delivery.
    pub disconnect: bool,
}

/// The validation code a committing peer assigns to each transaction in a
/// block, with the symbolic names used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCode {
    Valid,
    NilEnvelope,
    BadPayload,
    BadCommonHeader,
    BadCreatorSignature,
    InvalidEndorserTransaction,
    InvalidConfigTransaction,
    UnsupportedTxPayload,
    BadProposalTxid,
    DuplicateTxid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    UnknownTxType,
    TargetChainNotFound,
    MarshalTxError,
    NilTxaction,
    ExpiredChaincode,
    ChaincodeVersionConflict,
    BadHeaderExtension,
    BadChannelHeader,
    BadResponsePayload,
    BadRwset,
    IllegalWriteset,
    InvalidWriteset,
    InvalidChaincode,
    NotValidated,
    InvalidOtherReason,
    /// A code outside the published set; carried through rather than
    /// dropped so listeners still see the notification.
    Unknown(i32),
}

impl ValidationCode {
    /// Translates the wire integer to its symbolic code.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Valid,
            1 => Self::NilEnvelope,
            2 => Self::BadPayload,
            3 => Self::BadCommonHeader,
            4 => Self::BadCreatorSignature,
            5 => Self::InvalidEndorserTransaction,
            6 => Self::InvalidConfigTransaction,
            7 => Self::UnsupportedTxPayload,
            8 => Self::BadProposalTxid,
            9 => Self::DuplicateTxid,
            10 => Self::EndorsementPolicyFailure,
            11 => Self::MvccReadConflict,
            12 => Self::PhantomReadConflict,
            13 => Self::UnknownTxType,
            14 => Self::TargetChainNotFound,
            15 => Self::MarshalTxError,
            16 => Self::NilTxaction,
            17 => Self::ExpiredChaincode,
            18 => Self::ChaincodeVersionConflict,
            19 => Self::BadHeaderExtension,
            20 => Self::BadChannelHeader,
            21 => Self::BadResponsePayload,
            22 => Self::BadRwset,
            23 => Self::IllegalWriteset,
            24 => Self::InvalidWriteset,
            25 => Self::InvalidChaincode,
            254 => Self::NotValidated,
            255 => Self::InvalidOtherReason,
            other => Self::Unknown(other),
        }
    }

    /// The symbolic name forwarded to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::NilEnvelope => "NIL_ENVELOPE",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::BadCommonHeader => "BAD_COMMON_HEADER",
            Self::BadCreatorSignature => "BAD_CREATOR_SIGNATURE",
            Self::InvalidEndorserTransaction => "INVALID_ENDORSER_TRANSACTION",
            Self::InvalidConfigTransaction => "INVALID_CONFIG_TRANSACTION",
            Self::UnsupportedTxPayload => "UNSUPPORTED_TX_PAYLOAD",
            Self::BadProposalTxid => "BAD_PROPOSAL_TXID",
            Self::DuplicateTxid => "DUPLICATE_TXID",
            Self::EndorsementPolicyFailure => "ENDORSEMENT_POLICY_FAILURE",
            Self::MvccReadConflict => "MVCC_READ_CONFLICT",
            Self::PhantomReadConflict => "PHANTOM_READ_CONFLICT",
            Self::UnknownTxType => "UNKNOWN_TX_TYPE",
            Self::TargetChainNotFound => "TARGET_CHAIN_NOT_FOUND",
            Self::MarshalTxError => "MARSHAL_TX_ERROR",
            Self::NilTxaction => "NIL_TXACTION",
            Self::ExpiredChaincode => "EXPIRED_CHAINCODE",
            Self::ChaincodeVersionConflict => "CHAINCODE_VERSION_CONFLICT",
            Self::BadHeaderExtension => "BAD_HEADER_EXTENSION",
            Self::BadChannelHeader => "BAD_CHANNEL_HEADER",
            Self::BadResponsePayload => "BAD_RESPONSE_PAYLOAD",
            Self::BadRwset => "BAD_RWSET",
            Self::IllegalWriteset => "ILLEGAL_WRITESET",
            Self::InvalidWriteset => "INVALID_WRITESET",
            Self::InvalidChaincode => "INVALID_CHAINCODE",
            Self::NotValidated => "NOT_VALIDATED",
            Self::InvalidOtherReason => "INVALID_OTHER_REASON",
            Self::Unknown(_) => "UNKNOWN_VALIDATION_CODE",
        }
    }

    /// Whether the transaction committed successfully.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "UNKNOWN_VALIDATION_CODE({})", code),
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip_to_symbolic_names() {
        assert_eq!(ValidationCode::from_i32(0), ValidationCode::Valid);
        assert_eq!(
            ValidationCode::from_i32(11).as_str(),
            "MVCC_READ_CONFLICT"
        );
        assert!(ValidationCode::from_i32(0).is_valid());
        assert!(!ValidationCode::from_i32(10).is_valid());
    }

    #[test]
    fn out_of_range_codes_are_preserved() {
        let code = ValidationCode::from_i32(99);
        assert_eq!(code, ValidationCode::Unknown(99));
        assert_eq!(code.to_string(), "UNKNOWN_VALIDATION_CODE(99)");
    }
}
