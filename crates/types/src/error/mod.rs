// Path: crates/types/src/error/mod.rs
//! Core error types for the weft client.

use thiserror::Error;

use crate::events::ValidationCode;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised while building a proposal. These are invalid-argument
/// errors: reported synchronously and never retried.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// No chaincode id was supplied.
    #[error("Missing chaincode id")]
    MissingChaincodeId,
    /// No channel id was supplied for a chaincode that requires one.
    #[error("Missing channel id for chaincode {0:?}")]
    MissingChannelId(String),
    /// The transaction id was empty.
    #[error("Missing transaction id")]
    MissingTxId,
    /// The nonce was empty.
    #[error("Missing nonce")]
    MissingNonce,
    /// Serializing a wire structure failed.
    #[error("Failed to encode proposal: {0}")]
    Encode(String),
}

impl ErrorCode for ProposalError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingChaincodeId => "PROPOSAL_MISSING_CHAINCODE_ID",
            Self::MissingChannelId(_) => "PROPOSAL_MISSING_CHANNEL_ID",
            Self::MissingTxId => "PROPOSAL_MISSING_TX_ID",
            Self::MissingNonce => "PROPOSAL_MISSING_NONCE",
            Self::Encode(_) => "PROPOSAL_ENCODE_FAILED",
        }
    }
}

/// Errors raised while running an endorsement plan.
///
/// `Clone` because per-peer outcomes are memoized and replayed to sibling
/// groups and later layouts within one `endorse` call.
#[derive(Debug, Error, Clone)]
pub enum EndorseError {
    /// The plan itself is malformed.
    #[error("Invalid endorsement plan: {0}")]
    InvalidPlan(String),
    /// One peer failed to endorse. Recorded per peer; surfaced only when the
    /// whole plan fails.
    #[error("Peer {endpoint} failed to endorse: {message}")]
    PeerFailure {
        /// The endpoint of the failing peer.
        endpoint: String,
        /// The server-side message or transport error.
        message: String,
    },
    /// A peer answered, but the response failed client-side validation.
    #[error("Peer {endpoint} returned a bad endorsement: {message}")]
    BadResponse {
        /// The endpoint of the peer.
        endpoint: String,
        /// What was wrong with the response.
        message: String,
    },
    /// An endorsement attempt exceeded its deadline.
    #[error("Endorsement timed out against peer {endpoint}")]
    Timeout {
        /// The endpoint of the peer that timed out.
        endpoint: String,
    },
    /// No layout could be satisfied.
    #[error("No endorsement layout could be satisfied ({} failures)", failures.len())]
    PlanUnsatisfied {
        /// The per-peer failures from the final round.
        failures: Vec<EndorseError>,
    },
}

impl ErrorCode for EndorseError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPlan(_) => "ENDORSE_INVALID_PLAN",
            Self::PeerFailure { .. } => "ENDORSE_PEER_FAILURE",
            Self::BadResponse { .. } => "ENDORSE_BAD_RESPONSE",
            Self::Timeout { .. } => "ENDORSE_TIMEOUT",
            Self::PlanUnsatisfied { .. } => "ENDORSE_PLAN_UNSATISFIED",
        }
    }
}

/// Errors raised while broadcasting an envelope to the ordering service.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The channel has no orderers configured.
    #[error("No orderers configured for channel")]
    NoOrderers,
    /// An orderer refused the envelope with a non-success status.
    #[error("Orderer {endpoint} rejected broadcast: {status}")]
    Rejected {
        /// The orderer's endpoint.
        endpoint: String,
        /// The symbolic status the orderer returned.
        status: String,
    },
    /// The broadcast could not reach the orderer.
    #[error("Broadcast to orderer {endpoint} failed: {message}")]
    Transport {
        /// The orderer's endpoint.
        endpoint: String,
        /// The transport-level error.
        message: String,
    },
    /// The broadcast exceeded its deadline.
    #[error("Broadcast to orderer {endpoint} timed out")]
    Timeout {
        /// The orderer's endpoint.
        endpoint: String,
    },
}

impl ErrorCode for CommitError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoOrderers => "COMMIT_NO_ORDERERS",
            Self::Rejected { .. } => "COMMIT_REJECTED",
            Self::Transport { .. } => "COMMIT_TRANSPORT",
            Self::Timeout { .. } => "COMMIT_TIMEOUT",
        }
    }
}

/// Errors raised by a block event hub.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The hub transitioned to `Shutdown`. Delivered to every registered
    /// error callback; `hub_shutdown` distinguishes an orderly close from a
    /// transport failure.
    #[error("Event hub {endpoint} disconnected: {reason}")]
    HubDisconnect {
        /// The replica endpoint the hub was attached to.
        endpoint: String,
        /// True when the shutdown was requested (close, end block seen),
        /// false on transport failure.
        hub_shutdown: bool,
        /// Human-readable reason.
        reason: String,
    },
    /// A replay registration arrived after the hub connected or after other
    /// listeners were already registered.
    #[error("Replay registration conflicts with hub state: {0}")]
    ReplayConflict(String),
    /// `connect` was called on a hub that is already connecting or connected.
    #[error("Event hub is already connected")]
    AlreadyConnected,
    /// An operation that needs a live stream found none.
    #[error("Event hub is not connected")]
    NotConnected,
    /// A transaction listener for this id is already registered.
    #[error("A transaction listener for {0} is already registered")]
    DuplicateTxListener(String),
    /// A chaincode registration carried an unparsable pattern.
    #[error("Invalid event pattern: {0}")]
    BadPattern(String),
    /// The delivery stream failed at the transport level.
    #[error("Delivery stream error: {0}")]
    Transport(String),
    /// The connection handshake did not produce a frame before the setup
    /// timer fired.
    #[error("Event hub connection setup timed out")]
    SetupTimeout,
}

impl ErrorCode for EventError {
    fn code(&self) -> &'static str {
        match self {
            Self::HubDisconnect { .. } => "EVENT_HUB_DISCONNECT",
            Self::ReplayConflict(_) => "EVENT_REPLAY_CONFLICT",
            Self::AlreadyConnected => "EVENT_ALREADY_CONNECTED",
            Self::NotConnected => "EVENT_NOT_CONNECTED",
            Self::DuplicateTxListener(_) => "EVENT_DUPLICATE_TX_LISTENER",
            Self::BadPattern(_) => "EVENT_BAD_PATTERN",
            Self::Transport(_) => "EVENT_TRANSPORT",
            Self::SetupTimeout => "EVENT_SETUP_TIMEOUT",
        }
    }
}

/// Errors raised while waiting for commit notifications for one submit.
#[derive(Debug, Error, Clone)]
pub enum TxWaitError {
    /// A peer committed the transaction with a non-VALID code.
    #[error("Transaction {tx_id} invalidated by {endpoint} with code {code}")]
    Invalid {
        /// The transaction id.
        tx_id: String,
        /// The peer that reported the code.
        endpoint: String,
        /// The symbolic validation code.
        code: ValidationCode,
    },
    /// The commit timer fired before the strategy quorum was reached.
    #[error("Timed out waiting for commit of transaction {tx_id}")]
    Timeout {
        /// The transaction id.
        tx_id: String,
    },
    /// The wait was cancelled before resolving.
    #[error("Commit wait for transaction {tx_id} was cancelled")]
    Cancelled {
        /// The transaction id.
        tx_id: String,
    },
}

impl ErrorCode for TxWaitError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "TX_WAIT_INVALID",
            Self::Timeout { .. } => "TX_WAIT_TIMEOUT",
            Self::Cancelled { .. } => "TX_WAIT_CANCELLED",
        }
    }
}

/// Errors raised by a crypto suite.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key could not be parsed or imported.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// A signature could not be parsed or failed verification.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    /// A key handle did not resolve to a registered key.
    #[error("Unknown key handle")]
    UnknownKey,
    /// PEM decoding failed.
    #[error("PEM error: {0}")]
    Pem(String),
    /// A low-level crypto operation failed.
    #[error("Crypto operation failed: {0}")]
    OperationFailed(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidSignature(_) => "CRYPTO_INVALID_SIGNATURE",
            Self::UnknownKey => "CRYPTO_UNKNOWN_KEY",
            Self::Pem(_) => "CRYPTO_PEM_ERROR",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
        }
    }
}

/// Errors raised by an identity wallet.
#[derive(Debug, Error)]
pub enum WalletError {
    /// No identity is stored under the requested label.
    #[error("No identity stored under label {0:?}")]
    NotFound(String),
    /// Reading or writing the backing store failed.
    #[error("Wallet I/O error: {0}")]
    Io(String),
    /// An identity record could not be (de)serialized.
    #[error("Wallet serialization error: {0}")]
    Serde(String),
}

impl ErrorCode for WalletError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "WALLET_NOT_FOUND",
            Self::Io(_) => "WALLET_IO",
            Self::Serde(_) => "WALLET_SERDE",
        }
    }
}

/// Errors raised while loading or validating a connection profile.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the profile file failed.
    #[error("Config I/O error: {0}")]
    Io(String),
    /// The profile did not parse.
    #[error("Config parse error: {0}")]
    Parse(String),
    /// The profile parsed but is semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "CONFIG_IO",
            Self::Parse(_) => "CONFIG_PARSE",
            Self::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ProposalError::MissingChaincodeId.code(), "PROPOSAL_MISSING_CHAINCODE_ID");
        assert_eq!(
            EndorseError::PlanUnsatisfied { failures: vec![] }.code(),
            "ENDORSE_PLAN_UNSATISFIED"
        );
        assert_eq!(
            CommitError::Rejected {
                endpoint: "orderer0:7050".into(),
                status: "SERVICE_UNAVAILABLE".into()
            }
            .code(),
            "COMMIT_REJECTED"
        );
    }

    #[test]
    fn hub_disconnect_exposes_shutdown_flag() {
        let err = EventError::HubDisconnect {
            endpoint: "peer0:7051".into(),
            hub_shutdown: true,
            reason: "end block seen".into(),
        };
        match err {
            EventError::HubDisconnect { hub_shutdown, .. } => assert!(hub_shutdown),
            _ => unreachable!(),
        }
    }
}
