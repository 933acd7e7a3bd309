// Path: crates/api/src/handler.rs
//! Pluggable endorse and commit handlers.
//!
//! The default coordinators in `weft-client` implement these; a caller can
//! swap in a custom policy (round-robin endorsement, a single pinned
//! orderer, a test double) without touching the channel facade.

use async_trait::async_trait;

use weft_proto::common::Envelope;
use weft_proto::peer::{ProposalResponse, SignedProposal};
use weft_types::error::{CommitError, EndorseError};
use weft_types::plan::EndorsementPlan;
use weft_types::submit::{BroadcastResult, CommitOpts, EndorseOpts};

/// Runs an endorsement plan against peers and arbitrates the responses.
#[async_trait]
pub trait EndorsementHandler: Send + Sync {
    /// Collects endorsements satisfying one layout of `plan`.
    ///
    /// `expected_hash` is the digest of the proposal with its transient map
    /// stripped; responses whose echoed proposal hash differs are rejected.
    /// The returned list preserves plan order, not completion order.
    async fn endorse(
        &self,
        plan: &EndorsementPlan,
        proposal: &SignedProposal,
        expected_hash: &[u8],
        opts: &EndorseOpts,
    ) -> Result<Vec<ProposalResponse>, EndorseError>;
}

/// Broadcasts an endorsed envelope to the ordering service.
#[async_trait]
pub trait CommitHandler: Send + Sync {
    /// Submits `envelope`, failing over across orderers as configured.
    async fn commit(
        &self,
        envelope: &Envelope,
        opts: &CommitOpts,
    ) -> Result<BroadcastResult, CommitError>;
}
