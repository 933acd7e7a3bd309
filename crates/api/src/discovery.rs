// Path: crates/api/src/discovery.rs
//! The service-discovery seam.

use async_trait::async_trait;
use weft_types::error::EndorseError;
use weft_types::plan::{EndorsementPlan, PlanPeer};

/// What the caller wants endorsed, used by discovery to derive a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanHint {
    /// The channel the invocation targets.
    pub channel: String,
    /// The chaincode the invocation targets.
    pub chaincode: String,
}

/// A source of endorsement plans and peer membership.
///
/// The discovery algorithm itself is out of scope; the client consumes only
/// this interface. A static, config-driven implementation ships in
/// `weft-client` for deployments without a discovery service.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Produces a layout-and-group endorsement plan for `hint`.
    async fn endorsement_plan(&self, hint: &PlanHint) -> Result<EndorsementPlan, EndorseError>;

    /// Lists the known peers of `channel`.
    async fn peers(&self, channel: &str) -> Result<Vec<PlanPeer>, EndorseError>;
}
