// Path: crates/client/src/discovery.rs
//! Config-driven discovery for deployments without a discovery service.

use async_trait::async_trait;

use weft_api::{Discovery, PlanHint};
use weft_types::error::EndorseError;
use weft_types::plan::{EndorsementPlan, Layout, PlanGroup, PlanPeer};

use crate::config::PeerConfig;

/// Serves a fixed endorsement plan derived from the connection profile:
/// one group per MSP, one layout requiring `required` endorsements from
/// each group.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    peers: Vec<PlanPeer>,
    required: usize,
}

impl StaticDiscovery {
    pub fn new(peers: Vec<PlanPeer>, required: usize) -> Self {
        Self { peers, required }
    }

    /// Builds the provider from the profile's peer list.
    pub fn from_config(peers: &[PeerConfig], required: usize) -> Self {
        Self::new(
            peers
                .iter()
                .map(|p| PlanPeer {
                    endpoint: p.endpoint.clone(),
                    msp_id: p.msp_id.clone(),
                    ledger_height: p.ledger_height,
                })
                .collect(),
            required,
        )
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn endorsement_plan(&self, _hint: &PlanHint) -> Result<EndorsementPlan, EndorseError> {
        if self.peers.is_empty() {
            return Err(EndorseError::InvalidPlan(
                "no peers configured".to_string(),
            ));
        }
        let mut plan = EndorsementPlan::default();
        let mut layout = Layout::default();
        for peer in &self.peers {
            plan.groups
                .entry(peer.msp_id.clone())
                .or_insert_with(PlanGroup::default)
                .peers
                .push(peer.clone());
        }
        for (group_name, group) in &mut plan.groups {
            // Higher reported height first; equal heights keep config order.
            group.peers.sort_by(|a, b| b.ledger_height.cmp(&a.ledger_height));
            layout
                .0
                .insert(group_name.clone(), self.required.clamp(1, group.peers.len()));
        }
        plan.layouts.push(layout);
        plan.validate()?;
        Ok(plan)
    }

    async fn peers(&self, _channel: &str) -> Result<Vec<PlanPeer>, EndorseError> {
        Ok(self.peers.clone())
    }
}
