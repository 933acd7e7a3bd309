// Path: crates/types/src/plan.rs
//! The declarative endorsement plan produced by service discovery.
//!
//! A plan is a disjunction of *layouts* over named *groups*: a layout names,
//! for each group it uses, how many endorsements that group must supply. The
//! plan is satisfied as soon as any single layout is satisfied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EndorseError;

/// One peer entry inside a plan group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPeer {
    /// The peer's gRPC endpoint, e.g. `peer0.org1.example.com:7051`.
    pub endpoint: String,
    /// The MSP the peer belongs to.
    pub msp_id: String,
    /// The ledger height the peer reported at discovery time; used as the
    /// selection score. Higher is better.
    pub ledger_height: u64,
}

/// A named group of peers, any of which can endorse on the group's behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanGroup {
    /// Peer entries, ordered by descending score.
    pub peers: Vec<PlanPeer>,
}

/// One layout: a conjunction of per-group endorsement counts.
///
/// The layout is satisfied when every group listed supplies its required
/// count of valid endorsements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout(pub BTreeMap<String, usize>);

/// The full endorsement plan: groups plus an ordered list of layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementPlan {
    /// Group name to group membership.
    pub groups: BTreeMap<String, PlanGroup>,
    /// Layouts in preference order; earlier layouts are attempted first.
    pub layouts: Vec<Layout>,
}

impl EndorsementPlan {
    /// Checks the structural invariants of a plan.
    ///
    /// A valid plan has at least one layout, every layout references only
    /// groups that exist, and no layout requires more endorsements from a
    /// group than the group has peers.
    pub fn validate(&self) -> Result<(), EndorseError> {
        if self.layouts.is_empty() {
            return Err(EndorseError::InvalidPlan(
                "plan contains no layouts".to_string(),
            ));
        }
        for (idx, layout) in self.layouts.iter().enumerate() {
            if layout.0.is_empty() {
                return Err(EndorseError::InvalidPlan(format!(
                    "layout {} is empty",
                    idx
                )));
            }
            for (group, required) in &layout.0 {
                let members = match self.groups.get(group) {
                    Some(g) => g.peers.len(),
                    None => {
                        return Err(EndorseError::InvalidPlan(format!(
                            "layout {} references unknown group {:?}",
                            idx, group
                        )))
                    }
                };
                if *required == 0 {
                    return Err(EndorseError::InvalidPlan(format!(
                        "layout {} requires zero endorsements from group {:?}",
                        idx, group
                    )));
                }
                if *required > members {
                    return Err(EndorseError::InvalidPlan(format!(
                        "layout {} requires {} endorsements from group {:?} of {} peers",
                        idx, required, group, members
                    )));
                }
            }
        }
        Ok(())
    }

    /// All distinct peer endpoints appearing anywhere in the plan.
    pub fn endpoints(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for group in self.groups.values() {
            for peer in &group.peers {
                if !out.contains(&peer.endpoint.as_str()) {
                    out.push(&peer.endpoint);
                }
            }
        }
        out
    }
}
