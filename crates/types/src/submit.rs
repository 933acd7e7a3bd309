// Path: crates/types/src/submit.rs
//! Per-call option types for the endorse, commit and event-wait phases.

use std::collections::HashSet;
use std::time::Duration;

/// Options recognized by the endorsement coordinator.
#[derive(Debug, Clone, Default)]
pub struct EndorseOpts {
    /// Peer endpoints lifted to the highest score before selection.
    pub preferred: HashSet<String>,
    /// Peer endpoints removed from every group before selection.
    pub ignore: HashSet<String>,
    /// Per-attempt deadline; falls back to the channel default.
    pub timeout: Option<Duration>,
}

/// Options recognized by the commit coordinator.
#[derive(Debug, Clone, Default)]
pub struct CommitOpts {
    /// Single-target mode: send only to this orderer endpoint.
    pub orderer: Option<String>,
    /// Per-attempt deadline; falls back to the channel default.
    pub timeout: Option<Duration>,
}

/// The outcome of a successful broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResult {
    /// The orderer that accepted the envelope.
    pub endpoint: String,
    /// The symbolic status it returned (`SUCCESS`, or a duplicate treated
    /// as success).
    pub status: String,
}

/// The closed set of commit-notification strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventStrategy {
    /// Any valid notification from a hub in the caller's MSP resolves the
    /// wait.
    #[default]
    MspAnyForTx,
    /// Every hub in the caller's MSP must notify.
    MspAllForTx,
    /// Any valid notification from any organization's hub resolves the wait.
    NetworkAnyForTx,
    /// Every hub across all organizations must notify.
    NetworkAllForTx,
    /// Do not listen; the wait resolves immediately.
    None,
}
