// Path: crates/api/src/strategy.rs
//! The commit-notification strategy seam.

use std::sync::Arc;

use weft_types::identity::TransactionId;

/// The identity of one connected event hub, as seen by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubIdentity {
    /// The replica endpoint the hub is attached to.
    pub endpoint: String,
    /// The MSP the replica belongs to.
    pub msp_id: String,
}

/// Decides which hubs a submit listens on and how many notifications
/// resolve the wait.
///
/// The closed set of strategies ships in `weft-client`; callers may supply
/// their own implementation through an [`EventStrategyFactory`].
pub trait TxEventStrategy: Send + Sync {
    /// Indices into `hubs` of the hubs this strategy listens on.
    fn scope(&self, caller_msp: &str, hubs: &[HubIdentity]) -> Vec<usize>;

    /// How many notifications (valid commits or hub errors) resolve the
    /// wait, given the number of hubs actually in scope.
    fn expected(&self, in_scope: usize) -> usize;
}

/// Produces a strategy for each submit.
pub trait EventStrategyFactory: Send + Sync {
    /// Creates the strategy used to wait for `tx_id`.
    fn create(&self, tx_id: &TransactionId) -> Arc<dyn TxEventStrategy>;
}
