// Path: crates/client/src/events/registration.rs
//! Listener registrations and the hub registration table.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use weft_types::error::EventError;
use weft_types::events::ListenOpts;

use super::{BlockEvent, ChaincodeEventRecord, TxEvent};

/// Callback fired once per delivered block.
pub type BlockCallback = Arc<dyn Fn(&BlockEvent) + Send + Sync>;
/// Callback fired per matching commit notification.
pub type TxCallback = Arc<dyn Fn(&TxEvent) + Send + Sync>;
/// Callback fired with matched chaincode events: one element per call, or
/// the whole block's batch for as-array registrations.
pub type ChaincodeCallback = Arc<dyn Fn(&[ChaincodeEventRecord]) + Send + Sync>;
/// Callback fired when the hub shuts down or fails.
pub type ErrorCallback = Arc<dyn Fn(&EventError) + Send + Sync>;

/// What a transaction registration listens for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TxListenerKey {
    /// Every transaction in every block.
    All,
    /// One exact transaction id.
    Tx(String),
}

impl TxListenerKey {
    /// Parses the caller-supplied key; the literal `"all"` is the wildcard.
    pub fn parse(key: &str) -> Self {
        if key == "all" {
            Self::All
        } else {
            Self::Tx(key.to_string())
        }
    }
}

pub(crate) struct BlockRegistration {
    pub callback: BlockCallback,
    pub on_error: Option<ErrorCallback>,
    pub opts: ListenOpts,
    /// Full-block listeners require a full-block subscription; filtered
    /// listeners accept either.
    pub wants_full: bool,
}

pub(crate) struct TxRegistration {
    pub callback: TxCallback,
    pub on_error: Option<ErrorCallback>,
    pub opts: ListenOpts,
}

pub(crate) struct ChaincodeRegistration {
    pub chaincode: Regex,
    pub event: Regex,
    pub callback: ChaincodeCallback,
    pub on_error: Option<ErrorCallback>,
    pub opts: ListenOpts,
    pub as_array: bool,
}

/// An opaque handle returned by the register calls; pass it back to
/// `unregister`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) HandleKind);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HandleKind {
    Block(u64),
    Tx(TxListenerKey),
    Chaincode(u64),
}

/// The hub's registration table. Mutated under the hub's registry lock;
/// dispatch works from snapshots so callbacks can re-enter the table.
#[derive(Default)]
pub(crate) struct Registry {
    pub blocks: BTreeMap<u64, BlockRegistration>,
    pub txs: HashMap<TxListenerKey, TxRegistration>,
    pub chaincodes: BTreeMap<u64, ChaincodeRegistration>,
}

impl Registry {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.txs.is_empty() && self.chaincodes.is_empty()
    }

    /// Every error callback currently registered, in registration order.
    pub fn error_callbacks(&self) -> Vec<ErrorCallback> {
        let mut out = Vec::new();
        out.extend(self.blocks.values().filter_map(|r| r.on_error.clone()));
        out.extend(self.txs.values().filter_map(|r| r.on_error.clone()));
        out.extend(self.chaincodes.values().filter_map(|r| r.on_error.clone()));
        out
    }

    pub fn remove(&mut self, handle: &HandleKind) -> bool {
        match handle {
            HandleKind::Block(id) => self.blocks.remove(id).is_some(),
            HandleKind::Tx(key) => self.txs.remove(key).is_some(),
            HandleKind::Chaincode(id) => self.chaincodes.remove(id).is_some(),
        }
    }
}
