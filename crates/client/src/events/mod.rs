// Path: crates/client/src/events/mod.rs
//! Block delivery, event fan-out and per-submit commit waits.

pub mod hub;
pub mod registration;
pub mod seek;
pub mod tx_handler;

pub use hub::{BlockEventHub, ConnectOpts};
pub use registration::{
    BlockCallback, ChaincodeCallback, ErrorCallback, ListenerHandle, TxCallback, TxListenerKey,
};
pub use tx_handler::TransactionEventHandler;

use weft_proto::common::Block;
use weft_proto::peer::FilteredBlock;
use weft_types::events::ValidationCode;

/// A block as delivered to listeners: the variant matches the hub's
/// subscription mode.
#[derive(Debug, Clone)]
pub enum BlockEvent {
    /// Complete payloads, from a full-block subscription.
    Full(Block),
    /// Transaction ids, validation codes and event names only.
    Filtered(FilteredBlock),
}

impl BlockEvent {
    /// The block number.
    pub fn number(&self) -> u64 {
        match self {
            Self::Full(block) => block.header.as_ref().map(|h| h.number).unwrap_or(0),
            Self::Filtered(block) => block.number,
        }
    }
}

/// A commit notification for one transaction.
#[derive(Debug, Clone)]
pub struct TxEvent {
    /// The transaction id.
    pub tx_id: String,
    /// The validation code the committing peer assigned.
    pub code: ValidationCode,
    /// The block the transaction committed in.
    pub block_number: u64,
    /// The replica endpoint that delivered the block.
    pub endpoint: String,
}

/// A chaincode event emitted by a successful transaction.
#[derive(Debug, Clone)]
pub struct ChaincodeEventRecord {
    /// The emitting chaincode.
    pub chaincode_id: String,
    /// The transaction that emitted the event.
    pub tx_id: String,
    /// The event name.
    pub event_name: String,
    /// The event payload; empty under a filtered subscription.
    pub payload: Vec<u8>,
    /// The block the event arrived in.
    pub block_number: u64,
}
