// Path: crates/client/src/events/seek.rs
//! The signed registration envelope for a block-delivery subscription.

use prost_types::Timestamp;
use std::time::SystemTime;

use weft_proto::common::{ChannelHeader, Envelope, Header, HeaderType, Payload, SignatureHeader};
use weft_proto::orderer::{
    seek_info, seek_position, SeekInfo, SeekNewest, SeekOldest, SeekPosition, SeekSpecified,
};
use weft_types::codec;
use weft_types::error::CryptoError;
use weft_types::events::{EndPosition, StartPosition};
use weft_types::identity::Identity;

use crate::signer::Signer;

/// Resolves the subscription start to a wire seek position.
///
/// `LastSeen` resumes at the hub's last observed block, or the server's
/// newest when the hub has seen nothing (including after a hub reset).
pub(crate) fn resolve_start(start: Option<StartPosition>, last_seen: Option<u64>) -> SeekPosition {
    let position = match start {
        None | Some(StartPosition::Newest) => seek_position::Type::Newest(SeekNewest {}),
        Some(StartPosition::Oldest) => seek_position::Type::Oldest(SeekOldest {}),
        Some(StartPosition::LastSeen) => match last_seen {
            Some(number) => seek_position::Type::Specified(SeekSpecified { number }),
            None => seek_position::Type::Newest(SeekNewest {}),
        },
        Some(StartPosition::Exact(number)) => {
            seek_position::Type::Specified(SeekSpecified { number })
        }
    };
    SeekPosition {
        r#type: Some(position),
    }
}

/// Resolves the subscription end to a wire seek position and behavior.
///
/// A bounded subscription asks the server to fail if the end block does
/// not yet exist; an unbounded one holds the stream open.
pub(crate) fn resolve_stop(end: Option<EndPosition>) -> (SeekPosition, seek_info::SeekBehavior) {
    match end {
        None => (
            SeekPosition {
                r#type: Some(seek_position::Type::Specified(SeekSpecified {
                    number: u64::MAX,
                })),
            },
            seek_info::SeekBehavior::BlockUntilReady,
        ),
        Some(EndPosition::Newest) => (
            SeekPosition {
                r#type: Some(seek_position::Type::Newest(SeekNewest {})),
            },
            seek_info::SeekBehavior::FailIfNotReady,
        ),
        Some(EndPosition::Exact(number)) => (
            SeekPosition {
                r#type: Some(seek_position::Type::Specified(SeekSpecified { number })),
            },
            seek_info::SeekBehavior::FailIfNotReady,
        ),
    }
}

/// Builds and signs the registration envelope sent on a new delivery
/// stream.
pub(crate) fn build_seek_envelope(
    signer: &Signer,
    identity: &Identity,
    channel_id: &str,
    start: SeekPosition,
    stop: SeekPosition,
    behavior: seek_info::SeekBehavior,
) -> Result<Envelope, CryptoError> {
    let nonce = signer.new_nonce();
    let creator = signer.serialize_creator(identity);
    let tx_id = signer.transaction_id(&nonce, &creator);

    let channel_header = ChannelHeader {
        r#type: HeaderType::DeliverSeekInfo as i32,
        version: 1,
        timestamp: Some(Timestamp::from(SystemTime::now())),
        channel_id: channel_id.to_string(),
        tx_id: tx_id.as_str().to_string(),
        epoch: 0,
        extension: Vec::new(),
        tls_cert_hash: Vec::new(),
    };
    let signature_header = SignatureHeader { creator, nonce };
    let seek_info = SeekInfo {
        start: Some(start),
        stop: Some(stop),
        behavior: behavior as i32,
    };
    let payload = Payload {
        header: Some(Header {
            channel_header: codec::to_bytes_canonical(&channel_header),
            signature_header: codec::to_bytes_canonical(&signature_header),
        }),
        data: codec::to_bytes_canonical(&seek_info),
    };
    let payload_bytes = codec::to_bytes_canonical(&payload);
    let signature = signer.sign(identity, &payload_bytes)?;
    Ok(Envelope {
        payload: payload_bytes,
        signature,
    })
}
