// Path: crates/client/tests/common/mod.rs
//! In-process gRPC fixtures: a scriptable endorser, orderer and delivery
//! service bound to ephemeral localhost ports.

// Each test binary uses a different subset of the fixtures.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_stream::{Stream, StreamExt};
use tonic::transport::server::Router;
use tonic::{Request, Response, Status, Streaming};

use weft_api::CryptoSuite;
use weft_client::Signer;
use weft_crypto::SoftwareCryptoSuite;
use weft_proto::common::{ChannelHeader, Envelope, Header, Payload};
use weft_proto::orderer::broadcast_server::Broadcast;
use weft_proto::orderer::BroadcastResponse;
use weft_proto::peer::deliver_server::Deliver;
use weft_proto::peer::endorser_server::Endorser;
use weft_proto::peer::{
    ChaincodeAction, ChaincodeEvent, ChaincodeProposalPayload, DeliverResponse, Endorsement,
    FilteredBlock, FilteredChaincodeAction, FilteredTransaction, FilteredTransactionActions,
    Proposal, ProposalResponse, ProposalResponsePayload, Response as PeerResponse, SignedProposal,
    deliver_response, filtered_transaction,
};
use weft_types::codec;
use weft_types::identity::Identity;

/// A fresh identity plus the suite and signer that back it.
pub fn test_identity() -> (Arc<SoftwareCryptoSuite>, Signer, Identity) {
    let certified =
        rcgen::generate_simple_self_signed(vec!["client.org1".to_string()]).expect("cert");
    let suite = Arc::new(SoftwareCryptoSuite::new());
    let handle = suite
        .import_key(&certified.key_pair.serialize_pem())
        .expect("import key");
    let identity = Identity {
        msp_id: "Org1MSP".to_string(),
        certificate: certified.cert.pem().into_bytes(),
        key: handle,
    };
    let signer = Signer::new(Arc::clone(&suite) as Arc<dyn weft_api::CryptoSuite>);
    (suite, signer, identity)
}

/// Serves `router` on an ephemeral localhost port and returns the
/// host:port endpoint.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = router
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });
    format!("127.0.0.1:{}", addr.port())
}

/// What a replica does to a signed proposal: decode it, strip the
/// transient map, and hash the stripped form.
pub fn replica_proposal_hash(signed: &SignedProposal) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let proposal: Proposal =
        codec::from_bytes_canonical(&signed.proposal_bytes).expect("proposal");
    let payload: ChaincodeProposalPayload =
        codec::from_bytes_canonical(&proposal.payload).expect("payload");
    let stripped = Proposal {
        header: proposal.header,
        payload: codec::to_bytes_canonical(&ChaincodeProposalPayload {
            input: payload.input,
            transient_map: BTreeMap::new(),
        }),
        extension: Vec::new(),
    };
    Sha256::digest(codec::to_bytes_canonical(&stripped)).to_vec()
}

/// The transaction id buried in an envelope's channel header.
pub fn envelope_tx_id(envelope: &Envelope) -> String {
    let payload: Payload = codec::from_bytes_canonical(&envelope.payload).expect("payload");
    let header: Header = payload.header.expect("header");
    let channel_header: ChannelHeader =
        codec::from_bytes_canonical(&header.channel_header).expect("channel header");
    channel_header.tx_id
}

/// An endorser that answers like a healthy replica, counting its calls.
#[derive(Default)]
pub struct MockEndorser {
    pub endpoint_tag: String,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl MockEndorser {
    pub fn tagged(tag: &str) -> Self {
        Self {
            endpoint_tag: tag.to_string(),
            ..Self::default()
        }
    }
}

#[tonic::async_trait]
impl Endorser for MockEndorser {
    async fn process_proposal(
        &self,
        request: Request<SignedProposal>,
    ) -> Result<Response<ProposalResponse>, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Status::unavailable("endorser down"));
        }
        let signed = request.into_inner();
        let proposal_hash = replica_proposal_hash(&signed);
        let action = ChaincodeAction {
            results: Vec::new(),
            events: Vec::new(),
            response: Some(PeerResponse {
                status: 200,
                message: String::new(),
                payload: b"move succeed".to_vec(),
            }),
            chaincode_id: None,
        };
        let payload = ProposalResponsePayload {
            proposal_hash,
            extension: codec::to_bytes_canonical(&action),
        };
        Ok(Response::new(ProposalResponse {
            version: 1,
            timestamp: None,
            response: Some(PeerResponse {
                status: 200,
                message: String::new(),
                payload: b"move succeed".to_vec(),
            }),
            payload: codec::to_bytes_canonical(&payload),
            endorsement: Some(Endorsement {
                endorser: self.endpoint_tag.clone().into_bytes(),
                signature: vec![7],
            }),
        }))
    }
}

/// An orderer with a scripted status. On success it publishes a filtered
/// block carrying the submitted transaction to every delivery subscriber.
pub struct MockOrderer {
    pub status: i32,
    pub received: Mutex<Vec<Envelope>>,
    pub publisher: Option<broadcast::Sender<DeliverResponse>>,
}

impl MockOrderer {
    pub fn new(status: weft_proto::common::Status) -> Self {
        Self {
            status: status as i32,
            received: Mutex::new(Vec::new()),
            publisher: None,
        }
    }

    pub fn publishing(
        status: weft_proto::common::Status,
        publisher: broadcast::Sender<DeliverResponse>,
    ) -> Self {
        Self {
            status: status as i32,
            received: Mutex::new(Vec::new()),
            publisher: Some(publisher),
        }
    }
}

#[tonic::async_trait]
impl Broadcast for MockOrderer {
    async fn broadcast(
        &self,
        request: Request<Envelope>,
    ) -> Result<Response<BroadcastResponse>, Status> {
        let envelope = request.into_inner();
        let tx_id = envelope_tx_id(&envelope);
        self.received.lock().expect("lock").push(envelope);
        if self.status == weft_proto::common::Status::Success as i32 {
            if let Some(publisher) = &self.publisher {
                let _ = publisher.send(commit_block(1, &tx_id, 0));
            }
        }
        Ok(Response::new(BroadcastResponse {
            status: self.status,
            info: String::new(),
        }))
    }
}

/// A filtered block committing one transaction with the given code.
pub fn commit_block(number: u64, tx_id: &str, code: i32) -> DeliverResponse {
    DeliverResponse {
        r#type: Some(deliver_response::Type::FilteredBlock(FilteredBlock {
            channel_id: "mychannel".to_string(),
            number,
            filtered_transactions: vec![FilteredTransaction {
                txid: tx_id.to_string(),
                r#type: 3,
                tx_validation_code: code,
                data: None,
            }],
        })),
    }
}

/// A filtered block whose single valid transaction emits `sold` events.
pub fn event_block(number: u64, events: usize) -> DeliverResponse {
    let actions = (0..events)
        .map(|_| FilteredChaincodeAction {
            chaincode_event: Some(ChaincodeEvent {
                chaincode_id: "lot".to_string(),
                tx_id: format!("tx-{}", number),
                event_name: "sold".to_string(),
                payload: Vec::new(),
            }),
        })
        .collect();
    DeliverResponse {
        r#type: Some(deliver_response::Type::FilteredBlock(FilteredBlock {
            channel_id: "mychannel".to_string(),
            number,
            filtered_transactions: vec![FilteredTransaction {
                txid: format!("tx-{}", number),
                r#type: 3,
                tx_validation_code: 0,
                data: Some(filtered_transaction::Data::TransactionActions(
                    FilteredTransactionActions {
                        chaincode_actions: actions,
                    },
                )),
            }],
        })),
    }
}

type DeliverStream = Pin<Box<dyn Stream<Item = Result<DeliverResponse, Status>> + Send + 'static>>;

/// A delivery service with two modes: `live` sends an initial block at
/// once and then forwards everything published on the broadcast channel;
/// `replay` plays a fixed list of frames and closes.
pub struct MockDeliver {
    pub live: Option<broadcast::Sender<DeliverResponse>>,
    pub replay: Vec<DeliverResponse>,
}

impl MockDeliver {
    pub fn live(publisher: broadcast::Sender<DeliverResponse>) -> Self {
        Self {
            live: Some(publisher),
            replay: Vec::new(),
        }
    }

    pub fn replay(frames: Vec<DeliverResponse>) -> Self {
        Self {
            live: None,
            replay: frames,
        }
    }

    fn stream(&self) -> DeliverStream {
        let (tx, rx) = tokio::sync::mpsc::channel::<DeliverResponse>(16);
        if let Some(publisher) = &self.live {
            // The newest block goes out immediately, as a real server does
            // for a NEWEST seek; later blocks follow the publisher.
            let mut feed = publisher.subscribe();
            tokio::spawn(async move {
                if tx.send(commit_block(0, "genesis", 0)).await.is_err() {
                    return;
                }
                while let Ok(frame) = feed.recv().await {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            });
        } else {
            let frames = self.replay.clone();
            tokio::spawn(async move {
                for frame in frames {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            });
        }
        Box::pin(ReceiverStream::new(rx).map(Ok))
    }
}

#[tonic::async_trait]
impl Deliver for MockDeliver {
    type DeliverStream = DeliverStream;
    type DeliverFilteredStream = DeliverStream;

    async fn deliver(
        &self,
        _request: Request<Streaming<Envelope>>,
    ) -> Result<Response<Self::DeliverStream>, Status> {
        Ok(Response::new(self.stream()))
    }

    async fn deliver_filtered(
        &self,
        _request: Request<Streaming<Envelope>>,
    ) -> Result<Response<Self::DeliverFilteredStream>, Status> {
        Ok(Response::new(self.stream()))
    }
}
