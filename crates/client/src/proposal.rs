// Path: crates/client/src/proposal.rs
//! Canonical proposal construction and commit-envelope assembly.
//!
//! A proposal's wire form must be byte-for-byte stable: replicas hash the
//! serialized proposal (with the transient map stripped) and echo that hash
//! back in their responses, so any nondeterminism here breaks validation.
//! Map fields are BTreeMaps end to end and every nested structure is
//! serialized exactly once, at build time.

use prost_types::Timestamp;
use std::collections::BTreeMap;
use std::time::SystemTime;

use weft_proto::common::{ChannelHeader, Envelope, Header, HeaderType, Payload, SignatureHeader};
use weft_proto::peer::{
    chaincode_spec, ChaincodeActionPayload, ChaincodeEndorsedAction, ChaincodeHeaderExtension,
    ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec, ChaincodeProposalPayload, ChaincodeSpec,
    Proposal, ProposalResponse, SignedProposal, Transaction, TransactionAction,
};
use weft_types::codec;
use weft_types::error::{CryptoError, ProposalError};
use weft_types::identity::{Identity, TransactionId};

use crate::signer::Signer;

/// Management chaincodes that may be queried without a channel.
const CHANNEL_LESS_CHAINCODES: [&str; 3] = ["cscc", "qscc", "lscc"];

/// A built proposal plus everything later phases need: the stable wire
/// bytes for signing, the transient-stripped payload for the commit
/// envelope, and the derived transaction id.
#[derive(Debug, Clone)]
pub struct TransactionProposal {
    /// The derived transaction id.
    pub tx_id: TransactionId,
    /// The channel the proposal targets; empty for channel-less queries.
    pub channel_id: String,
    /// The chaincode the proposal invokes.
    pub chaincode_id: String,
    /// The header shared by the proposal and the commit envelope.
    pub header: Header,
    /// The canonical serialized proposal, the unit that gets signed.
    pub proposal_bytes: Vec<u8>,
    /// The chaincode proposal payload with the transient map stripped;
    /// validators recompute the proposal hash over this form.
    pub payload_no_transient: Vec<u8>,
    /// The serialized creator identity.
    pub creator: Vec<u8>,
}

impl TransactionProposal {
    /// Signs the proposal bytes, producing the wire `SignedProposal`.
    pub fn sign(
        &self,
        signer: &Signer,
        identity: &Identity,
    ) -> Result<SignedProposal, CryptoError> {
        let signature = signer.sign(identity, &self.proposal_bytes)?;
        Ok(SignedProposal {
            proposal_bytes: self.proposal_bytes.clone(),
            signature,
        })
    }

    /// The digest replicas echo back: the hash of the proposal with its
    /// transient map stripped.
    pub fn expected_hash(&self, signer: &Signer) -> Vec<u8> {
        let stripped = Proposal {
            header: codec::to_bytes_canonical(&self.header),
            payload: self.payload_no_transient.clone(),
            extension: Vec::new(),
        };
        signer.hash(&codec::to_bytes_canonical(&stripped))
    }
}

/// Builds canonical proposals for one invocation.
#[derive(Debug, Clone, Default)]
pub struct ProposalBuilder {
    channel_id: Option<String>,
    chaincode_id: Option<String>,
    function: String,
    args: Vec<Vec<u8>>,
    transient: BTreeMap<String, Vec<u8>>,
    nonce: Option<Vec<u8>>,
    timestamp: Option<Timestamp>,
}

impl ProposalBuilder {
    /// Starts a builder for one chaincode function.
    pub fn new(chaincode_id: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            chaincode_id: Some(chaincode_id.into()),
            function: function.into(),
            ..Self::default()
        }
    }

    /// Targets a channel. Required except for management chaincodes.
    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Appends one ordered argument.
    pub fn arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends ordered arguments.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Attaches the transient map. Present when signing, stripped from the
    /// payload that travels in the commit envelope.
    pub fn transient(mut self, transient: BTreeMap<String, Vec<u8>>) -> Self {
        self.transient = transient;
        self
    }

    /// Supplies the per-proposal nonce. Required.
    pub fn nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Pins the header timestamp; defaults to the current time.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Validates inputs and produces the canonical proposal.
    pub fn build(
        self,
        signer: &Signer,
        identity: &Identity,
    ) -> Result<TransactionProposal, ProposalError> {
        let chaincode_id = match self.chaincode_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(ProposalError::MissingChaincodeId),
        };
        let channel_id = match self.channel_id {
            Some(id) if !id.is_empty() => id,
            _ if CHANNEL_LESS_CHAINCODES.contains(&chaincode_id.as_str()) => String::new(),
            _ => return Err(ProposalError::MissingChannelId(chaincode_id)),
        };
        let nonce = match self.nonce {
            Some(nonce) if !nonce.is_empty() => nonce,
            _ => return Err(ProposalError::MissingNonce),
        };

        let creator = signer.serialize_creator(identity);
        let tx_id = signer.transaction_id(&nonce, &creator);
        if tx_id.as_str().is_empty() {
            return Err(ProposalError::MissingTxId);
        }

        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Timestamp::from(SystemTime::now()));

        // Invocation spec: the function name travels as args[0].
        let mut wire_args = Vec::with_capacity(self.args.len() + 1);
        wire_args.push(self.function.into_bytes());
        wire_args.extend(self.args);
        let invocation = ChaincodeInvocationSpec {
            chaincode_spec: Some(ChaincodeSpec {
                r#type: chaincode_spec::Type::Undefined as i32,
                chaincode_id: Some(ChaincodeId {
                    path: String::new(),
                    name: chaincode_id.clone(),
                    version: String::new(),
                }),
                input: Some(ChaincodeInput {
                    args: wire_args,
                    decorations: BTreeMap::new(),
                    is_init: false,
                }),
                timeout: 0,
            }),
        };
        let invocation_bytes = codec::to_bytes_canonical(&invocation);

        let extension = ChaincodeHeaderExtension {
            chaincode_id: Some(ChaincodeId {
                path: String::new(),
                name: chaincode_id.clone(),
                version: String::new(),
            }),
        };
        let channel_header = ChannelHeader {
            r#type: HeaderType::EndorserTransaction as i32,
            version: 1,
            timestamp: Some(timestamp),
            channel_id: channel_id.clone(),
            tx_id: tx_id.as_str().to_string(),
            epoch: 0,
            extension: codec::to_bytes_canonical(&extension),
            tls_cert_hash: Vec::new(),
        };
        let signature_header = SignatureHeader {
            creator: creator.clone(),
            nonce,
        };
        let header = Header {
            channel_header: codec::to_bytes_canonical(&channel_header),
            signature_header: codec::to_bytes_canonical(&signature_header),
        };

        let payload = ChaincodeProposalPayload {
            input: invocation_bytes.clone(),
            transient_map: self.transient,
        };
        let payload_no_transient = codec::to_bytes_canonical(&ChaincodeProposalPayload {
            input: invocation_bytes,
            transient_map: BTreeMap::new(),
        });

        let proposal = Proposal {
            header: codec::to_bytes_canonical(&header),
            payload: codec::to_bytes_canonical(&payload),
            extension: Vec::new(),
        };

        Ok(TransactionProposal {
            tx_id,
            channel_id,
            chaincode_id,
            header,
            proposal_bytes: codec::to_bytes_canonical(&proposal),
            payload_no_transient,
            creator,
        })
    }
}

/// Assembles the commit envelope from a proposal and its endorsements.
///
/// The endorsed action carries the first response's payload (all valid
/// responses echo the same one) and the endorsements in collection order;
/// the chaincode proposal payload travels with its transient map stripped.
pub fn build_commit_envelope(
    proposal: &TransactionProposal,
    responses: &[ProposalResponse],
    signer: &Signer,
    identity: &Identity,
) -> Result<Envelope, ProposalError> {
    let first = responses
        .first()
        .ok_or_else(|| ProposalError::Encode("no endorsement responses".to_string()))?;
    let endorsements = responses
        .iter()
        .map(|r| {
            r.endorsement
                .clone()
                .ok_or_else(|| ProposalError::Encode("response missing endorsement".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let action = ChaincodeEndorsedAction {
        proposal_response_payload: first.payload.clone(),
        endorsements,
    };
    let action_payload = ChaincodeActionPayload {
        chaincode_proposal_payload: proposal.payload_no_transient.clone(),
        action: Some(action),
    };
    let transaction = Transaction {
        actions: vec![TransactionAction {
            header: proposal.header.signature_header.clone(),
            payload: codec::to_bytes_canonical(&action_payload),
        }],
    };
    let payload = Payload {
        header: Some(proposal.header.clone()),
        data: codec::to_bytes_canonical(&transaction),
    };
    let payload_bytes = codec::to_bytes_canonical(&payload);
    let signature = signer
        .sign(identity, &payload_bytes)
        .map_err(|e| ProposalError::Encode(format!("envelope signing failed: {}", e)))?;
    Ok(Envelope {
        payload: payload_bytes,
        signature,
    })
}
