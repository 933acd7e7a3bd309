// Path: crates/client/src/channel.rs
//! The channel facade.
//!
//! Aggregates one channel's peers, orderers and event hubs behind the
//! submit/evaluate operations: build and sign the proposal, run the
//! endorsement plan, start listening for the commit, broadcast the
//! envelope, and resolve when the strategy quorum of hubs reports the
//! transaction committed.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use weft_api::{
    CommitHandler, CryptoSuite, Discovery, EndorsementHandler, EventStrategyFactory, PlanHint,
};
use weft_types::error::{EndorseError, EventError};
use weft_types::identity::Identity;
use weft_types::submit::{CommitOpts, EndorseOpts, EventStrategy};

use crate::commit::{CommitCoordinator, GrpcBroadcastDispatcher};
use crate::config::ChannelConfig;
use crate::discovery::StaticDiscovery;
use crate::endorse::{EndorsementCoordinator, GrpcProposalDispatcher, ProposalDispatcher};
use crate::endpoint::EndpointPool;
use crate::error::ClientError;
use crate::events::hub::{BlockEventHub, ConnectOpts};
use crate::events::registration::{
    BlockCallback, ChaincodeCallback, ErrorCallback, ListenerHandle, TxCallback,
};
use crate::events::tx_handler::{DefaultStrategyFactory, TransactionEventHandler};
use crate::proposal::{build_commit_envelope, ProposalBuilder};
use crate::signer::Signer;
use weft_types::events::ListenOpts;

/// Builds a [`Channel`], with seams for swapping every collaborator.
pub struct ChannelBuilder {
    config: ChannelConfig,
    identity: Identity,
    suite: Arc<dyn CryptoSuite>,
    discovery: Option<Arc<dyn Discovery>>,
    endorser: Option<Arc<dyn EndorsementHandler>>,
    committer: Option<Arc<dyn CommitHandler>>,
    strategy_factory: Option<Arc<dyn EventStrategyFactory>>,
    dispatcher: Option<Arc<dyn ProposalDispatcher>>,
    required_endorsements: usize,
}

impl ChannelBuilder {
    pub fn new(config: ChannelConfig, identity: Identity, suite: Arc<dyn CryptoSuite>) -> Self {
        Self {
            config,
            identity,
            suite,
            discovery: None,
            endorser: None,
            committer: None,
            strategy_factory: None,
            dispatcher: None,
            required_endorsements: 1,
        }
    }

    /// Swaps in a proposal dispatcher; defaults to the gRPC dispatcher over
    /// the profile's peers.
    pub fn proposal_dispatcher(mut self, dispatcher: Arc<dyn ProposalDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Swaps in a discovery service; defaults to a static plan built from
    /// the connection profile.
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Swaps in an endorsement handler; defaults to the coordinator.
    pub fn endorsement_handler(mut self, handler: Arc<dyn EndorsementHandler>) -> Self {
        self.endorser = Some(handler);
        self
    }

    /// Swaps in a commit handler; defaults to the coordinator.
    pub fn commit_handler(mut self, handler: Arc<dyn CommitHandler>) -> Self {
        self.committer = Some(handler);
        self
    }

    /// Swaps in an event-strategy factory; defaults to MSPID_SCOPE_ANYFORTX.
    pub fn strategy_factory(mut self, factory: Arc<dyn EventStrategyFactory>) -> Self {
        self.strategy_factory = Some(factory);
        self
    }

    /// Picks one of the closed-set strategies.
    pub fn event_strategy(self, strategy: EventStrategy) -> Self {
        self.strategy_factory(Arc::new(DefaultStrategyFactory::new(strategy)))
    }

    /// How many endorsements per organization the static discovery plan
    /// requires.
    pub fn required_endorsements(mut self, required: usize) -> Self {
        self.required_endorsements = required;
        self
    }

    pub fn build(self) -> Result<Channel, ClientError> {
        self.config.validate()?;
        let signer = Signer::new(Arc::clone(&self.suite));
        let pool = Arc::new(EndpointPool::new(self.config.keepalive.clone()));

        let dispatcher: Arc<dyn ProposalDispatcher> = match self.dispatcher {
            Some(dispatcher) => dispatcher,
            None => Arc::new(GrpcProposalDispatcher::new(
                Arc::clone(&pool),
                self.config.peers.clone(),
            )),
        };
        let endorser = match self.endorser {
            Some(handler) => handler,
            None => Arc::new(EndorsementCoordinator::new(
                Arc::clone(&dispatcher),
                self.config.timeouts.endorse(),
            )),
        };
        let committer = match self.committer {
            Some(handler) => handler,
            None => Arc::new(CommitCoordinator::new(
                Arc::new(GrpcBroadcastDispatcher::new(
                    Arc::clone(&pool),
                    self.config.orderers.clone(),
                )),
                self.config
                    .orderers
                    .iter()
                    .map(|o| o.endpoint.clone())
                    .collect(),
                self.config.timeouts.commit(),
            )),
        };
        let discovery = match self.discovery {
            Some(discovery) => discovery,
            None => Arc::new(StaticDiscovery::from_config(
                &self.config.peers,
                self.required_endorsements,
            )),
        };
        let strategy_factory = self
            .strategy_factory
            .unwrap_or_else(|| Arc::new(DefaultStrategyFactory::new(EventStrategy::MspAnyForTx)));

        // One hub per configured peer.
        let mut hubs = Vec::with_capacity(self.config.peers.len());
        for peer in &self.config.peers {
            let transport = pool.channel_for(&peer.endpoint, peer.tls.as_ref())?;
            hubs.push(Arc::new(BlockEventHub::new(
                peer.endpoint.clone(),
                peer.msp_id.clone(),
                self.config.name.clone(),
                transport,
                signer.clone(),
                self.identity.clone(),
                self.config.timeouts.event_setup(),
            )));
        }

        Ok(Channel {
            config: self.config,
            identity: self.identity,
            signer,
            discovery,
            endorser,
            committer,
            strategy_factory,
            dispatcher,
            hubs,
        })
    }
}

/// One channel's client surface.
pub struct Channel {
    config: ChannelConfig,
    identity: Identity,
    signer: Signer,
    discovery: Arc<dyn Discovery>,
    endorser: Arc<dyn EndorsementHandler>,
    committer: Arc<dyn CommitHandler>,
    strategy_factory: Arc<dyn EventStrategyFactory>,
    dispatcher: Arc<dyn ProposalDispatcher>,
    hubs: Vec<Arc<BlockEventHub>>,
}

impl Channel {
    /// The channel name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The caller's MSP.
    pub fn msp_id(&self) -> &str {
        &self.config.msp_id
    }

    /// Every event hub, one per configured peer.
    pub fn event_hubs(&self) -> &[Arc<BlockEventHub>] {
        &self.hubs
    }

    /// The hub attached to `endpoint`, if configured.
    pub fn event_hub(&self, endpoint: &str) -> Option<&Arc<BlockEventHub>> {
        self.hubs.iter().find(|hub| hub.endpoint() == endpoint)
    }

    /// Connects every hub with a filtered-block subscription, the cheapest
    /// mode that still carries commit notifications. Individual failures
    /// are logged and skipped; at least one hub must come up.
    pub async fn connect_event_hubs(&self) -> Result<(), ClientError> {
        let mut connected = 0usize;
        for hub in &self.hubs {
            let opts = ConnectOpts {
                filtered: true,
                ..Default::default()
            };
            match hub.connect(opts).await {
                Ok(()) => connected += 1,
                Err(err) => {
                    warn!(endpoint = %hub.endpoint(), error = %err, "event hub failed to connect");
                }
            }
        }
        if connected == 0 && !self.hubs.is_empty() {
            return Err(EventError::NotConnected.into());
        }
        Ok(())
    }

    /// The full submit flow: endorse, listen, broadcast, wait for the
    /// commit. Returns the chaincode response payload.
    pub async fn submit_transaction(
        &self,
        chaincode_id: &str,
        function: &str,
        args: &[&str],
        transient: Option<BTreeMap<String, Vec<u8>>>,
    ) -> Result<Vec<u8>, ClientError> {
        self.submit_with_opts(
            chaincode_id,
            function,
            args,
            transient,
            EndorseOpts::default(),
            CommitOpts::default(),
        )
        .await
    }

    /// [`Self::submit_transaction`] with explicit endorse and commit
    /// options.
    #[instrument(skip_all, fields(channel = %self.config.name, chaincode = chaincode_id, function))]
    pub async fn submit_with_opts(
        &self,
        chaincode_id: &str,
        function: &str,
        args: &[&str],
        transient: Option<BTreeMap<String, Vec<u8>>>,
        endorse_opts: EndorseOpts,
        commit_opts: CommitOpts,
    ) -> Result<Vec<u8>, ClientError> {
        let mut builder = ProposalBuilder::new(chaincode_id, function)
            .channel(&self.config.name)
            .args(args.iter().map(|a| a.as_bytes().to_vec()))
            .nonce(self.signer.new_nonce());
        if let Some(transient) = transient {
            builder = builder.transient(transient);
        }
        let proposal = builder.build(&self.signer, &self.identity)?;
        let signed = proposal.sign(&self.signer, &self.identity)?;
        let expected_hash = proposal.expected_hash(&self.signer);
        debug!(tx_id = %proposal.tx_id, "submitting transaction");

        let hint = PlanHint {
            channel: self.config.name.clone(),
            chaincode: chaincode_id.to_string(),
        };
        let plan = self.discovery.endorsement_plan(&hint).await?;
        let responses = self
            .endorser
            .endorse(&plan, &signed, &expected_hash, &endorse_opts)
            .await?;

        // Listen before broadcasting so the commit notification cannot slip
        // between the two.
        let connected: Vec<Arc<BlockEventHub>> = self
            .hubs
            .iter()
            .filter(|hub| hub.is_connected())
            .cloned()
            .collect();
        let strategy = self.strategy_factory.create(&proposal.tx_id);
        let handler = TransactionEventHandler::new(
            proposal.tx_id.clone(),
            connected,
            self.config.msp_id.clone(),
            strategy,
            self.config.timeouts.commit_wait(),
        );
        handler.start_listening()?;

        let envelope = build_commit_envelope(&proposal, &responses, &self.signer, &self.identity)?;
        if let Err(err) = self.committer.commit(&envelope, &commit_opts).await {
            handler.cancel_listening();
            return Err(err.into());
        }
        handler.wait_for_events().await?;

        Ok(responses
            .first()
            .and_then(|r| r.response.as_ref())
            .map(|r| r.payload.clone())
            .unwrap_or_default())
    }

    /// Endorse-only: sends the proposal to a single peer (highest reported
    /// ledger height, ties keeping config order) and returns its response
    /// payload without involving the orderer.
    pub async fn evaluate_transaction(
        &self,
        chaincode_id: &str,
        function: &str,
        args: &[&str],
    ) -> Result<Vec<u8>, ClientError> {
        let proposal = ProposalBuilder::new(chaincode_id, function)
            .channel(&self.config.name)
            .args(args.iter().map(|a| a.as_bytes().to_vec()))
            .nonce(self.signer.new_nonce())
            .build(&self.signer, &self.identity)?;
        let signed = proposal.sign(&self.signer, &self.identity)?;

        let peers = self.discovery.peers(&self.config.name).await?;
        // First-in-config wins among tied heights, matching the stable
        // descending sort the endorsement coordinator uses.
        let target = peers
            .iter()
            .enumerate()
            .max_by_key(|(index, peer)| (peer.ledger_height, Reverse(*index)))
            .map(|(_, peer)| peer)
            .ok_or_else(|| EndorseError::InvalidPlan("no peers configured".to_string()))?;
        let response = self
            .dispatcher
            .dispatch(&target.endpoint, &signed, self.config.timeouts.endorse())
            .await?;
        let inner = response.response.unwrap_or_default();
        if !(200..400).contains(&inner.status) {
            return Err(EndorseError::PeerFailure {
                endpoint: target.endpoint.clone(),
                message: format!("evaluate status {}: {}", inner.status, inner.message),
            }
            .into());
        }
        Ok(inner.payload)
    }

    /// Ledger height and block hashes, served by the query system
    /// chaincode.
    pub async fn query_chain_info(&self) -> Result<Vec<u8>, ClientError> {
        let name = self.config.name.clone();
        self.evaluate_transaction("qscc", "GetChainInfo", &[name.as_str()])
            .await
    }

    /// One block by number, served by the query system chaincode.
    pub async fn query_block_by_number(&self, number: u64) -> Result<Vec<u8>, ClientError> {
        let name = self.config.name.clone();
        let number = number.to_string();
        self.evaluate_transaction(
            "qscc",
            "GetBlockByNumber",
            &[name.as_str(), number.as_str()],
        )
        .await
    }

    /// Registers a block listener on the primary hub (the first configured
    /// peer's).
    pub fn register_block_event(
        &self,
        callback: BlockCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
        wants_full: bool,
    ) -> Result<ListenerHandle, ClientError> {
        Ok(self
            .primary_hub()?
            .register_block_event(callback, on_error, opts, wants_full)?)
    }

    /// Registers a transaction listener on the primary hub.
    pub fn register_tx_event(
        &self,
        tx_id: &str,
        callback: TxCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
    ) -> Result<ListenerHandle, ClientError> {
        Ok(self
            .primary_hub()?
            .register_tx_event(tx_id, callback, on_error, opts)?)
    }

    /// Registers a chaincode event listener on the primary hub.
    pub fn register_chaincode_event(
        &self,
        chaincode_pattern: &str,
        event_pattern: &str,
        callback: ChaincodeCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
        as_array: bool,
    ) -> Result<ListenerHandle, ClientError> {
        Ok(self.primary_hub()?.register_chaincode_event(
            chaincode_pattern,
            event_pattern,
            callback,
            on_error,
            opts,
            as_array,
        )?)
    }

    /// Removes a registration made through this facade.
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        self.hubs.iter().any(|hub| hub.unregister(handle))
    }

    fn primary_hub(&self) -> Result<&Arc<BlockEventHub>, EventError> {
        self.hubs.first().ok_or(EventError::NotConnected)
    }
}
