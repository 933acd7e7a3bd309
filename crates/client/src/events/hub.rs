// Path: crates/client/src/events/hub.rs
//! The block event hub.
//!
//! A hub owns one long-lived delivery stream to one replica and fans every
//! incoming block out to its registered block, transaction and chaincode
//! listeners. All dispatch runs on the stream reader task, so callbacks for
//! one hub are never invoked concurrently, and the next frame is not pulled
//! from the transport until the previous block's dispatch has finished
//! (consume-then-ack flow control; a persistently slow consumer pushes back
//! on the server rather than dropping blocks).

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use weft_api::HubIdentity;
use weft_proto::common::{Block, Envelope, Status};
use weft_proto::peer::deliver_client::DeliverClient;
use weft_proto::peer::{
    deliver_response, filtered_transaction, ChaincodeAction, ChaincodeActionPayload,
    ChaincodeEvent, FilteredBlock, ProposalResponsePayload, Transaction,
};
use weft_proto::status_name;
use weft_types::codec;
use weft_types::error::EventError;
use weft_types::events::{EndPosition, ListenOpts, StartPosition, ValidationCode};
use weft_types::identity::Identity;

use super::registration::{
    BlockCallback, BlockRegistration, ChaincodeCallback, ChaincodeRegistration, ErrorCallback,
    HandleKind, ListenerHandle, Registry, TxCallback, TxListenerKey, TxRegistration,
};
use super::{seek, BlockEvent, ChaincodeEventRecord, TxEvent};
use crate::signer::Signer;

/// Options for one delivery connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectOpts {
    /// Request full blocks (default) or filtered blocks.
    pub filtered: bool,
    /// Subscription start; defaults to the replay registration's bound, or
    /// NEWEST.
    pub start: Option<StartPosition>,
    /// Subscription end; defaults to the replay registration's bound, or
    /// unbounded.
    pub end: Option<EndPosition>,
    /// A pre-signed registration envelope, for callers holding no local key
    /// material.
    pub signed_envelope: Option<Envelope>,
}

/// Hub lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubStatus {
    Idle,
    Connecting,
    Connected,
    /// Terminal for this stream generation; `reconnect` starts a new one.
    Shutdown,
}

struct HubState {
    status: HubStatus,
    full_block: bool,
    end_requested: Option<EndPosition>,
    /// The concrete end block, once known. `Newest` resolves to the first
    /// delivered block.
    end_resolved: Option<u64>,
    replay_used: bool,
    replay_start: Option<StartPosition>,
    replay_end: Option<EndPosition>,
    replay_owner: Option<HandleKind>,
    replay_opts: ListenOpts,
    reader: Option<JoinHandle<()>>,
}

impl Default for HubState {
    fn default() -> Self {
        Self {
            status: HubStatus::Idle,
            full_block: true,
            end_requested: None,
            end_resolved: None,
            replay_used: false,
            replay_start: None,
            replay_end: None,
            replay_owner: None,
            replay_opts: ListenOpts::default(),
            reader: None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f`, trapping panics so one listener cannot disturb dispatch to the
/// others or the hub state machine.
fn guard_callback<F: FnOnce()>(f: F) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_err() {
        warn!("event listener panicked; continuing dispatch");
    }
}

pub(crate) struct HubShared {
    endpoint: String,
    msp_id: String,
    channel_id: String,
    transport: tonic::transport::Channel,
    signer: Signer,
    identity: Identity,
    setup_timeout: Duration,
    state: Mutex<HubState>,
    registry: Mutex<Registry>,
    last_seen: Mutex<Option<u64>>,
    generation: AtomicU64,
    next_id: AtomicU64,
}

/// A long-lived block-delivery subscription to one replica.
pub struct BlockEventHub {
    shared: Arc<HubShared>,
}

impl BlockEventHub {
    pub fn new(
        endpoint: impl Into<String>,
        msp_id: impl Into<String>,
        channel_id: impl Into<String>,
        transport: tonic::transport::Channel,
        signer: Signer,
        identity: Identity,
        setup_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(HubShared {
                endpoint: endpoint.into(),
                msp_id: msp_id.into(),
                channel_id: channel_id.into(),
                transport,
                signer,
                identity,
                setup_timeout,
                state: Mutex::new(HubState::default()),
                registry: Mutex::new(Registry::default()),
                last_seen: Mutex::new(None),
                generation: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// The replica endpoint this hub is attached to.
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// The MSP the replica belongs to.
    pub fn msp_id(&self) -> &str {
        &self.shared.msp_id
    }

    /// This hub's identity as seen by event strategies.
    pub fn hub_identity(&self) -> HubIdentity {
        HubIdentity {
            endpoint: self.shared.endpoint.clone(),
            msp_id: self.shared.msp_id.clone(),
        }
    }

    pub fn status(&self) -> HubStatus {
        lock(&self.shared.state).status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == HubStatus::Connected
    }

    /// The last block number this hub observed, if any.
    pub fn last_seen(&self) -> Option<u64> {
        *lock(&self.shared.last_seen)
    }

    /// Opens the delivery stream and resolves once the first frame arrives
    /// or the setup phase fails. Resolution happens exactly once per
    /// generation.
    pub async fn connect(&self, opts: ConnectOpts) -> Result<(), EventError> {
        let (generation, start, end) = self.shared.begin_connect(&opts)?;

        let envelope = match opts.signed_envelope {
            Some(envelope) => envelope,
            None => {
                let last_seen = *lock(&self.shared.last_seen);
                let start_pos = seek::resolve_start(start, last_seen);
                let (stop_pos, behavior) = seek::resolve_stop(end);
                match seek::build_seek_envelope(
                    &self.shared.signer,
                    &self.shared.identity,
                    &self.shared.channel_id,
                    start_pos,
                    stop_pos,
                    behavior,
                ) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        let err = EventError::Transport(format!(
                            "signing registration envelope: {}",
                            e
                        ));
                        self.shared.shutdown(generation, &err);
                        return Err(err);
                    }
                }
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let reader = tokio::spawn(run_stream(
            Arc::clone(&self.shared),
            generation,
            !opts.filtered,
            envelope,
            ready_tx,
        ));
        lock(&self.shared.state).reader = Some(reader);

        match tokio::time::timeout(self.shared.setup_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(_)) => {
                let err = EventError::Transport(
                    "delivery stream closed during setup".to_string(),
                );
                self.shared.shutdown(generation, &err);
                Err(err)
            }
            Err(_) => {
                let err = EventError::SetupTimeout;
                self.shared.shutdown(generation, &err);
                Err(err)
            }
        }
    }

    /// Starts a fresh stream generation after a shutdown. Replay bounds are
    /// not carried over; an unspecified start resumes from the last
    /// observed block.
    pub async fn reconnect(&self, mut opts: ConnectOpts) -> Result<(), EventError> {
        if opts.start.is_none() {
            opts.start = Some(StartPosition::LastSeen);
        }
        {
            let mut st = lock(&self.shared.state);
            if st.status != HubStatus::Shutdown {
                return Err(EventError::AlreadyConnected);
            }
            st.status = HubStatus::Idle;
            st.end_requested = None;
            st.end_resolved = None;
            st.reader = None;
        }
        self.connect(opts).await
    }

    /// Closes the hub: fires every error callback with an orderly
    /// disconnect and cancels the stream.
    pub fn close(&self) {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        let err = EventError::HubDisconnect {
            endpoint: self.shared.endpoint.clone(),
            hub_shutdown: true,
            reason: "closed by caller".to_string(),
        };
        self.shared.shutdown(generation, &err);
    }

    /// Registers a per-block listener.
    ///
    /// `wants_full` listeners require a full-block subscription and are
    /// skipped (with a warning) on a filtered one.
    pub fn register_block_event(
        &self,
        callback: BlockCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
        wants_full: bool,
    ) -> Result<ListenerHandle, EventError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = HandleKind::Block(id);
        self.shared.claim_replay(&opts, &handle)?;
        lock(&self.shared.registry).blocks.insert(
            id,
            BlockRegistration {
                callback,
                on_error,
                opts,
                wants_full,
            },
        );
        Ok(ListenerHandle(handle))
    }

    /// Registers a listener for one transaction id, or for every
    /// transaction with the key `"all"`. At most one listener per key.
    pub fn register_tx_event(
        &self,
        tx_id: &str,
        callback: TxCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
    ) -> Result<ListenerHandle, EventError> {
        let key = TxListenerKey::parse(tx_id);
        let handle = HandleKind::Tx(key.clone());
        {
            let registry = lock(&self.shared.registry);
            if registry.txs.contains_key(&key) {
                return Err(EventError::DuplicateTxListener(tx_id.to_string()));
            }
        }
        self.shared.claim_replay(&opts, &handle)?;
        lock(&self.shared.registry).txs.insert(
            key,
            TxRegistration {
                callback,
                on_error,
                opts,
            },
        );
        Ok(ListenerHandle(handle))
    }

    /// Registers a chaincode event listener. Both regular expressions must
    /// match for an event to be delivered; `as_array` batches the block's
    /// matches into a single call.
    pub fn register_chaincode_event(
        &self,
        chaincode_pattern: &str,
        event_pattern: &str,
        callback: ChaincodeCallback,
        on_error: Option<ErrorCallback>,
        opts: ListenOpts,
        as_array: bool,
    ) -> Result<ListenerHandle, EventError> {
        let chaincode = regex::Regex::new(chaincode_pattern)
            .map_err(|e| EventError::BadPattern(e.to_string()))?;
        let event = regex::Regex::new(event_pattern)
            .map_err(|e| EventError::BadPattern(e.to_string()))?;
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = HandleKind::Chaincode(id);
        self.shared.claim_replay(&opts, &handle)?;
        lock(&self.shared.registry).chaincodes.insert(
            id,
            ChaincodeRegistration {
                chaincode,
                event,
                callback,
                on_error,
                opts,
                as_array,
            },
        );
        Ok(ListenerHandle(handle))
    }

    /// Removes a registration. Returns false when the handle was already
    /// gone, making unregister-after-unregister a no-op.
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        lock(&self.shared.registry).remove(&handle.0)
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<HubShared> {
        &self.shared
    }
}

impl HubShared {
    /// Validates and applies the connect transition, returning the new
    /// generation and the resolved replay bounds.
    pub(crate) fn begin_connect(
        &self,
        opts: &ConnectOpts,
    ) -> Result<(u64, Option<StartPosition>, Option<EndPosition>), EventError> {
        let mut st = lock(&self.state);
        match st.status {
            HubStatus::Idle => {}
            HubStatus::Shutdown => return Err(EventError::NotConnected),
            _ => return Err(EventError::AlreadyConnected),
        }
        let start = opts.start.or(st.replay_start);
        let end = opts.end.or(st.replay_end);
        st.status = HubStatus::Connecting;
        st.full_block = !opts.filtered;
        st.end_requested = end;
        st.end_resolved = match end {
            Some(EndPosition::Exact(number)) => Some(number),
            _ => None,
        };
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((generation, start, end))
    }

    pub(crate) fn mark_connected(&self) {
        let mut st = lock(&self.state);
        if st.status == HubStatus::Connecting {
            st.status = HubStatus::Connected;
        }
    }

    /// A registration carrying replay bounds claims the hub's single replay
    /// slot; only valid before connect and before any other listener.
    fn claim_replay(&self, opts: &ListenOpts, owner: &HandleKind) -> Result<(), EventError> {
        if opts.start_block.is_none() && opts.end_block.is_none() {
            return Ok(());
        }
        let registry_empty = lock(&self.registry).is_empty();
        let mut st = lock(&self.state);
        if st.status != HubStatus::Idle {
            return Err(EventError::ReplayConflict(
                "hub is already connected".to_string(),
            ));
        }
        if !registry_empty {
            return Err(EventError::ReplayConflict(
                "other listeners are already registered".to_string(),
            ));
        }
        if st.replay_used {
            return Err(EventError::ReplayConflict(
                "a replay listener was already registered on this hub".to_string(),
            ));
        }
        st.replay_used = true;
        st.replay_start = opts.start_block;
        st.replay_end = opts.end_block;
        st.replay_owner = Some(owner.clone());
        st.replay_opts = *opts;
        Ok(())
    }

    /// Transitions to `Shutdown`, fires every error callback with `error`,
    /// and cancels the stream. Idempotent; stale generations are ignored.
    pub(crate) fn shutdown(&self, generation: u64, error: &EventError) {
        {
            let mut st = lock(&self.state);
            if st.status == HubStatus::Shutdown {
                return;
            }
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            st.status = HubStatus::Shutdown;
            if let Some(reader) = st.reader.take() {
                reader.abort();
            }
        }
        info!(endpoint = %self.endpoint, error = %error, "event hub shut down");
        let callbacks = lock(&self.registry).error_callbacks();
        for callback in callbacks {
            guard_callback(|| callback(error));
        }
    }

    /// Delivers one block to every matching registration. Returns `Break`
    /// when the hub shut down as a result of this block.
    pub(crate) fn dispatch_block(
        &self,
        generation: u64,
        event: BlockEvent,
    ) -> ControlFlow<()> {
        {
            let st = lock(&self.state);
            if st.status == HubStatus::Shutdown
                || self.generation.load(Ordering::SeqCst) != generation
            {
                return ControlFlow::Break(());
            }
        }
        let number = event.number();
        *lock(&self.last_seen) = Some(number);
        debug!(endpoint = %self.endpoint, block = number, "dispatching block");

        let is_full = matches!(event, BlockEvent::Full(_));
        let mut fired: Vec<(HandleKind, ListenOpts)> = Vec::new();

        // Snapshot registrations so callbacks may add or remove listeners
        // without deadlocking against the registry lock.
        let (block_regs, tx_regs, cc_regs) = {
            let registry = lock(&self.registry);
            (
                registry
                    .blocks
                    .iter()
                    .map(|(id, r)| (*id, r.callback.clone(), r.opts, r.wants_full))
                    .collect::<Vec<_>>(),
                registry
                    .txs
                    .iter()
                    .map(|(key, r)| (key.clone(), r.callback.clone(), r.opts))
                    .collect::<Vec<_>>(),
                registry
                    .chaincodes
                    .iter()
                    .map(|(id, r)| {
                        (
                            *id,
                            r.chaincode.clone(),
                            r.event.clone(),
                            r.callback.clone(),
                            r.opts,
                            r.as_array,
                        )
                    })
                    .collect::<Vec<_>>(),
            )
        };

        // 1. Block listeners.
        for (id, callback, opts, wants_full) in &block_regs {
            if *wants_full && !is_full {
                warn!(
                    endpoint = %self.endpoint,
                    "skipping full-block listener on a filtered subscription"
                );
                continue;
            }
            guard_callback(|| callback(&event));
            fired.push((HandleKind::Block(*id), *opts));
        }

        // 2. Transaction listeners: exact id plus the "all" wildcard.
        let commits = match &event {
            BlockEvent::Full(block) => full_block_commits(block),
            BlockEvent::Filtered(block) => filtered_commits(block),
        };
        for (tx_id, code) in &commits {
            let tx_event = TxEvent {
                tx_id: tx_id.clone(),
                code: *code,
                block_number: number,
                endpoint: self.endpoint.clone(),
            };
            for key in [TxListenerKey::Tx(tx_id.clone()), TxListenerKey::All] {
                if let Some((matched_key, callback, opts)) =
                    tx_regs.iter().find(|(k, _, _)| *k == key)
                {
                    guard_callback(|| callback(&tx_event));
                    fired.push((HandleKind::Tx(matched_key.clone()), *opts));
                }
            }
        }

        // 3. Chaincode events from successfully committed transactions.
        let cc_events = match &event {
            BlockEvent::Full(block) => full_block_chaincode_events(block, &commits),
            BlockEvent::Filtered(block) => filtered_chaincode_events(block),
        };
        for (id, cc_re, ev_re, callback, opts, as_array) in &cc_regs {
            let matched: Vec<ChaincodeEventRecord> = cc_events
                .iter()
                .filter(|e| cc_re.is_match(&e.chaincode_id) && ev_re.is_match(&e.event_name))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }
            if *as_array {
                guard_callback(|| callback(&matched));
            } else {
                for record in &matched {
                    guard_callback(|| callback(std::slice::from_ref(record)));
                }
            }
            fired.push((HandleKind::Chaincode(*id), *opts));
        }

        // 4. Post-delivery actions. The replay registration's unregister
        // and disconnect flags are end-of-stream actions and fire only once
        // its end block is met, not after every delivery.
        let replay_owner = lock(&self.state).replay_owner.clone();
        let mut disconnect_requested = false;
        {
            let mut registry = lock(&self.registry);
            for (handle, opts) in &fired {
                if replay_owner.as_ref() == Some(handle) {
                    continue;
                }
                if opts.unregister {
                    registry.remove(handle);
                }
                if opts.disconnect {
                    disconnect_requested = true;
                }
            }
        }

        // 5. Replay termination.
        let mut end_seen = false;
        {
            let mut st = lock(&self.state);
            if st.end_resolved.is_none()
                && matches!(st.end_requested, Some(EndPosition::Newest))
            {
                // NEWEST resolves at server receipt; the first delivered
                // block is the boundary.
                st.end_resolved = Some(number);
            }
            if let Some(end) = st.end_resolved {
                if number >= end {
                    end_seen = true;
                }
            }
        }
        if end_seen {
            // Shut down first so every error callback, the triggering
            // registration's included, sees the end-of-stream disconnect;
            // its unregister action runs after.
            let err = EventError::HubDisconnect {
                endpoint: self.endpoint.clone(),
                hub_shutdown: true,
                reason: "end block seen".to_string(),
            };
            self.shutdown(generation, &err);
            let owner = {
                let st = lock(&self.state);
                st.replay_owner.clone().map(|owner| (owner, st.replay_opts))
            };
            if let Some((owner, opts)) = owner {
                if opts.unregister {
                    lock(&self.registry).remove(&owner);
                }
            }
            return ControlFlow::Break(());
        }
        if disconnect_requested {
            let err = EventError::HubDisconnect {
                endpoint: self.endpoint.clone(),
                hub_shutdown: true,
                reason: "listener requested disconnect".to_string(),
            };
            self.shutdown(generation, &err);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

/// The stream reader: opens the call, signals readiness on the first
/// frame, and dispatches every block in arrival order.
async fn run_stream(
    shared: Arc<HubShared>,
    generation: u64,
    full_block: bool,
    envelope: Envelope,
    ready: oneshot::Sender<Result<(), EventError>>,
) {
    let mut ready = Some(ready);
    let (tx, rx) = mpsc::channel::<Envelope>(1);
    if tx.send(envelope).await.is_err() {
        return;
    }
    let outbound = ReceiverStream::new(rx);
    let mut client = DeliverClient::new(shared.transport.clone());
    let call = if full_block {
        client.deliver(outbound).await
    } else {
        client.deliver_filtered(outbound).await
    };
    let mut stream = match call {
        Ok(response) => response.into_inner(),
        Err(status) => {
            let err = EventError::Transport(status.to_string());
            if let Some(r) = ready.take() {
                let _ = r.send(Err(err.clone()));
            }
            shared.shutdown(generation, &err);
            return;
        }
    };
    // The send half stays open for the stream's lifetime; dropping it would
    // half-close the call before the server finishes delivering.
    let _outbound_keepalive = tx;

    loop {
        match stream.message().await {
            Ok(Some(frame)) => {
                if shared.generation.load(Ordering::SeqCst) != generation {
                    // Late arrival from a cancelled stream: discard.
                    return;
                }
                if let Some(r) = ready.take() {
                    let _ = r.send(Ok(()));
                    shared.mark_connected();
                }
                match frame.r#type {
                    Some(deliver_response::Type::Status(status)) => {
                        let orderly = status == Status::Success as i32;
                        let err = EventError::HubDisconnect {
                            endpoint: shared.endpoint.clone(),
                            hub_shutdown: orderly,
                            reason: format!("deliver status {}", status_name(status)),
                        };
                        shared.shutdown(generation, &err);
                        return;
                    }
                    Some(deliver_response::Type::Block(block)) => {
                        if shared
                            .dispatch_block(generation, BlockEvent::Full(block))
                            .is_break()
                        {
                            return;
                        }
                    }
                    Some(deliver_response::Type::FilteredBlock(block)) => {
                        if shared
                            .dispatch_block(generation, BlockEvent::Filtered(block))
                            .is_break()
                        {
                            return;
                        }
                    }
                    None => {}
                }
            }
            Ok(None) => {
                if shared.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                let err = EventError::HubDisconnect {
                    endpoint: shared.endpoint.clone(),
                    hub_shutdown: false,
                    reason: "delivery stream ended".to_string(),
                };
                if let Some(r) = ready.take() {
                    let _ = r.send(Err(EventError::Transport(
                        "stream ended before first frame".to_string(),
                    )));
                }
                shared.shutdown(generation, &err);
                return;
            }
            Err(status) => {
                if shared.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                let err = EventError::HubDisconnect {
                    endpoint: shared.endpoint.clone(),
                    hub_shutdown: false,
                    reason: format!("delivery stream error: {}", status),
                };
                if let Some(r) = ready.take() {
                    let _ = r.send(Err(EventError::Transport(status.to_string())));
                }
                shared.shutdown(generation, &err);
                return;
            }
        }
    }
}

/// (tx_id, validation code) pairs of a full block, in block order. Codes
/// come from the transactions-filter vector in the block metadata.
fn full_block_commits(block: &Block) -> Vec<(String, ValidationCode)> {
    const TRANSACTIONS_FILTER_INDEX: usize = 2;
    let codes: &[u8] = block
        .metadata
        .as_ref()
        .and_then(|m| m.metadata.get(TRANSACTIONS_FILTER_INDEX))
        .map(|v| v.as_slice())
        .unwrap_or(&[]);
    let mut out = Vec::new();
    let Some(data) = &block.data else {
        return out;
    };
    for (index, envelope_bytes) in data.data.iter().enumerate() {
        let Some(tx_id) = envelope_tx_id(envelope_bytes) else {
            continue;
        };
        let code = codes
            .get(index)
            .map(|byte| ValidationCode::from_i32(*byte as i32))
            .unwrap_or(ValidationCode::NotValidated);
        out.push((tx_id, code));
    }
    out
}

fn envelope_tx_id(envelope_bytes: &[u8]) -> Option<String> {
    let envelope: Envelope = codec::from_bytes_canonical(envelope_bytes).ok()?;
    let payload: weft_proto::common::Payload =
        codec::from_bytes_canonical(&envelope.payload).ok()?;
    let header = payload.header?;
    let channel_header: weft_proto::common::ChannelHeader =
        codec::from_bytes_canonical(&header.channel_header).ok()?;
    if channel_header.tx_id.is_empty() {
        None
    } else {
        Some(channel_header.tx_id)
    }
}

fn filtered_commits(block: &FilteredBlock) -> Vec<(String, ValidationCode)> {
    block
        .filtered_transactions
        .iter()
        .map(|tx| (tx.txid.clone(), ValidationCode::from_i32(tx.tx_validation_code)))
        .collect()
}

/// Chaincode events emitted by the block's successfully committed
/// transactions, in block order.
fn full_block_chaincode_events(
    block: &Block,
    commits: &[(String, ValidationCode)],
) -> Vec<ChaincodeEventRecord> {
    let number = block.header.as_ref().map(|h| h.number).unwrap_or(0);
    let mut out = Vec::new();
    let Some(data) = &block.data else {
        return out;
    };
    for (index, envelope_bytes) in data.data.iter().enumerate() {
        match commits.get(index) {
            Some((_, code)) if code.is_valid() => {}
            _ => continue,
        }
        let Ok(envelope) = codec::from_bytes_canonical::<Envelope>(envelope_bytes) else {
            continue;
        };
        let Ok(payload) =
            codec::from_bytes_canonical::<weft_proto::common::Payload>(&envelope.payload)
        else {
            continue;
        };
        let Ok(transaction) = codec::from_bytes_canonical::<Transaction>(&payload.data) else {
            continue;
        };
        for action in &transaction.actions {
            let Ok(action_payload) =
                codec::from_bytes_canonical::<ChaincodeActionPayload>(&action.payload)
            else {
                continue;
            };
            let Some(endorsed) = action_payload.action else {
                continue;
            };
            let Ok(response_payload) = codec::from_bytes_canonical::<ProposalResponsePayload>(
                &endorsed.proposal_response_payload,
            ) else {
                continue;
            };
            let Ok(chaincode_action) =
                codec::from_bytes_canonical::<ChaincodeAction>(&response_payload.extension)
            else {
                continue;
            };
            if chaincode_action.events.is_empty() {
                continue;
            }
            let Ok(event) =
                codec::from_bytes_canonical::<ChaincodeEvent>(&chaincode_action.events)
            else {
                continue;
            };
            if event.event_name.is_empty() {
                continue;
            }
            out.push(ChaincodeEventRecord {
                chaincode_id: event.chaincode_id,
                tx_id: event.tx_id,
                event_name: event.event_name,
                payload: event.payload,
                block_number: number,
            });
        }
    }
    out
}

fn filtered_chaincode_events(block: &FilteredBlock) -> Vec<ChaincodeEventRecord> {
    let mut out = Vec::new();
    for tx in &block.filtered_transactions {
        if !ValidationCode::from_i32(tx.tx_validation_code).is_valid() {
            continue;
        }
        let Some(filtered_transaction::Data::TransactionActions(actions)) = &tx.data else {
            continue;
        };
        for action in &actions.chaincode_actions {
            let Some(event) = &action.chaincode_event else {
                continue;
            };
            if event.event_name.is_empty() {
                continue;
            }
            out.push(ChaincodeEventRecord {
                chaincode_id: event.chaincode_id.clone(),
                tx_id: event.tx_id.clone(),
                event_name: event.event_name.clone(),
                // Payloads are stripped from filtered blocks.
                payload: Vec::new(),
                block_number: block.number,
            });
        }
    }
    out
}
