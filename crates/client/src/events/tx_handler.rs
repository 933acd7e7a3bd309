// Path: crates/client/src/events/tx_handler.rs
//! The per-submit commit wait.
//!
//! A counting barrier over a set of connected event hubs: the strategy
//! selects which hubs to listen on and how many notifications resolve the
//! wait. A hub that errors counts as having responded, so a partially-down
//! network cannot stall the strategy past its timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

use weft_api::{EventStrategyFactory, HubIdentity, TxEventStrategy};
use weft_types::error::{EventError, TxWaitError};
use weft_types::events::ListenOpts;
use weft_types::identity::TransactionId;
use weft_types::submit::EventStrategy;

use super::hub::BlockEventHub;
use super::registration::ListenerHandle;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct WaitShared {
    tx_id: String,
    expected: AtomicUsize,
    count: AtomicUsize,
    outcome: Mutex<Option<Result<(), TxWaitError>>>,
    notify: Notify,
}

impl WaitShared {
    fn settle(&self, outcome: Result<(), TxWaitError>) {
        let mut slot = lock(&self.outcome);
        if slot.is_none() {
            *slot = Some(outcome);
        }
        drop(slot);
        self.notify.notify_one();
    }

    /// One notification arrived: a valid commit, or a hub error standing in
    /// for one.
    fn record_response(&self) {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.expected.load(Ordering::SeqCst) {
            self.settle(Ok(()));
        } else {
            self.notify.notify_one();
        }
    }
}

/// Waits for commit notifications for one submitted transaction.
pub struct TransactionEventHandler {
    tx_id: TransactionId,
    hubs: Vec<Arc<BlockEventHub>>,
    caller_msp: String,
    strategy: Arc<dyn TxEventStrategy>,
    timeout: Duration,
    shared: Arc<WaitShared>,
    handles: Mutex<Vec<(usize, ListenerHandle)>>,
}

impl TransactionEventHandler {
    pub fn new(
        tx_id: TransactionId,
        hubs: Vec<Arc<BlockEventHub>>,
        caller_msp: impl Into<String>,
        strategy: Arc<dyn TxEventStrategy>,
        timeout: Duration,
    ) -> Self {
        let shared = Arc::new(WaitShared {
            tx_id: tx_id.as_str().to_string(),
            expected: AtomicUsize::new(usize::MAX),
            count: AtomicUsize::new(0),
            outcome: Mutex::new(None),
            notify: Notify::new(),
        });
        Self {
            tx_id,
            hubs,
            caller_msp: caller_msp.into(),
            strategy,
            timeout,
            shared,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Attaches a transaction listener on every hub the strategy scopes in.
    ///
    /// With no hub in scope the wait resolves immediately (best effort). A
    /// listener already registered for this transaction id is a hard error:
    /// transaction ids must not be reused.
    pub fn start_listening(&self) -> Result<(), EventError> {
        let identities: Vec<HubIdentity> =
            self.hubs.iter().map(|hub| hub.hub_identity()).collect();
        let scope = self.strategy.scope(&self.caller_msp, &identities);
        let expected = self.strategy.expected(scope.len());
        self.shared.expected.store(expected, Ordering::SeqCst);
        if expected == 0 {
            debug!(tx_id = %self.tx_id, "no event hub in scope; resolving immediately");
            self.shared.settle(Ok(()));
            return Ok(());
        }

        for index in scope {
            let Some(hub) = self.hubs.get(index) else {
                continue;
            };
            let on_event = {
                let shared = Arc::clone(&self.shared);
                Arc::new(move |event: &super::TxEvent| {
                    if event.code.is_valid() {
                        shared.record_response();
                    } else {
                        shared.settle(Err(TxWaitError::Invalid {
                            tx_id: shared.tx_id.clone(),
                            endpoint: event.endpoint.clone(),
                            code: event.code,
                        }));
                    }
                })
            };
            let on_error = {
                let shared = Arc::clone(&self.shared);
                Arc::new(move |_: &EventError| {
                    // An errored hub has "responded"; the strategy count
                    // must not stall on it.
                    shared.record_response();
                })
            };
            let handle = match hub.register_tx_event(
                self.tx_id.as_str(),
                on_event,
                Some(on_error),
                ListenOpts {
                    unregister: true,
                    ..Default::default()
                },
            ) {
                Ok(handle) => handle,
                Err(err) => {
                    self.cancel_listening();
                    return Err(err);
                }
            };
            lock(&self.handles).push((index, handle));
        }
        Ok(())
    }

    /// Resolves when the strategy quorum is met, rejects on an invalid
    /// validation code or on timeout. Listeners and the timer are torn down
    /// on every exit path.
    pub async fn wait_for_events(&self) -> Result<(), TxWaitError> {
        let wait = async {
            loop {
                if let Some(outcome) = lock(&self.shared.outcome).clone() {
                    return outcome;
                }
                self.shared.notify.notified().await;
            }
        };
        let outcome = match tokio::time::timeout(self.timeout, wait).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TxWaitError::Timeout {
                tx_id: self.tx_id.as_str().to_string(),
            }),
        };
        self.cancel_listening();
        outcome
    }

    /// Removes every listener this handler attached. Idempotent, and safe
    /// to call from inside a listener callback.
    pub fn cancel_listening(&self) {
        let handles = std::mem::take(&mut *lock(&self.handles));
        for (index, handle) in handles {
            if let Some(hub) = self.hubs.get(index) {
                hub.unregister(&handle);
            }
        }
    }
}

/// The closed-set strategies: any/all within the caller's MSP or across
/// the whole network.
#[derive(Debug, Clone, Copy)]
struct ScopedStrategy {
    network: bool,
    all: bool,
}

impl TxEventStrategy for ScopedStrategy {
    fn scope(&self, caller_msp: &str, hubs: &[HubIdentity]) -> Vec<usize> {
        hubs.iter()
            .enumerate()
            .filter(|(_, hub)| self.network || hub.msp_id == caller_msp)
            .map(|(index, _)| index)
            .collect()
    }

    fn expected(&self, in_scope: usize) -> usize {
        if self.all {
            in_scope
        } else {
            in_scope.min(1)
        }
    }
}

/// The `None` strategy: listen nowhere, resolve immediately.
#[derive(Debug, Clone, Copy)]
struct NoListening;

impl TxEventStrategy for NoListening {
    fn scope(&self, _caller_msp: &str, _hubs: &[HubIdentity]) -> Vec<usize> {
        Vec::new()
    }

    fn expected(&self, _in_scope: usize) -> usize {
        0
    }
}

/// Maps the closed strategy set to implementations; callers plug in their
/// own factory for anything beyond it.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategyFactory {
    pub strategy: EventStrategy,
}

impl DefaultStrategyFactory {
    pub fn new(strategy: EventStrategy) -> Self {
        Self { strategy }
    }
}

impl EventStrategyFactory for DefaultStrategyFactory {
    fn create(&self, _tx_id: &TransactionId) -> Arc<dyn TxEventStrategy> {
        match self.strategy {
            EventStrategy::MspAnyForTx => Arc::new(ScopedStrategy {
                network: false,
                all: false,
            }),
            EventStrategy::MspAllForTx => Arc::new(ScopedStrategy {
                network: false,
                all: true,
            }),
            EventStrategy::NetworkAnyForTx => Arc::new(ScopedStrategy {
                network: true,
                all: false,
            }),
            EventStrategy::NetworkAllForTx => Arc::new(ScopedStrategy {
                network: true,
                all: true,
            }),
            EventStrategy::None => Arc::new(NoListening),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::hub::ConnectOpts;
    use crate::events::BlockEvent;
    use crate::signer::Signer;
    use weft_api::CryptoSuite;
    use weft_crypto::SoftwareCryptoSuite;
    use weft_proto::peer::{FilteredBlock, FilteredTransaction};
    use weft_types::identity::Identity;

    fn test_hub(endpoint: &str, msp_id: &str) -> Arc<BlockEventHub> {
        let certified =
            rcgen::generate_simple_self_signed(vec!["client.org1".to_string()]).expect("cert");
        let suite = Arc::new(SoftwareCryptoSuite::new());
        let handle = suite
            .import_key(&certified.key_pair.serialize_pem())
            .expect("import");
        let identity = Identity {
            msp_id: msp_id.to_string(),
            certificate: certified.cert.pem().into_bytes(),
            key: handle,
        };
        let transport =
            tonic::transport::Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        Arc::new(BlockEventHub::new(
            endpoint,
            msp_id,
            "mychannel",
            transport,
            Signer::new(suite),
            identity,
            Duration::from_secs(5),
        ))
    }

    fn connect(hub: &Arc<BlockEventHub>) -> u64 {
        let opts = ConnectOpts {
            filtered: true,
            ..Default::default()
        };
        let (generation, _, _) = hub.shared().begin_connect(&opts).expect("begin_connect");
        hub.shared().mark_connected();
        generation
    }

    fn deliver_commit(hub: &Arc<BlockEventHub>, generation: u64, number: u64, tx_id: &str, code: i32) {
        hub.shared().dispatch_block(
            generation,
            BlockEvent::Filtered(FilteredBlock {
                channel_id: "mychannel".to_string(),
                number,
                filtered_transactions: vec![FilteredTransaction {
                    txid: tx_id.to_string(),
                    r#type: 3,
                    tx_validation_code: code,
                    data: None,
                }],
            }),
        );
    }

    fn handler(
        hubs: Vec<Arc<BlockEventHub>>,
        strategy: EventStrategy,
        timeout: Duration,
    ) -> TransactionEventHandler {
        TransactionEventHandler::new(
            TransactionId::parse("aabb01").expect("tx id"),
            hubs,
            "Org1MSP",
            DefaultStrategyFactory::new(strategy)
                .create(&TransactionId::parse("aabb01").expect("tx id")),
            timeout,
        )
    }

    #[tokio::test]
    async fn any_strategy_resolves_on_first_valid_commit() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        let generation = connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        deliver_commit(&hub, generation, 10, "aabb01", 0);
        handler.wait_for_events().await.expect("resolve");
    }

    #[tokio::test]
    async fn all_strategy_waits_for_every_hub_in_scope() {
        let hub_a = test_hub("peer0:7051", "Org1MSP");
        let hub_b = test_hub("peer1:7051", "Org1MSP");
        let gen_a = connect(&hub_a);
        let gen_b = connect(&hub_b);
        let handler = handler(
            vec![Arc::clone(&hub_a), Arc::clone(&hub_b)],
            EventStrategy::MspAllForTx,
            Duration::from_millis(500),
        );
        handler.start_listening().expect("start");

        deliver_commit(&hub_a, gen_a, 10, "aabb01", 0);
        // Only one of two notified: the wait must still be pending.
        assert!(lock(&handler.shared.outcome).is_none());

        deliver_commit(&hub_b, gen_b, 10, "aabb01", 0);
        handler.wait_for_events().await.expect("resolve");
    }

    #[tokio::test]
    async fn invalid_code_rejects_with_peer_and_code() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        let generation = connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        deliver_commit(&hub, generation, 10, "aabb01", 11);
        match handler.wait_for_events().await {
            Err(TxWaitError::Invalid { endpoint, code, .. }) => {
                assert_eq!(endpoint, "peer0:7051");
                assert_eq!(code.as_str(), "MVCC_READ_CONFLICT");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn an_errored_hub_counts_as_responded() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAllForTx,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        // The hub goes down; its error callback stands in for the commit
        // notification.
        hub.close();
        handler.wait_for_events().await.expect("resolve");
    }

    #[tokio::test]
    async fn out_of_scope_hubs_resolve_immediately() {
        let hub = test_hub("peer0:7051", "Org2MSP");
        connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        handler.wait_for_events().await.expect("resolve");
    }

    #[tokio::test]
    async fn none_strategy_is_a_noop() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::None,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        handler.wait_for_events().await.expect("resolve");
        // Nothing was registered on the hub.
        assert!(lock(&handler.handles).is_empty());
    }

    #[tokio::test]
    async fn missing_events_time_out() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_millis(50),
        );
        handler.start_listening().expect("start");
        assert!(matches!(
            handler.wait_for_events().await,
            Err(TxWaitError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn reused_transaction_ids_are_a_hard_error() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        connect(&hub);
        let first = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        first.start_listening().expect("start");
        let second = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        assert!(matches!(
            second.start_listening(),
            Err(EventError::DuplicateTxListener(_))
        ));
    }

    #[tokio::test]
    async fn cancel_listening_is_idempotent() {
        let hub = test_hub("peer0:7051", "Org1MSP");
        connect(&hub);
        let handler = handler(
            vec![Arc::clone(&hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        );
        handler.start_listening().expect("start");
        handler.cancel_listening();
        handler.cancel_listening();
        // The listener is gone: a new handler for the same id may register.
        let next = handler_replacement(&hub);
        next.start_listening().expect("start after cancel");
    }

    fn handler_replacement(hub: &Arc<BlockEventHub>) -> TransactionEventHandler {
        handler(
            vec![Arc::clone(hub)],
            EventStrategy::MspAnyForTx,
            Duration::from_secs(5),
        )
    }
}
