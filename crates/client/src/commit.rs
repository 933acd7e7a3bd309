// Path: crates/client/src/commit.rs
//! The commit coordinator.
//!
//! Broadcasts an endorsed envelope to the ordering service. Orderers are
//! shuffled uniformly per call to spread load, with endpoints previously
//! observed as disconnected tried last; the first `SUCCESS` response is
//! terminal and the last error is surfaced when every orderer fails.

use async_trait::async_trait;
use dashmap::DashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use weft_api::CommitHandler;
use weft_proto::common::{Envelope, Status};
use weft_proto::orderer::broadcast_client::BroadcastClient;
use weft_proto::orderer::BroadcastResponse;
use weft_proto::status_name;
use weft_types::error::CommitError;
use weft_types::submit::{BroadcastResult, CommitOpts};

use crate::config::OrdererConfig;
use crate::endpoint::EndpointPool;

/// Sends one envelope to one orderer.
#[async_trait]
pub trait BroadcastDispatcher: Send + Sync {
    /// Broadcasts `envelope` to `endpoint` with the given deadline.
    async fn broadcast(
        &self,
        endpoint: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<BroadcastResponse, CommitError>;
}

/// The gRPC dispatcher used in production: one lazy channel per orderer.
pub struct GrpcBroadcastDispatcher {
    pool: Arc<EndpointPool>,
    orderers: Vec<OrdererConfig>,
}

impl GrpcBroadcastDispatcher {
    pub fn new(pool: Arc<EndpointPool>, orderers: Vec<OrdererConfig>) -> Self {
        Self { pool, orderers }
    }
}

#[async_trait]
impl BroadcastDispatcher for GrpcBroadcastDispatcher {
    async fn broadcast(
        &self,
        endpoint: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<BroadcastResponse, CommitError> {
        let tls = self
            .orderers
            .iter()
            .find(|o| o.endpoint == endpoint)
            .and_then(|o| o.tls.as_ref());
        let channel = self
            .pool
            .channel_for(endpoint, tls)
            .map_err(|e| CommitError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        let mut client = BroadcastClient::new(channel);
        let call = client.broadcast(tonic::Request::new(envelope.clone()));
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(CommitError::Transport {
                endpoint: endpoint.to_string(),
                message: status.to_string(),
            }),
            Err(_) => Err(CommitError::Timeout {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

/// Broadcasts envelopes with shuffle and failover. Holds no per-call
/// state; only the orderer list (read-only) and the set of endpoints last
/// observed as disconnected.
pub struct CommitCoordinator {
    dispatcher: Arc<dyn BroadcastDispatcher>,
    orderers: Vec<String>,
    disconnected: DashSet<String>,
    default_timeout: Duration,
}

impl CommitCoordinator {
    pub fn new(
        dispatcher: Arc<dyn BroadcastDispatcher>,
        orderers: Vec<String>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            orderers,
            disconnected: DashSet::new(),
            default_timeout,
        }
    }

    /// Submits `envelope`, trying orderers in shuffled two-pass order.
    ///
    /// The orderer deduplicates at its end: a replayed envelope comes back
    /// as `SUCCESS`, so commit is idempotent at this layer.
    pub async fn commit(
        &self,
        envelope: &Envelope,
        opts: &CommitOpts,
    ) -> Result<BroadcastResult, CommitError> {
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        // Single-target mode: one shot, no failover.
        if let Some(endpoint) = &opts.orderer {
            return self.try_one(endpoint, envelope, timeout).await;
        }

        if self.orderers.is_empty() {
            return Err(CommitError::NoOrderers);
        }
        let order = self.failover_order(&mut rand::thread_rng());

        let mut last_err = None;
        for endpoint in &order {
            match self.try_one(endpoint, envelope, timeout).await {
                Ok(result) => {
                    debug!(orderer = %endpoint, "broadcast accepted");
                    return Ok(result);
                }
                Err(err) => {
                    warn!(orderer = %endpoint, error = %err, "broadcast attempt failed");
                    last_err = Some(err);
                }
            }
        }
        // self.orderers is non-empty, so at least one attempt ran.
        Err(last_err.unwrap_or(CommitError::NoOrderers))
    }

    async fn try_one(
        &self,
        endpoint: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<BroadcastResult, CommitError> {
        match self.dispatcher.broadcast(endpoint, envelope, timeout).await {
            Ok(response) if response.status == Status::Success as i32 => {
                self.disconnected.remove(endpoint);
                Ok(BroadcastResult {
                    endpoint: endpoint.to_string(),
                    status: status_name(response.status).to_string(),
                })
            }
            Ok(response) => {
                self.disconnected.remove(endpoint);
                Err(CommitError::Rejected {
                    endpoint: endpoint.to_string(),
                    status: status_name(response.status).to_string(),
                })
            }
            Err(err) => {
                if matches!(err, CommitError::Transport { .. } | CommitError::Timeout { .. }) {
                    self.disconnected.insert(endpoint.to_string());
                }
                Err(err)
            }
        }
    }

    /// Shuffles the orderer list, then partitions it so endpoints last
    /// observed as disconnected come after the rest (reconnect-and-retry
    /// pass), preserving the shuffled order within each partition.
    fn failover_order<R: Rng>(&self, rng: &mut R) -> Vec<String> {
        let mut shuffled = self.orderers.clone();
        shuffled.shuffle(rng);
        let (connected, disconnected): (Vec<String>, Vec<String>) = shuffled
            .into_iter()
            .partition(|endpoint| !self.disconnected.contains(endpoint));
        let mut order = connected;
        order.extend(disconnected);
        order
    }
}

#[async_trait]
impl CommitHandler for CommitCoordinator {
    async fn commit(
        &self,
        envelope: &Envelope,
        opts: &CommitOpts,
    ) -> Result<BroadcastResult, CommitError> {
        CommitCoordinator::commit(self, envelope, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Per-endpoint scripted outcomes.
    #[derive(Default)]
    struct MockBroadcaster {
        rejecting: DashMap<String, i32>,
        unreachable: DashSet<String>,
        calls: DashMap<String, AtomicUsize>,
    }

    impl MockBroadcaster {
        fn rejecting(self, endpoint: &str, status: Status) -> Self {
            self.rejecting.insert(endpoint.to_string(), status as i32);
            self
        }

        fn unreachable(self, endpoint: &str) -> Self {
            self.unreachable.insert(endpoint.to_string());
            self
        }

        fn calls_to(&self, endpoint: &str) -> usize {
            self.calls
                .get(endpoint)
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl BroadcastDispatcher for MockBroadcaster {
        async fn broadcast(
            &self,
            endpoint: &str,
            _envelope: &Envelope,
            _timeout: Duration,
        ) -> Result<BroadcastResponse, CommitError> {
            self.calls
                .entry(endpoint.to_string())
                .or_insert_with(|| AtomicUsize::new(0))
                .fetch_add(1, Ordering::SeqCst);
            if self.unreachable.contains(endpoint) {
                return Err(CommitError::Transport {
                    endpoint: endpoint.to_string(),
                    message: "connection refused".to_string(),
                });
            }
            let status = self
                .rejecting
                .get(endpoint)
                .map(|s| *s)
                .unwrap_or(Status::Success as i32);
            Ok(BroadcastResponse {
                status,
                info: String::new(),
            })
        }
    }

    fn orderers() -> Vec<String> {
        vec![
            "o1:7050".to_string(),
            "o2:7050".to_string(),
            "o3:7050".to_string(),
        ]
    }

    fn coordinator(dispatcher: Arc<MockBroadcaster>) -> CommitCoordinator {
        CommitCoordinator::new(dispatcher, orderers(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn first_success_is_terminal() {
        let dispatcher = Arc::new(MockBroadcaster::default());
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let result = coordinator
            .commit(&Envelope::default(), &CommitOpts::default())
            .await
            .expect("commit");
        assert_eq!(result.status, "SUCCESS");
        // Exactly one orderer was contacted.
        let total: usize = orderers().iter().map(|o| dispatcher.calls_to(o)).sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn failover_advances_past_rejections() {
        let dispatcher = Arc::new(
            MockBroadcaster::default()
                .rejecting("o1:7050", Status::ServiceUnavailable)
                .rejecting("o2:7050", Status::ServiceUnavailable),
        );
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let result = coordinator
            .commit(&Envelope::default(), &CommitOpts::default())
            .await
            .expect("commit");
        assert_eq!(result.endpoint, "o3:7050");
    }

    #[tokio::test]
    async fn all_failures_surface_the_last_error() {
        let dispatcher = Arc::new(
            MockBroadcaster::default()
                .rejecting("o1:7050", Status::ServiceUnavailable)
                .rejecting("o2:7050", Status::BadRequest)
                .rejecting("o3:7050", Status::InternalServerError),
        );
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let err = coordinator
            .commit(&Envelope::default(), &CommitOpts::default())
            .await
            .expect_err("must fail");
        // Whichever orderer the shuffle placed last owns the surfaced error.
        assert!(matches!(err, CommitError::Rejected { .. }));
        let total: usize = orderers().iter().map(|o| dispatcher.calls_to(o)).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn single_target_mode_skips_failover() {
        let dispatcher = Arc::new(
            MockBroadcaster::default().rejecting("o2:7050", Status::ServiceUnavailable),
        );
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let opts = CommitOpts {
            orderer: Some("o2:7050".to_string()),
            ..Default::default()
        };
        let err = coordinator
            .commit(&Envelope::default(), &opts)
            .await
            .expect_err("must fail");
        match err {
            CommitError::Rejected { endpoint, status } => {
                assert_eq!(endpoint, "o2:7050");
                assert_eq!(status, "SERVICE_UNAVAILABLE");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(dispatcher.calls_to("o1:7050"), 0);
        assert_eq!(dispatcher.calls_to("o3:7050"), 0);
    }

    #[tokio::test]
    async fn no_orderers_is_an_immediate_error() {
        let dispatcher = Arc::new(MockBroadcaster::default());
        let coordinator =
            CommitCoordinator::new(dispatcher, Vec::new(), Duration::from_secs(5));
        assert!(matches!(
            coordinator
                .commit(&Envelope::default(), &CommitOpts::default())
                .await,
            Err(CommitError::NoOrderers)
        ));
    }

    #[tokio::test]
    async fn disconnected_orderers_are_tried_last() {
        let dispatcher = Arc::new(MockBroadcaster::default().unreachable("o1:7050"));
        let coordinator = coordinator(Arc::clone(&dispatcher));
        // First commit observes o1 as disconnected (it may or may not be
        // contacted depending on the shuffle).
        coordinator
            .commit(&Envelope::default(), &CommitOpts::default())
            .await
            .expect("commit");
        coordinator.disconnected.insert("o1:7050".to_string());

        // Every subsequent failover order now ends with o1.
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..16 {
            let order = coordinator.failover_order(&mut rng);
            assert_eq!(order.last().map(String::as_str), Some("o1:7050"));
        }
    }

    #[tokio::test]
    async fn shuffle_varies_across_calls() {
        let dispatcher = Arc::new(MockBroadcaster::default());
        let coordinator = coordinator(dispatcher);
        let mut rng = StdRng::seed_from_u64(42);
        let orders: Vec<Vec<String>> =
            (0..32).map(|_| coordinator.failover_order(&mut rng)).collect();
        assert!(orders.iter().any(|o| o != &orders[0]));
    }
}
