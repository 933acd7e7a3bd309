// Path: crates/client/src/endorse.rs
//! The endorsement coordinator.
//!
//! Runs a layout-and-group plan against peers: layouts are attempted in
//! plan order, each layout fanning out the required number of concurrent
//! attempts per group. Per-peer outcomes are memoized for the duration of
//! one `endorse` call, so a peer never receives the same proposal twice no
//! matter how many groups or layouts it appears in.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use weft_api::EndorsementHandler;
use weft_proto::peer::endorser_client::EndorserClient;
use weft_proto::peer::{ProposalResponse, ProposalResponsePayload, SignedProposal};
use weft_types::codec;
use weft_types::error::EndorseError;
use weft_types::plan::{EndorsementPlan, PlanPeer};
use weft_types::submit::EndorseOpts;

use crate::config::PeerConfig;
use crate::endpoint::EndpointPool;

/// Sends one signed proposal to one peer.
#[async_trait]
pub trait ProposalDispatcher: Send + Sync {
    /// Dispatches `proposal` to `endpoint` with the given deadline.
    async fn dispatch(
        &self,
        endpoint: &str,
        proposal: &SignedProposal,
        timeout: Duration,
    ) -> Result<ProposalResponse, EndorseError>;
}

/// The gRPC dispatcher used in production: one lazy channel per peer.
pub struct GrpcProposalDispatcher {
    pool: Arc<EndpointPool>,
    peers: Vec<PeerConfig>,
}

impl GrpcProposalDispatcher {
    pub fn new(pool: Arc<EndpointPool>, peers: Vec<PeerConfig>) -> Self {
        Self { pool, peers }
    }

    fn peer_config(&self, endpoint: &str) -> Option<&PeerConfig> {
        self.peers.iter().find(|p| p.endpoint == endpoint)
    }
}

#[async_trait]
impl ProposalDispatcher for GrpcProposalDispatcher {
    async fn dispatch(
        &self,
        endpoint: &str,
        proposal: &SignedProposal,
        timeout: Duration,
    ) -> Result<ProposalResponse, EndorseError> {
        let tls = self.peer_config(endpoint).and_then(|p| p.tls.as_ref());
        let channel = self
            .pool
            .channel_for(endpoint, tls)
            .map_err(|e| EndorseError::PeerFailure {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;
        let mut client = EndorserClient::new(channel);
        let call = client.process_proposal(tonic::Request::new(proposal.clone()));
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(EndorseError::PeerFailure {
                endpoint: endpoint.to_string(),
                message: status.to_string(),
            }),
            Err(_) => Err(EndorseError::Timeout {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

type AttemptResult = Result<ProposalResponse, EndorseError>;
type Memo = DashMap<String, Arc<OnceCell<AttemptResult>>>;

/// Runs endorsement plans. Stateless across calls: the working plan, the
/// memo and the in-use markers all live for a single `endorse`.
pub struct EndorsementCoordinator {
    dispatcher: Arc<dyn ProposalDispatcher>,
    default_timeout: Duration,
}

impl EndorsementCoordinator {
    pub fn new(dispatcher: Arc<dyn ProposalDispatcher>, default_timeout: Duration) -> Self {
        Self {
            dispatcher,
            default_timeout,
        }
    }

    /// Collects endorsements satisfying one layout of `plan`.
    pub async fn endorse(
        &self,
        plan: &EndorsementPlan,
        proposal: &SignedProposal,
        expected_hash: &[u8],
        opts: &EndorseOpts,
    ) -> Result<Vec<ProposalResponse>, EndorseError> {
        plan.validate()?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let working = working_groups(plan, opts);
        let memo: Arc<Memo> = Arc::new(DashMap::new());

        let mut last_failures: Vec<EndorseError> = Vec::new();
        for (layout_idx, layout) in plan.layouts.iter().enumerate() {
            debug!(layout = layout_idx, "attempting endorsement layout");
            let mut attempts = Vec::new();
            for (group_name, required) in &layout.0 {
                let peers = working.get(group_name).cloned().unwrap_or_default();
                // Parallel siblings pull distinct peers off a shared queue;
                // the queue is re-seeded per layout so memoized results can
                // be reused in later rounds.
                let queue = Arc::new(Mutex::new(VecDeque::from(peers)));
                for _ in 0..*required {
                    attempts.push(self.attempt(
                        Arc::clone(&queue),
                        Arc::clone(&memo),
                        proposal,
                        expected_hash,
                        timeout,
                    ));
                }
            }

            let outcomes = join_all(attempts).await;
            let mut round_failures = Vec::new();
            let mut satisfied = true;
            for outcome in outcomes {
                if let Err(failures) = outcome {
                    satisfied = false;
                    round_failures.extend(failures);
                }
            }
            if satisfied {
                return Ok(assemble(layout, &working, &memo));
            }
            warn!(
                layout = layout_idx,
                failures = round_failures.len(),
                "endorsement layout unsatisfied"
            );
            last_failures = round_failures;
        }

        Err(EndorseError::PlanUnsatisfied {
            failures: last_failures,
        })
    }

    /// One endorsement attempt: pull candidates off the group queue until
    /// one yields a valid endorsement or the queue runs dry.
    async fn attempt(
        &self,
        queue: Arc<Mutex<VecDeque<PlanPeer>>>,
        memo: Arc<Memo>,
        proposal: &SignedProposal,
        expected_hash: &[u8],
        timeout: Duration,
    ) -> Result<(String, ProposalResponse), Vec<EndorseError>> {
        let mut failures = Vec::new();
        loop {
            let peer = { queue.lock().await.pop_front() };
            let Some(peer) = peer else {
                return Err(failures);
            };
            let cell = memo
                .entry(peer.endpoint.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone();
            // At most one send per peer per call: the first claimant runs
            // the dispatch, everyone else awaits the memoized outcome.
            let result = cell
                .get_or_init(|| self.send_and_validate(peer.endpoint.clone(), proposal, expected_hash, timeout))
                .await;
            match result {
                Ok(response) => return Ok((peer.endpoint, response.clone())),
                Err(err) => failures.push(err.clone()),
            }
        }
    }

    async fn send_and_validate(
        &self,
        endpoint: String,
        proposal: &SignedProposal,
        expected_hash: &[u8],
        timeout: Duration,
    ) -> AttemptResult {
        let response = self.dispatcher.dispatch(&endpoint, proposal, timeout).await?;
        validate_response(&endpoint, &response, expected_hash)?;
        Ok(response)
    }
}

#[async_trait]
impl EndorsementHandler for EndorsementCoordinator {
    async fn endorse(
        &self,
        plan: &EndorsementPlan,
        proposal: &SignedProposal,
        expected_hash: &[u8],
        opts: &EndorseOpts,
    ) -> Result<Vec<ProposalResponse>, EndorseError> {
        EndorsementCoordinator::endorse(self, plan, proposal, expected_hash, opts).await
    }
}

/// Builds the working copy of the plan: `ignore` peers dropped, `preferred`
/// peers lifted to the maximum score, groups sorted descending by score
/// with ties keeping input order.
fn working_groups(
    plan: &EndorsementPlan,
    opts: &EndorseOpts,
) -> BTreeMap<String, Vec<PlanPeer>> {
    let score = |peer: &PlanPeer| -> u64 {
        if opts.preferred.contains(&peer.endpoint) {
            u64::MAX
        } else {
            peer.ledger_height
        }
    };
    plan.groups
        .iter()
        .map(|(name, group)| {
            let mut peers: Vec<PlanPeer> = group
                .peers
                .iter()
                .filter(|p| !opts.ignore.contains(&p.endpoint))
                .cloned()
                .collect();
            // sort_by is stable: equal scores retain input order.
            peers.sort_by(|a, b| score(b).cmp(&score(a)));
            (name.clone(), peers)
        })
        .collect()
}

/// Client-side validation of an endorser's response.
fn validate_response(
    endpoint: &str,
    response: &ProposalResponse,
    expected_hash: &[u8],
) -> Result<(), EndorseError> {
    let status = response.response.as_ref().map(|r| r.status).unwrap_or(0);
    if !(200..400).contains(&status) {
        let message = response
            .response
            .as_ref()
            .map(|r| r.message.clone())
            .unwrap_or_default();
        return Err(EndorseError::PeerFailure {
            endpoint: endpoint.to_string(),
            message: format!("endorsement status {}: {}", status, message),
        });
    }
    if response.endorsement.is_none() {
        return Err(EndorseError::BadResponse {
            endpoint: endpoint.to_string(),
            message: "response carries no endorsement".to_string(),
        });
    }
    if !expected_hash.is_empty() {
        let payload: ProposalResponsePayload = codec::from_bytes_canonical(&response.payload)
            .map_err(|e| EndorseError::BadResponse {
                endpoint: endpoint.to_string(),
                message: e,
            })?;
        if payload.proposal_hash != expected_hash {
            return Err(EndorseError::BadResponse {
                endpoint: endpoint.to_string(),
                message: "proposal hash mismatch".to_string(),
            });
        }
    }
    Ok(())
}

/// Assembles the final endorsement list in layout/group/peer order of the
/// plan, so different runs with the same plan yield the same ordering. A
/// peer appearing in several groups contributes a single endorsement.
fn assemble(
    layout: &weft_types::plan::Layout,
    working: &BTreeMap<String, Vec<PlanPeer>>,
    memo: &Memo,
) -> Vec<ProposalResponse> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for (group_name, required) in &layout.0 {
        let Some(peers) = working.get(group_name) else {
            continue;
        };
        let mut taken = 0usize;
        for peer in peers {
            if taken == *required {
                break;
            }
            let Some(cell) = memo.get(peer.endpoint.as_str()) else {
                continue;
            };
            if let Some(Ok(response)) = cell.get() {
                taken += 1;
                if seen.insert(peer.endpoint.as_str()) {
                    out.push(response.clone());
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weft_proto::peer::{Endorsement, Response};
    use weft_types::plan::{Layout, PlanGroup};

    /// A scriptable dispatcher: per-endpoint behavior plus send counters.
    #[derive(Default)]
    struct MockDispatcher {
        failing: HashSet<String>,
        delays: Map<String, Duration>,
        sends: DashMap<String, AtomicUsize>,
    }

    impl MockDispatcher {
        fn failing(mut self, endpoint: &str) -> Self {
            self.failing.insert(endpoint.to_string());
            self
        }

        fn delayed(mut self, endpoint: &str, delay: Duration) -> Self {
            self.delays.insert(endpoint.to_string(), delay);
            self
        }

        fn sends_to(&self, endpoint: &str) -> usize {
            self.sends
                .get(endpoint)
                .map(|c| c.load(Ordering::SeqCst))
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl ProposalDispatcher for MockDispatcher {
        async fn dispatch(
            &self,
            endpoint: &str,
            _proposal: &SignedProposal,
            _timeout: Duration,
        ) -> Result<ProposalResponse, EndorseError> {
            self.sends
                .entry(endpoint.to_string())
                .or_insert_with(|| AtomicUsize::new(0))
                .fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(endpoint) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(endpoint) {
                return Err(EndorseError::Timeout {
                    endpoint: endpoint.to_string(),
                });
            }
            Ok(ProposalResponse {
                response: Some(Response {
                    status: 200,
                    message: String::new(),
                    payload: b"move succeed".to_vec(),
                }),
                endorsement: Some(Endorsement {
                    endorser: endpoint.as_bytes().to_vec(),
                    signature: vec![1],
                }),
                ..Default::default()
            })
        }
    }

    fn peer(endpoint: &str, height: u64) -> PlanPeer {
        PlanPeer {
            endpoint: endpoint.to_string(),
            msp_id: "Org1MSP".to_string(),
            ledger_height: height,
        }
    }

    fn single_layout_plan(required: usize) -> EndorsementPlan {
        EndorsementPlan {
            groups: Map::from([(
                "G1".to_string(),
                PlanGroup {
                    peers: vec![peer("p1:7051", 30), peer("p2:7051", 20), peer("p3:7051", 10)],
                },
            )]),
            layouts: vec![Layout(Map::from([("G1".to_string(), required)]))],
        }
    }

    fn endorser_of(response: &ProposalResponse) -> String {
        String::from_utf8(response.endorsement.as_ref().unwrap().endorser.clone()).unwrap()
    }

    fn coordinator(dispatcher: Arc<MockDispatcher>) -> EndorsementCoordinator {
        EndorsementCoordinator::new(dispatcher, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn highest_scored_peers_are_selected() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let result = coordinator
            .endorse(
                &single_layout_plan(2),
                &SignedProposal::default(),
                &[],
                &EndorseOpts::default(),
            )
            .await
            .expect("endorse");
        assert_eq!(result.len(), 2);
        assert_eq!(endorser_of(&result[0]), "p1:7051");
        assert_eq!(endorser_of(&result[1]), "p2:7051");
        assert_eq!(dispatcher.sends_to("p3:7051"), 0);
    }

    #[tokio::test]
    async fn preferred_peers_are_lifted_to_the_top() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let opts = EndorseOpts {
            preferred: HashSet::from(["p3:7051".to_string()]),
            ..Default::default()
        };
        let result = coordinator
            .endorse(&single_layout_plan(2), &SignedProposal::default(), &[], &opts)
            .await
            .expect("endorse");
        assert_eq!(endorser_of(&result[0]), "p3:7051");
        assert_eq!(endorser_of(&result[1]), "p1:7051");
        assert_eq!(dispatcher.sends_to("p2:7051"), 0);
    }

    #[tokio::test]
    async fn ignored_peers_are_never_contacted() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let opts = EndorseOpts {
            ignore: HashSet::from(["p1:7051".to_string()]),
            ..Default::default()
        };
        let result = coordinator
            .endorse(&single_layout_plan(2), &SignedProposal::default(), &[], &opts)
            .await
            .expect("endorse");
        assert_eq!(result.len(), 2);
        assert_eq!(dispatcher.sends_to("p1:7051"), 0);
    }

    #[tokio::test]
    async fn one_failing_peer_is_tolerated_when_spares_exist() {
        let dispatcher = Arc::new(MockDispatcher::default().failing("p1:7051"));
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let result = coordinator
            .endorse(
                &single_layout_plan(2),
                &SignedProposal::default(),
                &[],
                &EndorseOpts::default(),
            )
            .await
            .expect("endorse");
        let endorsers: Vec<String> = result.iter().map(endorser_of).collect();
        assert_eq!(endorsers, vec!["p2:7051", "p3:7051"]);
        // The failing peer was tried exactly once.
        assert_eq!(dispatcher.sends_to("p1:7051"), 1);
    }

    #[tokio::test]
    async fn exhausted_layout_fails_then_next_layout_is_tried() {
        // Layout 1 needs both peers of G1 but one is down; layout 2 over G2
        // succeeds.
        let dispatcher = Arc::new(MockDispatcher::default().failing("p1:7051"));
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let plan = EndorsementPlan {
            groups: Map::from([
                (
                    "G1".to_string(),
                    PlanGroup {
                        peers: vec![peer("p1:7051", 30), peer("p2:7051", 20)],
                    },
                ),
                (
                    "G2".to_string(),
                    PlanGroup {
                        peers: vec![peer("p4:7051", 5)],
                    },
                ),
            ]),
            layouts: vec![
                Layout(Map::from([("G1".to_string(), 2)])),
                Layout(Map::from([("G2".to_string(), 1)])),
            ],
        };
        let result = coordinator
            .endorse(&plan, &SignedProposal::default(), &[], &EndorseOpts::default())
            .await
            .expect("endorse");
        assert_eq!(result.len(), 1);
        assert_eq!(endorser_of(&result[0]), "p4:7051");
    }

    #[tokio::test]
    async fn no_satisfiable_layout_surfaces_plan_unsatisfied() {
        let dispatcher = Arc::new(
            MockDispatcher::default()
                .failing("p1:7051")
                .failing("p2:7051")
                .failing("p3:7051"),
        );
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let err = coordinator
            .endorse(
                &single_layout_plan(2),
                &SignedProposal::default(),
                &[],
                &EndorseOpts::default(),
            )
            .await
            .expect_err("must fail");
        match err {
            EndorseError::PlanUnsatisfied { failures } => assert!(!failures.is_empty()),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn a_peer_is_contacted_at_most_once_across_groups_and_layouts() {
        // p1 appears in both groups of both layouts; the memo must collapse
        // every reference to a single send.
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let shared = vec![peer("p1:7051", 30), peer("p2:7051", 20)];
        let plan = EndorsementPlan {
            groups: Map::from([
                ("G1".to_string(), PlanGroup { peers: shared.clone() }),
                ("G2".to_string(), PlanGroup { peers: shared }),
            ]),
            layouts: vec![Layout(Map::from([
                ("G1".to_string(), 1),
                ("G2".to_string(), 1),
            ]))],
        };
        let result = coordinator
            .endorse(&plan, &SignedProposal::default(), &[], &EndorseOpts::default())
            .await
            .expect("endorse");
        assert_eq!(dispatcher.sends_to("p1:7051"), 1);
        // One endorsement despite two groups: duplicates are collapsed.
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn assembly_order_follows_the_plan_not_completion() {
        // p1 answers last but still leads the result list.
        let dispatcher = Arc::new(
            MockDispatcher::default().delayed("p1:7051", Duration::from_millis(50)),
        );
        let coordinator = coordinator(Arc::clone(&dispatcher));
        let result = coordinator
            .endorse(
                &single_layout_plan(2),
                &SignedProposal::default(),
                &[],
                &EndorseOpts::default(),
            )
            .await
            .expect("endorse");
        assert_eq!(endorser_of(&result[0]), "p1:7051");
        assert_eq!(endorser_of(&result[1]), "p2:7051");
    }

    #[tokio::test]
    async fn hash_mismatch_is_a_bad_response() {
        let dispatcher = Arc::new(MockDispatcher::default());
        let coordinator = coordinator(dispatcher);
        let err = coordinator
            .endorse(
                &single_layout_plan(1),
                &SignedProposal::default(),
                b"expected-digest",
                &EndorseOpts::default(),
            )
            .await
            .expect_err("must fail");
        assert!(matches!(err, EndorseError::PlanUnsatisfied { .. }));
    }
}
