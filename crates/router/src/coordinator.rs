//! Operation coordinator: drives one tracker per logical operation.
//!
//! The coordinator:
//! 1. Builds the configured tracker variant over the replica snapshot
//! 2. Dispatches each handed-out replica through the transport, with a
//!    per-request deadline
//! 3. Feeds completions back into the tracker from a single task
//! 4. Re-polls the tracker on an interval so adaptive hedging can fire
//!    between responses
//! 5. Reports the outcome and mirrors it into metrics

use crate::transport::{OperationKind, OperationRequest, ReplicaTransport, TransportError};
use fanout_config::ClientConfig;
use fanout_tracker::adaptive::{AdaptiveParams, AdaptiveTracker};
use fanout_tracker::clock::{Clock, SystemClock};
use fanout_tracker::descriptor::ReplicaDescriptor;
use fanout_tracker::oracle::{LatencyOracle, LocalityClass, OracleConfig};
use fanout_tracker::simple::SimpleTracker;
use fanout_tracker::{OperationTracker, TrackerError, TrackerParams, TrackerVariant};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Outcome of a finished operation.
#[derive(Debug, Clone)]
pub struct OperationReport {
    /// Replicas that acked.
    pub succeeded: usize,
    /// Replicas that failed or timed out.
    pub failed: usize,
    /// Past-due flags raised while the operation ran.
    pub past_due: u64,
    /// Wall time from tracker construction to completion.
    pub elapsed: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("quorum not reached: need {needed}, got {got}")]
    QuorumNotReached { needed: usize, got: usize },
}

/// Coordinator policy, typically derived from a [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Tracker policy shared by every operation.
    pub tracker: TrackerParams,
    /// Which tracker variant to build.
    pub variant: TrackerVariant,
    /// Adaptive knobs (ignored by the simple variant).
    pub adaptive: AdaptiveParams,
    /// Latency window sizing for the shared oracle.
    pub oracle: OracleConfig,
    /// Deadline for each individual replica request.
    pub request_timeout: Duration,
    /// How often the tracker is re-polled while requests are outstanding.
    pub poll_interval: Duration,
}

impl CoordinatorConfig {
    /// Map a loaded [`ClientConfig`] onto coordinator policy.
    pub fn from_client_config(config: &ClientConfig) -> Result<Self, RouterError> {
        let variant: TrackerVariant = config.tracker.variant.parse()?;
        Ok(Self {
            tracker: TrackerParams {
                success_target: config.tracker.success_target,
                parallelism: config.tracker.parallelism,
                cross_colo_enabled: config.tracker.cross_colo_enabled,
                local_datacenter: config.local_datacenter.clone(),
                include_non_originating_dc_replicas: config
                    .tracker
                    .include_non_originating_dc_replicas,
                replicas_required_cap: config
                    .tracker
                    .replicas_required_cap
                    .unwrap_or(usize::MAX),
            },
            variant,
            adaptive: AdaptiveParams {
                quantile: config.adaptive.quantile,
                max_inflight: config.adaptive.max_inflight,
            },
            oracle: OracleConfig {
                window_size: config.adaptive.window_size,
                warmup_samples: config.adaptive.warmup_samples,
            },
            request_timeout: Duration::from_millis(config.tracker.request_timeout_ms),
            poll_interval: Duration::from_millis(config.adaptive.poll_interval_ms),
        })
    }
}

/// Drives replica fan-out for logical operations.
///
/// Generic over `T: ReplicaTransport` for testability; deployments plug in
/// their wire client, tests use mocks and [`crate::chaos::ChaosTransport`].
pub struct OperationCoordinator<T: ReplicaTransport> {
    transport: Arc<T>,
    config: CoordinatorConfig,
    oracle: Arc<LatencyOracle>,
    clock: Arc<dyn Clock>,
}

impl<T: ReplicaTransport> std::fmt::Debug for OperationCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: ReplicaTransport> OperationCoordinator<T> {
    pub fn new(transport: Arc<T>, config: CoordinatorConfig) -> Self {
        let oracle = Arc::new(LatencyOracle::new(config.oracle.clone()));
        Self {
            transport,
            config,
            oracle,
            clock: Arc::new(SystemClock),
        }
    }

    /// Share a latency oracle with other coordinators.
    pub fn with_oracle(mut self, oracle: Arc<LatencyOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the time source used for latency bookkeeping.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The latency oracle shared by this coordinator's operations.
    pub fn oracle(&self) -> &Arc<LatencyOracle> {
        &self.oracle
    }

    /// Execute one logical operation against the `replicas` snapshot.
    ///
    /// Returns once the tracker is done; requests still outstanding at that
    /// point are abandoned. `originating_dc` is the datacenter that first
    /// accepted the blob, when known.
    pub async fn execute(
        &self,
        kind: OperationKind,
        blob_id: &str,
        replicas: &[ReplicaDescriptor],
        originating_dc: Option<&str>,
    ) -> Result<OperationReport, RouterError> {
        let mut tracker = self.build_tracker(replicas, originating_dc)?;
        let operation_id = Uuid::new_v4();

        let m = fanout_metrics::metrics();
        m.operations_by_type.with_label_values(&[kind.as_str()]).inc();
        let op_timer = fanout_metrics::start_operation_timer(kind.as_str());
        let started = Instant::now();

        let mut completions = FuturesUnordered::new();
        let mut tick = tokio::time::interval(self.config.poll_interval);

        loop {
            for replica in tracker.replicas_to_send() {
                m.requests_sent.inc();
                let transport = self.transport.clone();
                let request = OperationRequest {
                    operation_id,
                    kind,
                    blob_id: blob_id.to_string(),
                };
                let timeout = self.config.request_timeout;
                completions.push(async move {
                    let replica_id = replica.id;
                    let sent_at = Instant::now();
                    let result =
                        tokio::time::timeout(timeout, transport.send_request(&replica, request))
                            .await
                            .map_err(|_| TransportError::Timeout(replica_id))
                            .and_then(|r| r);
                    (replica, sent_at.elapsed(), result)
                });
            }

            if tracker.is_done() {
                break;
            }

            // Whenever the tracker is not done, at least one request is in
            // flight, so this select always makes progress.
            tokio::select! {
                Some((replica, elapsed, result)) = completions.next() => {
                    let class = if replica.datacenter == self.config.tracker.local_datacenter {
                        LocalityClass::Local
                    } else {
                        LocalityClass::CrossColo
                    };
                    fanout_metrics::observe_request_latency(class.as_str(), elapsed.as_secs_f64());
                    match &result {
                        Ok(()) => m.responses_ok.inc(),
                        Err(e) => {
                            m.responses_failed.inc();
                            tracing::debug!(
                                "operation {}: replica {} failed: {}",
                                operation_id,
                                replica.id,
                                e
                            );
                        }
                    }
                    tracker.on_response(&replica.id, result.is_ok());
                }
                _ = tick.tick() => {}
            }
        }

        drop(op_timer);
        let counts = tracker.counts();
        let past_due = tracker.past_due_count();
        m.past_due.inc_by(past_due);

        if tracker.has_succeeded() {
            m.operations_succeeded.inc();
            tracing::debug!(
                "operation {} ({}) succeeded: {} ok, {} failed",
                operation_id,
                kind,
                counts.succeeded,
                counts.failed
            );
            Ok(OperationReport {
                succeeded: counts.succeeded,
                failed: counts.failed,
                past_due,
                elapsed: started.elapsed(),
            })
        } else {
            m.operations_failed.inc();
            tracing::warn!(
                "operation {} ({}) failed: needed {}, got {}",
                operation_id,
                kind,
                self.config.tracker.success_target,
                counts.succeeded
            );
            Err(RouterError::QuorumNotReached {
                needed: self.config.tracker.success_target,
                got: counts.succeeded,
            })
        }
    }

    fn build_tracker(
        &self,
        replicas: &[ReplicaDescriptor],
        originating_dc: Option<&str>,
    ) -> Result<Box<dyn OperationTracker + Send>, TrackerError> {
        Ok(match self.config.variant {
            TrackerVariant::Simple => Box::new(SimpleTracker::new(
                &self.config.tracker,
                replicas,
                originating_dc,
            )?),
            TrackerVariant::Adaptive => Box::new(AdaptiveTracker::new(
                &self.config.tracker,
                &self.config.adaptive,
                replicas,
                originating_dc,
                self.oracle.clone(),
                self.clock.clone(),
            )?),
        })
    }
}
