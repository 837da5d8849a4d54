//! Latency-adaptive operation tracker.
//!
//! Wraps [`SimpleTracker`] with a quantile hedge: once the elapsed time of
//! an in-flight request crosses the tracked latency quantile for its
//! locality class, one extra request slot opens, so a slow replica cannot
//! pin the whole operation to its tail latency. Until the shared
//! [`LatencyOracle`] has warmed up, the tracker behaves exactly like the
//! simple variant.

use crate::clock::Clock;
use crate::descriptor::ReplicaDescriptor;
use crate::oracle::{LatencyOracle, LocalityClass};
use crate::simple::SimpleTracker;
use crate::{OperationTracker, TrackerCounts, TrackerError, TrackerParams};
use fanout_common::ReplicaId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;

/// Knobs specific to the adaptive variant.
#[derive(Debug, Clone)]
pub struct AdaptiveParams {
    /// Latency quantile beyond which an in-flight request counts as past due.
    pub quantile: f64,
    /// Ceiling on in-flight requests while hedging. `None` means
    /// `parallelism + 1`.
    pub max_inflight: Option<usize>,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            quantile: 0.9,
            max_inflight: None,
        }
    }
}

struct InflightMeta {
    sent_at: Instant,
    class: LocalityClass,
    past_due: bool,
}

/// Operation tracker that hedges against slow replicas.
pub struct AdaptiveTracker {
    inner: SimpleTracker,
    oracle: Arc<LatencyOracle>,
    clock: Arc<dyn Clock>,
    quantile: f64,
    parallelism: usize,
    max_inflight: usize,
    local_datacenter: String,
    inflight: HashMap<ReplicaId, InflightMeta>,
    past_due: u64,
}

impl std::fmt::Debug for AdaptiveTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveTracker")
            .field("inner", &self.inner)
            .field("quantile", &self.quantile)
            .field("past_due", &self.past_due)
            .finish_non_exhaustive()
    }
}

impl AdaptiveTracker {
    /// Build an adaptive tracker for one operation over the `replicas`
    /// snapshot.
    ///
    /// `oracle` is shared across operations so latency history accumulates;
    /// `clock` timestamps requests for that history.
    pub fn new(
        params: &TrackerParams,
        adaptive: &AdaptiveParams,
        replicas: &[ReplicaDescriptor],
        originating_dc: Option<&str>,
        oracle: Arc<LatencyOracle>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TrackerError> {
        if !(adaptive.quantile > 0.0 && adaptive.quantile < 1.0) {
            return Err(TrackerError::InvalidQuantile(adaptive.quantile));
        }
        let inner = SimpleTracker::new(params, replicas, originating_dc)?;
        Ok(Self {
            inner,
            oracle,
            clock,
            quantile: adaptive.quantile,
            parallelism: params.parallelism,
            max_inflight: adaptive.max_inflight.unwrap_or(params.parallelism + 1),
            local_datacenter: params.local_datacenter.clone(),
            inflight: HashMap::new(),
            past_due: 0,
        })
    }

    fn classify(&self, replica: &ReplicaDescriptor) -> LocalityClass {
        if replica.datacenter == self.local_datacenter {
            LocalityClass::Local
        } else {
            LocalityClass::CrossColo
        }
    }

    /// Flag in-flight requests whose elapsed time has crossed the quantile
    /// estimate for their class. A request is flagged at most once; the
    /// flag stays until the request completes. Returns how many in-flight
    /// requests are currently flagged.
    fn refresh_past_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut flagged = 0;
        for (replica, meta) in self.inflight.iter_mut() {
            if !meta.past_due {
                if let Some(threshold) = self.oracle.quantile(meta.class, self.quantile) {
                    if now.duration_since(meta.sent_at) >= threshold {
                        meta.past_due = true;
                        self.past_due += 1;
                        tracing::debug!(
                            "request to replica {} past due after {:?}",
                            replica,
                            threshold
                        );
                    }
                }
            }
            if meta.past_due {
                flagged += 1;
            }
        }
        flagged
    }
}

impl OperationTracker for AdaptiveTracker {
    fn replicas_to_send(&mut self) -> Vec<ReplicaDescriptor> {
        let flagged = self.refresh_past_due();
        let allowed = (self.parallelism + flagged).min(self.max_inflight);
        let batch = self.inner.admit(allowed);

        let now = self.clock.now();
        for replica in &batch {
            let class = self.classify(replica);
            self.inflight.insert(
                replica.id,
                InflightMeta {
                    sent_at: now,
                    class,
                    past_due: false,
                },
            );
        }
        batch
    }

    fn on_response(&mut self, replica: &ReplicaId, success: bool) {
        if let Some(meta) = self.inflight.remove(replica) {
            let elapsed = self.clock.now().duration_since(meta.sent_at);
            self.oracle.record(meta.class, elapsed);
        }
        self.inner.on_response(replica, success);
    }

    fn on_send_failed(&mut self, replica: &ReplicaId) {
        // Never dispatched, so nothing to record
        self.inflight.remove(replica);
        self.inner.on_send_failed(replica);
    }

    fn has_succeeded(&self) -> bool {
        self.inner.has_succeeded()
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn counts(&self) -> TrackerCounts {
        self.inner.counts()
    }

    fn past_due_count(&self) -> u64 {
        self.past_due
    }
}
