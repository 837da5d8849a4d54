//! fanout-tracker: per-operation replica selection and quorum accounting.
//!
//! One tracker instance tracks a single logical operation against a
//! replicated partition: which replicas to contact next, how many requests
//! may be in flight, and whether the operation has reached its success
//! target or can no longer reach it.
//!
//! Two variants implement [`OperationTracker`]: a fixed-parallelism
//! [`simple::SimpleTracker`] and a latency-hedging
//! [`adaptive::AdaptiveTracker`].

pub mod adaptive;
pub mod clock;
pub mod descriptor;
pub mod ordering;
pub mod oracle;
pub mod simple;

use descriptor::ReplicaDescriptor;
use fanout_common::ReplicaId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("success target {target} exceeds candidate count {candidates}")]
    TargetUnreachable { target: usize, candidates: usize },

    #[error("parallelism must be >= 1, got {0}")]
    InvalidParallelism(usize),

    #[error("quantile must be in (0, 1), got {0}")]
    InvalidQuantile(f64),

    #[error("unknown tracker variant: {0}")]
    UnknownVariant(String),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which tracker implementation to build for each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerVariant {
    Simple,
    Adaptive,
}

impl std::str::FromStr for TrackerVariant {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(TrackerError::UnknownVariant(other.to_string())),
        }
    }
}

/// Policy knobs shared by both tracker variants.
///
/// One value typically lives for the whole client and is reused across
/// operations; the per-operation inputs (replica snapshot, originating
/// datacenter) are constructor arguments instead.
#[derive(Debug, Clone)]
pub struct TrackerParams {
    /// Replica successes required for the operation to succeed.
    pub success_target: usize,
    /// Maximum requests in flight before any past-due hedging.
    pub parallelism: usize,
    /// Whether replicas outside the local datacenter are eligible at all.
    pub cross_colo_enabled: bool,
    /// The datacenter this client runs in.
    pub local_datacenter: String,
    /// Whether replicas outside the local and originating datacenters stay
    /// eligible when the originating datacenter is known.
    pub include_non_originating_dc_replicas: bool,
    /// Candidate-set cap applied when non-originating replicas are excluded.
    pub replicas_required_cap: usize,
}

impl TrackerParams {
    /// Parameters for a three-way local quorum in `local_dc`, with
    /// cross-datacenter fallback enabled and no candidate cap.
    pub fn new(local_dc: impl Into<String>) -> Self {
        Self {
            success_target: 2,
            parallelism: 3,
            cross_colo_enabled: true,
            local_datacenter: local_dc.into(),
            include_non_originating_dc_replicas: true,
            replicas_required_cap: usize::MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker contract
// ---------------------------------------------------------------------------

/// Counter snapshot. The four buckets partition the candidate set, so they
/// always sum to the candidate count fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerCounts {
    pub unsent: usize,
    pub inflight: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl TrackerCounts {
    /// Total candidates across all buckets.
    pub fn total(&self) -> usize {
        self.unsent + self.inflight + self.succeeded + self.failed
    }
}

/// Per-operation replica fan-out state machine.
///
/// A tracker is owned by a single coordinator task and mutated only through
/// these synchronous calls; it takes no locks and performs no I/O.
pub trait OperationTracker {
    /// Hand out the next batch of replicas to contact, moving them to
    /// in-flight. Returns an empty batch once the operation is done or
    /// parallelism is saturated.
    fn replicas_to_send(&mut self) -> Vec<ReplicaDescriptor>;

    /// Record a response for an in-flight replica. Stale or duplicate
    /// callbacks are logged and ignored.
    fn on_response(&mut self, replica: &ReplicaId, success: bool);

    /// Return a handed-out replica that was never actually dispatched to
    /// the front of the unsent queue, so it is offered first next time.
    fn on_send_failed(&mut self, replica: &ReplicaId);

    /// Whether the success target has been reached.
    fn has_succeeded(&self) -> bool;

    /// Whether the operation is finished, successfully or not.
    fn is_done(&self) -> bool;

    /// Current counter snapshot.
    fn counts(&self) -> TrackerCounts;

    /// How many in-flight requests have been flagged past due so far.
    /// Always 0 for the simple variant.
    fn past_due_count(&self) -> u64 {
        0
    }
}
