//! Fixed-parallelism operation tracker.

use crate::descriptor::ReplicaDescriptor;
use crate::ordering;
use crate::{OperationTracker, TrackerCounts, TrackerError, TrackerParams};
use fanout_common::ReplicaId;
use std::collections::{HashMap, VecDeque};

/// Operation tracker with a fixed success target and parallelism.
///
/// Candidates are drawn in the order fixed at construction. Every response
/// moves one replica from in-flight to succeeded or failed; the operation
/// is done once the success target is met or fewer candidates remain
/// reachable than the target requires.
#[derive(Debug)]
pub struct SimpleTracker {
    unsent: VecDeque<ReplicaDescriptor>,
    inflight: HashMap<ReplicaId, ReplicaDescriptor>,
    succeeded: usize,
    failed: usize,
    success_target: usize,
    parallelism: usize,
}

impl SimpleTracker {
    /// Build a tracker for one operation over the `replicas` snapshot.
    ///
    /// Fails when `parallelism` is zero or the post-selection candidate set
    /// is smaller than `success_target`.
    pub fn new(
        params: &TrackerParams,
        replicas: &[ReplicaDescriptor],
        originating_dc: Option<&str>,
    ) -> Result<Self, TrackerError> {
        if params.parallelism < 1 {
            return Err(TrackerError::InvalidParallelism(params.parallelism));
        }
        let candidates = ordering::select_candidates(replicas, params, originating_dc);
        if params.success_target > candidates.len() {
            return Err(TrackerError::TargetUnreachable {
                target: params.success_target,
                candidates: candidates.len(),
            });
        }
        Ok(Self {
            unsent: candidates.into(),
            inflight: HashMap::new(),
            succeeded: 0,
            failed: 0,
            success_target: params.success_target,
            parallelism: params.parallelism,
        })
    }

    /// Draw replicas from the front of the unsent queue until
    /// `allowed_inflight` requests are in flight, and mark them in flight.
    ///
    /// The adaptive tracker calls this with a raised allowance while a
    /// request is past due.
    pub(crate) fn admit(&mut self, allowed_inflight: usize) -> Vec<ReplicaDescriptor> {
        if self.is_done() {
            return Vec::new();
        }
        let want = allowed_inflight.saturating_sub(self.inflight.len());
        let mut batch = Vec::with_capacity(want.min(self.unsent.len()));
        while batch.len() < want {
            match self.unsent.pop_front() {
                Some(replica) => {
                    self.inflight.insert(replica.id, replica.clone());
                    batch.push(replica);
                }
                None => break,
            }
        }
        batch
    }

    /// Candidates that could still contribute a success.
    fn reachable(&self) -> usize {
        self.unsent.len() + self.inflight.len() + self.succeeded
    }
}

impl OperationTracker for SimpleTracker {
    fn replicas_to_send(&mut self) -> Vec<ReplicaDescriptor> {
        self.admit(self.parallelism)
    }

    fn on_response(&mut self, replica: &ReplicaId, success: bool) {
        match self.inflight.remove(replica) {
            Some(_) => {
                if success {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
            }
            None => {
                tracing::debug!("ignoring stale response from replica {}", replica);
            }
        }
    }

    fn on_send_failed(&mut self, replica: &ReplicaId) {
        match self.inflight.remove(replica) {
            Some(descriptor) => {
                self.unsent.push_front(descriptor);
            }
            None => {
                tracing::debug!("send failure for replica {} not in flight", replica);
            }
        }
    }

    fn has_succeeded(&self) -> bool {
        self.succeeded >= self.success_target
    }

    fn is_done(&self) -> bool {
        self.has_succeeded() || self.reachable() < self.success_target
    }

    fn counts(&self) -> TrackerCounts {
        TrackerCounts {
            unsent: self.unsent.len(),
            inflight: self.inflight.len(),
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}
