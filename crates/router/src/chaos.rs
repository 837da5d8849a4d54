//! Fault-injecting transport wrapper for tests and soak runs.
//!
//! `ChaosTransport` wraps any [`ReplicaTransport`] and injects failures and
//! latency according to a runtime-adjustable config, so integration tests can
//! exercise retry and hedging paths without a real network.

use crate::transport::{OperationRequest, ReplicaTransport, TransportError};
use fanout_common::ReplicaId;
use fanout_tracker::descriptor::ReplicaDescriptor;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// ────────────────────────── Config ──────────────────────────

/// Fault-injection knobs. All default to "no faults".
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    /// Probability in `[0.0, 1.0]` that any request fails.
    pub failure_rate: f64,
    /// Fixed latency added to every request.
    pub latency: Duration,
    /// Additional random latency in `[0, jitter]`.
    pub jitter: Duration,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.0,
            latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }
}

// ────────────────────────── Transport wrapper ──────────────────────────

/// Wraps a transport and injects faults per [`ChaosConfig`].
///
/// Individual replicas can also be marked failed outright, which makes every
/// request to them error regardless of `failure_rate`.
pub struct ChaosTransport<T: ReplicaTransport> {
    inner: Arc<T>,
    config: Arc<RwLock<ChaosConfig>>,
    failed_replicas: Arc<RwLock<HashSet<ReplicaId>>>,
}

impl<T: ReplicaTransport> ChaosTransport<T> {
    pub fn new(inner: Arc<T>, config: ChaosConfig) -> Self {
        Self {
            inner,
            config: Arc::new(RwLock::new(config)),
            failed_replicas: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Mark a replica as failed. All requests to it will error.
    pub async fn fail_replica(&self, replica: ReplicaId) {
        self.failed_replicas.write().await.insert(replica);
    }

    /// Recover a previously failed replica.
    pub async fn recover_replica(&self, replica: ReplicaId) {
        self.failed_replicas.write().await.remove(&replica);
    }

    /// Update the failure rate at runtime.
    pub async fn set_failure_rate(&self, rate: f64) {
        self.config.write().await.failure_rate = rate;
    }

    async fn maybe_fail(&self, target: &ReplicaDescriptor) -> Result<(), TransportError> {
        if self.failed_replicas.read().await.contains(&target.id) {
            return Err(TransportError::RpcFailed(format!(
                "chaos: replica {} is failed",
                target.id
            )));
        }

        let config = self.config.read().await.clone();

        let jitter_ms = config.jitter.as_millis() as u64;
        let delay = if jitter_ms > 0 {
            config.latency + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            config.latency
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if config.failure_rate > 0.0
            && rand::thread_rng().gen_bool(config.failure_rate.min(1.0))
        {
            return Err(TransportError::RpcFailed(
                "chaos: injected failure".to_string(),
            ));
        }

        Ok(())
    }
}

impl<T: ReplicaTransport> std::fmt::Debug for ChaosTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosTransport").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<T: ReplicaTransport> ReplicaTransport for ChaosTransport<T> {
    async fn send_request(
        &self,
        target: &ReplicaDescriptor,
        request: OperationRequest,
    ) -> Result<(), TransportError> {
        self.maybe_fail(target).await?;
        self.inner.send_request(target, request).await
    }
}

// ────────────────────────── Tests ──────────────────────────
