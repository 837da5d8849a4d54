//! Time source for request timestamping.

use tokio::time::Instant;

/// Monotonic time source used by the adaptive tracker.
///
/// Only latency bookkeeping depends on it; deadlines are enforced by the
/// layer that owns the transport. Tests running under a paused tokio
/// runtime drive it with `tokio::time::advance`.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by `tokio::time::Instant::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
