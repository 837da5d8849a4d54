//! Shared latency history backing the adaptive tracker.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Which latency population a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalityClass {
    /// Request to a replica in the client's own datacenter.
    Local,
    /// Request to a replica in any other datacenter.
    CrossColo,
}

impl LocalityClass {
    /// Metrics label for this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::CrossColo => "cross_colo",
        }
    }
}

/// Sizing for the per-class latency windows.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Samples kept per class; the oldest sample is evicted first.
    pub window_size: usize,
    /// Samples required per class before quantile estimates are served.
    pub warmup_samples: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            warmup_samples: 100,
        }
    }
}

/// Sliding-window latency quantile estimator, one window per locality class.
///
/// One oracle is shared by every tracker a coordinator builds, so estimates
/// accumulate across operations. Trackers for concurrent operations may
/// record at the same time, hence the mutex per window.
pub struct LatencyOracle {
    local: Mutex<LatencyWindow>,
    cross_colo: Mutex<LatencyWindow>,
}

impl std::fmt::Debug for LatencyOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyOracle")
            .field("local_samples", &self.sample_count(LocalityClass::Local))
            .field(
                "cross_colo_samples",
                &self.sample_count(LocalityClass::CrossColo),
            )
            .finish_non_exhaustive()
    }
}

impl LatencyOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            local: Mutex::new(LatencyWindow::new(&config)),
            cross_colo: Mutex::new(LatencyWindow::new(&config)),
        }
    }

    fn window(&self, class: LocalityClass) -> &Mutex<LatencyWindow> {
        match class {
            LocalityClass::Local => &self.local,
            LocalityClass::CrossColo => &self.cross_colo,
        }
    }

    /// Record one completed request's latency.
    pub fn record(&self, class: LocalityClass, latency: Duration) {
        self.window(class).lock().push(latency.as_micros() as u64);
    }

    /// Latency at quantile `q` for `class`, or `None` before warm-up.
    pub fn quantile(&self, class: LocalityClass, q: f64) -> Option<Duration> {
        self.window(class)
            .lock()
            .quantile(q)
            .map(Duration::from_micros)
    }

    /// Number of samples currently held for `class`.
    pub fn sample_count(&self, class: LocalityClass) -> usize {
        self.window(class).lock().samples.len()
    }
}

impl Default for LatencyOracle {
    fn default() -> Self {
        Self::new(OracleConfig::default())
    }
}

struct LatencyWindow {
    samples: VecDeque<u64>,
    window_size: usize,
    warmup_samples: usize,
}

impl LatencyWindow {
    fn new(config: &OracleConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.window_size),
            window_size: config.window_size,
            warmup_samples: config.warmup_samples,
        }
    }

    fn push(&mut self, micros: u64) {
        if self.samples.len() == self.window_size {
            self.samples.pop_front();
        }
        self.samples.push_back(micros);
    }

    /// Sorted-rank quantile over the current window. At least one sample is
    /// required even when `warmup_samples` is zero.
    fn quantile(&self, q: f64) -> Option<u64> {
        if self.samples.len() < self.warmup_samples.max(1) {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((sorted.len() as f64) * q) as usize;
        Some(sorted[rank.min(sorted.len() - 1)])
    }
}
