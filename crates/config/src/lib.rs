//! Configuration schema and loader for the fanout client.

use serde::{Deserialize, Serialize};

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Datacenter this client runs in.
    pub local_datacenter: String,

    /// Operation tracker settings.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Adaptive tracker settings (used when `tracker.variant` is "adaptive").
    #[serde(default)]
    pub adaptive: AdaptiveConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Tracker variant: "simple" or "adaptive".
    #[serde(default = "default_variant")]
    pub variant: String,

    /// Replica successes required for an operation to succeed.
    #[serde(default = "default_success_target")]
    pub success_target: usize,

    /// Maximum requests in flight per operation.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Whether replicas outside the local datacenter may be contacted.
    #[serde(default = "default_true")]
    pub cross_colo_enabled: bool,

    /// Whether replicas outside the local and originating datacenters stay
    /// eligible when the originating datacenter is known.
    #[serde(default = "default_true")]
    pub include_non_originating_dc_replicas: bool,

    /// Cap on the candidate set when non-originating replicas are excluded.
    #[serde(default)]
    pub replicas_required_cap: Option<usize>,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            success_target: default_success_target(),
            parallelism: default_parallelism(),
            cross_colo_enabled: true,
            include_non_originating_dc_replicas: true,
            replicas_required_cap: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveConfig {
    /// Latency quantile beyond which an in-flight request counts as past due.
    #[serde(default = "default_quantile")]
    pub quantile: f64,

    /// Ceiling on in-flight requests while hedging. Unset means
    /// `parallelism + 1`.
    #[serde(default)]
    pub max_inflight: Option<usize>,

    /// Samples required per locality class before quantile estimates apply.
    #[serde(default = "default_warmup_samples")]
    pub warmup_samples: usize,

    /// Latency samples kept per locality class.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// How often in-flight requests are re-checked against the quantile,
    /// in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            quantile: default_quantile(),
            max_inflight: None,
            warmup_samples: default_warmup_samples(),
            window_size: default_window_size(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

// --- Defaults ---

fn default_variant() -> String {
    "simple".to_string()
}
fn default_success_target() -> usize {
    2
}
fn default_parallelism() -> usize {
    3
}
fn default_true() -> bool {
    true
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_quantile() -> f64 {
    0.9
}
fn default_warmup_samples() -> usize {
    100
}
fn default_window_size() -> usize {
    1024
}
fn default_poll_interval_ms() -> u64 {
    10
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ClientConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_datacenter.is_empty() {
            return Err(ConfigError::Invalid(
                "local_datacenter must not be empty".into(),
            ));
        }
        if self.tracker.variant != "simple" && self.tracker.variant != "adaptive" {
            return Err(ConfigError::Invalid(format!(
                "tracker.variant must be \"simple\" or \"adaptive\", got \"{}\"",
                self.tracker.variant
            )));
        }
        if self.tracker.success_target == 0 {
            return Err(ConfigError::Invalid(
                "tracker.success_target must be > 0".into(),
            ));
        }
        if self.tracker.parallelism == 0 {
            return Err(ConfigError::Invalid(
                "tracker.parallelism must be > 0".into(),
            ));
        }
        if let Some(cap) = self.tracker.replicas_required_cap {
            if cap < self.tracker.success_target {
                return Err(ConfigError::Invalid(format!(
                    "tracker.replicas_required_cap ({}) must be >= tracker.success_target ({})",
                    cap, self.tracker.success_target
                )));
            }
        }
        if !(self.adaptive.quantile > 0.0 && self.adaptive.quantile < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "adaptive.quantile must be in (0, 1), got {}",
                self.adaptive.quantile
            )));
        }
        if self.adaptive.window_size == 0 {
            return Err(ConfigError::Invalid(
                "adaptive.window_size must be > 0".into(),
            ));
        }
        if self.adaptive.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "adaptive.poll_interval_ms must be > 0".into(),
            ));
        }
        if let Some(max_inflight) = self.adaptive.max_inflight {
            if max_inflight < self.tracker.parallelism {
                return Err(ConfigError::Invalid(format!(
                    "adaptive.max_inflight ({}) must be >= tracker.parallelism ({})",
                    max_inflight, self.tracker.parallelism
                )));
            }
        }
        Ok(())
    }
}

/// Load a `ClientConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<ClientConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a `ClientConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
local_datacenter: "dc0"
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.local_datacenter, "dc0");
        assert_eq!(config.tracker.variant, "simple");
        assert_eq!(config.tracker.success_target, 2);
        assert_eq!(config.tracker.parallelism, 3);
        assert!(config.tracker.cross_colo_enabled);
        assert!(config.tracker.include_non_originating_dc_replicas);
        assert_eq!(config.tracker.replicas_required_cap, None);
        assert_eq!(config.adaptive.quantile, 0.9);
        assert_eq!(config.adaptive.max_inflight, None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
local_datacenter: "ewr1"
metrics_port: 9100
tracker:
  variant: adaptive
  success_target: 3
  parallelism: 4
  cross_colo_enabled: false
  include_non_originating_dc_replicas: false
  replicas_required_cap: 6
  request_timeout_ms: 1500
adaptive:
  quantile: 0.95
  max_inflight: 6
  warmup_samples: 50
  window_size: 512
  poll_interval_ms: 5
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.tracker.variant, "adaptive");
        assert_eq!(config.tracker.success_target, 3);
        assert!(!config.tracker.cross_colo_enabled);
        assert_eq!(config.tracker.replicas_required_cap, Some(6));
        assert_eq!(config.adaptive.quantile, 0.95);
        assert_eq!(config.adaptive.max_inflight, Some(6));
        assert_eq!(config.adaptive.window_size, 512);
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn test_roundtrip_yaml() {
        let yaml = r#"
local_datacenter: "dc0"
"#;
        let config = load_from_str(yaml).unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let config2 = load_from_str(&serialized).unwrap();
        assert_eq!(config.local_datacenter, config2.local_datacenter);
        assert_eq!(config.tracker.parallelism, config2.tracker.parallelism);
    }

    #[test]
    fn test_rejects_empty_local_datacenter() {
        let yaml = r#"
local_datacenter: ""
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("local_datacenter"),
            "error should mention local_datacenter: {}",
            err
        );
    }

    #[test]
    fn test_rejects_unknown_variant() {
        let yaml = r#"
local_datacenter: "dc0"
tracker:
  variant: eager
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("tracker.variant"),
            "error should mention tracker.variant: {}",
            err
        );
    }

    #[test]
    fn test_rejects_zero_parallelism() {
        let yaml = r#"
local_datacenter: "dc0"
tracker:
  parallelism: 0
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("tracker.parallelism"),
            "error should mention tracker.parallelism: {}",
            err
        );
    }

    #[test]
    fn test_rejects_zero_success_target() {
        let yaml = r#"
local_datacenter: "dc0"
tracker:
  success_target: 0
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("tracker.success_target"),
            "error should mention tracker.success_target: {}",
            err
        );
    }

    #[test]
    fn test_rejects_cap_below_success_target() {
        let yaml = r#"
local_datacenter: "dc0"
tracker:
  success_target: 3
  replicas_required_cap: 2
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("replicas_required_cap"),
            "error should mention replicas_required_cap: {}",
            err
        );
    }

    #[test]
    fn test_rejects_quantile_out_of_range() {
        for quantile in ["0.0", "1.0", "1.5"] {
            let yaml = format!(
                r#"
local_datacenter: "dc0"
adaptive:
  quantile: {}
"#,
                quantile
            );
            let result = load_from_str(&yaml);
            assert!(result.is_err(), "quantile {} should be rejected", quantile);
            let err = result.unwrap_err().to_string();
            assert!(
                err.contains("adaptive.quantile"),
                "error should mention adaptive.quantile: {}",
                err
            );
        }
    }

    #[test]
    fn test_rejects_max_inflight_below_parallelism() {
        let yaml = r#"
local_datacenter: "dc0"
tracker:
  parallelism: 4
adaptive:
  max_inflight: 2
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("adaptive.max_inflight"),
            "error should mention adaptive.max_inflight: {}",
            err
        );
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let yaml = r#"
local_datacenter: "dc0"
adaptive:
  poll_interval_ms: 0
"#;
        let result = load_from_str(yaml);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(
            err.contains("adaptive.poll_interval_ms"),
            "error should mention adaptive.poll_interval_ms: {}",
            err
        );
    }
}
