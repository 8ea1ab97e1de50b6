//! Pool and cluster configuration structures.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::ConfigError;

/// Default upper bound on resources per pool.
pub const DEFAULT_MAX: usize = 10;

/// Options a cluster may push down onto member pools that leave them unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedConfig {
    /// How long a queued acquire may wait, in milliseconds.
    pub acquire_timeout_ms: Option<u64>,
    /// Interval between ping sweeps of idle resources, in milliseconds.
    pub ping_interval_ms: Option<u64>,
    /// Interval between skim (reap) passes, in milliseconds.
    pub skim_interval_ms: Option<u64>,
    /// Hand out the longest-available resource first (`true`) or the most recent (`false`).
    pub fifo: Option<bool>,
    /// Time since last acquisition after which a resource counts as idle, in milliseconds.
    pub idles_after_ms: Option<u64>,
    /// Age after which a resource counts as dead, in milliseconds.
    pub dies_after_ms: Option<u64>,
}

impl SharedConfig {
    /// Reject zero-length intervals and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("acquire_timeout_ms", self.acquire_timeout_ms),
            ("ping_interval_ms", self.ping_interval_ms),
            ("skim_interval_ms", self.skim_interval_ms),
        ];
        for (name, value) in fields {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }

    pub(crate) fn duration(ms: Option<u64>) -> Option<Duration> {
        ms.map(Duration::from_millis)
    }
}

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Resources kept alive once the pool is open.
    pub min: usize,
    /// Upper bound on available plus borrowed resources.
    pub max: usize,
    /// Idle resources kept by the skim pass; unlimited when unset.
    pub max_idle: Option<usize>,
    /// Static tags used for cluster routing.
    pub attributes: Vec<String>,
    /// Ceiling on concurrent create/destroy/ping callbacks; unlimited when unset.
    pub concurrency: Option<usize>,
    /// Options inheritable from a cluster.
    #[serde(flatten)]
    pub shared: SharedConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_MAX,
            max_idle: None,
            attributes: Vec::new(),
            concurrency: None,
            shared: SharedConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min > self.max {
            return Err(ConfigError::Invalid(format!(
                "min ({}) must not exceed max ({})",
                self.min, self.max
            )));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        self.shared.validate()
    }

    /// Parse pool configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Root cluster configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Map of pool name to configuration, in cluster order.
    pub pools: BTreeMap<String, PoolConfig>,
    /// Ceiling on concurrent lifecycle callbacks across every member pool.
    pub concurrency: Option<usize>,
    /// Options pushed down onto member pools that leave them unset.
    #[serde(flatten)]
    pub shared: SharedConfig,
}

impl ClusterConfig {
    /// Validate all pools and ensure at least one pool exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::Invalid("at least one pool must be defined".into()));
        }
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        self.shared.validate()?;
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| ConfigError::Invalid(format!("pool `{name}` invalid: {e}")))?;
        }
        Ok(())
    }

    /// Parse cluster configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }
}
