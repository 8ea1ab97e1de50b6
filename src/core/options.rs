//! Runtime option records for pools and clusters.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::config::{PoolConfig, SharedConfig, DEFAULT_MAX};
use crate::core::resource::{PingFn, Predicate};

/// Acquire timeout applied when neither the pool nor its cluster sets one.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options a cluster copies onto member pools that leave them unset.
pub struct SharedOptions<T> {
    /// How long a queued acquire may wait.
    pub acquire_timeout: Option<Duration>,
    /// Interval between ping sweeps of idle resources.
    pub ping_interval: Option<Duration>,
    /// Interval between skim passes.
    pub skim_interval: Option<Duration>,
    /// Insertion policy of the available list (`true` = FIFO).
    pub fifo: Option<bool>,
    /// Idle threshold for the default idle predicate.
    pub idles_after: Option<Duration>,
    /// Age threshold for the default dead predicate.
    pub dies_after: Option<Duration>,
    /// Health check for idle resources.
    pub ping: Option<PingFn<T>>,
    /// Replaces the default dead predicate.
    pub is_dead: Option<Predicate>,
    /// Replaces the default idle predicate.
    pub is_idle: Option<Predicate>,
}

impl<T> Default for SharedOptions<T> {
    fn default() -> Self {
        Self {
            acquire_timeout: None,
            ping_interval: None,
            skim_interval: None,
            fifo: None,
            idles_after: None,
            dies_after: None,
            ping: None,
            is_dead: None,
            is_idle: None,
        }
    }
}

impl<T> Clone for SharedOptions<T> {
    fn clone(&self) -> Self {
        Self {
            acquire_timeout: self.acquire_timeout,
            ping_interval: self.ping_interval,
            skim_interval: self.skim_interval,
            fifo: self.fifo,
            idles_after: self.idles_after,
            dies_after: self.dies_after,
            ping: self.ping.clone(),
            is_dead: self.is_dead.clone(),
            is_idle: self.is_idle.clone(),
        }
    }
}

impl<T> fmt::Debug for SharedOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedOptions")
            .field("acquire_timeout", &self.acquire_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("skim_interval", &self.skim_interval)
            .field("fifo", &self.fifo)
            .field("idles_after", &self.idles_after)
            .field("dies_after", &self.dies_after)
            .field("ping", &self.ping.is_some())
            .field("is_dead", &self.is_dead.is_some())
            .field("is_idle", &self.is_idle.is_some())
            .finish()
    }
}

impl<T> SharedOptions<T> {
    /// Build from the serde record; callbacks stay unset.
    pub fn from_config(cfg: &SharedConfig) -> Self {
        Self {
            acquire_timeout: SharedConfig::duration(cfg.acquire_timeout_ms),
            ping_interval: SharedConfig::duration(cfg.ping_interval_ms),
            skim_interval: SharedConfig::duration(cfg.skim_interval_ms),
            fifo: cfg.fifo,
            idles_after: SharedConfig::duration(cfg.idles_after_ms),
            dies_after: SharedConfig::duration(cfg.dies_after_ms),
            ..Self::default()
        }
    }

    /// Fill every unset field from `parent`; fields already set are kept.
    pub fn inherit(&mut self, parent: &Self) {
        self.acquire_timeout = self.acquire_timeout.or(parent.acquire_timeout);
        self.ping_interval = self.ping_interval.or(parent.ping_interval);
        self.skim_interval = self.skim_interval.or(parent.skim_interval);
        self.fifo = self.fifo.or(parent.fifo);
        self.idles_after = self.idles_after.or(parent.idles_after);
        self.dies_after = self.dies_after.or(parent.dies_after);
        if self.ping.is_none() {
            self.ping.clone_from(&parent.ping);
        }
        if self.is_dead.is_none() {
            self.is_dead.clone_from(&parent.is_dead);
        }
        if self.is_idle.is_none() {
            self.is_idle.clone_from(&parent.is_idle);
        }
    }

    /// Effective acquire timeout.
    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Effective insertion policy flag.
    pub fn fifo(&self) -> bool {
        self.fifo.unwrap_or(true)
    }
}

/// Construction-time pool options.
pub struct PoolOptions<T> {
    /// Resources kept alive once open.
    pub min: usize,
    /// Upper bound on available plus borrowed resources.
    pub max: usize,
    /// Idle resources kept by the skim pass; unlimited when `None`.
    pub max_idle: Option<usize>,
    /// Static routing tags.
    pub attributes: BTreeSet<String>,
    /// Ceiling on concurrent lifecycle callbacks for a standalone pool.
    pub concurrency: Option<usize>,
    /// Options inheritable from a cluster.
    pub shared: SharedOptions<T>,
}

impl<T> Default for PoolOptions<T> {
    fn default() -> Self {
        Self {
            min: 0,
            max: DEFAULT_MAX,
            max_idle: None,
            attributes: BTreeSet::new(),
            concurrency: None,
            shared: SharedOptions::default(),
        }
    }
}

impl<T> Clone for PoolOptions<T> {
    fn clone(&self) -> Self {
        Self {
            min: self.min,
            max: self.max,
            max_idle: self.max_idle,
            attributes: self.attributes.clone(),
            concurrency: self.concurrency,
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for PoolOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("max_idle", &self.max_idle)
            .field("attributes", &self.attributes)
            .field("concurrency", &self.concurrency)
            .field("shared", &self.shared)
            .finish()
    }
}

impl<T> PoolOptions<T> {
    /// Build from the serde record; callbacks stay unset.
    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self {
            min: cfg.min,
            max: cfg.max,
            max_idle: cfg.max_idle,
            attributes: cfg.attributes.iter().cloned().collect(),
            concurrency: cfg.concurrency,
            shared: SharedOptions::from_config(&cfg.shared),
        }
    }
}

/// Per-call acquire options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Higher values are served first; FIFO among equals.
    pub priority: i32,
    /// Tags a cluster member must carry; ignored by a standalone pool.
    pub attributes: Vec<String>,
}

impl AcquireOptions {
    /// Default options (priority 0, no attributes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the required attributes.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for `close`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseOptions {
    /// Reject queued acquires immediately instead of after in-flight work settles.
    pub flush: bool,
}

impl CloseOptions {
    /// Close rejecting queued acquires immediately.
    pub const fn flush() -> Self {
        Self { flush: true }
    }
}
