//! Fluent construction of pools and clusters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ClusterConfig, PoolConfig};
use crate::core::resource::{boxed_create_fn, boxed_value_fn, CreateFn, ValueFn};
use crate::core::{
    BoxError, Cluster, ClusterOptions, ConfigError, Hooks, Pool, PoolOptions, PoolValue,
    Predicate, ResourceState,
};

/// Fluent builder for a [`Pool`].
///
/// `create` and `destroy` are mandatory; every other option falls back to the
/// [`PoolOptions`] defaults.
pub struct PoolBuilder<T> {
    create: Option<Arc<CreateFn<T>>>,
    destroy: Option<Arc<ValueFn<T>>>,
    options: PoolOptions<T>,
}

impl<T: PoolValue> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PoolValue> PoolBuilder<T> {
    /// Start from default options.
    pub fn new() -> Self {
        Self {
            create: None,
            destroy: None,
            options: PoolOptions::default(),
        }
    }

    /// Start from a serde record.
    pub fn from_config(cfg: &PoolConfig) -> Self {
        Self {
            create: None,
            destroy: None,
            options: PoolOptions::from_config(cfg),
        }
    }

    /// Options accumulated so far.
    pub const fn options(&self) -> &PoolOptions<T> {
        &self.options
    }

    /// Callback producing a new value.
    #[must_use]
    pub fn create<F, Fut, E>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.create = Some(boxed_create_fn(f));
        self
    }

    /// Callback releasing a value's underlying resource.
    #[must_use]
    pub fn destroy<F, Fut, E>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.destroy = Some(boxed_value_fn(f));
        self
    }

    /// Health check run against idle resources every `ping_interval`.
    #[must_use]
    pub fn ping<F, Fut, E>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.options.shared.ping = Some(boxed_value_fn(f));
        self
    }

    /// Replace the default dead predicate.
    #[must_use]
    pub fn is_dead<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceState) -> bool + Send + Sync + 'static,
    {
        self.options.shared.is_dead = Some(Arc::new(f) as Predicate);
        self
    }

    /// Replace the default idle predicate.
    #[must_use]
    pub fn is_idle<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceState) -> bool + Send + Sync + 'static,
    {
        self.options.shared.is_idle = Some(Arc::new(f) as Predicate);
        self
    }

    /// Resources kept alive once open.
    #[must_use]
    pub const fn min(mut self, min: usize) -> Self {
        self.options.min = min;
        self
    }

    /// Upper bound on available plus borrowed resources.
    #[must_use]
    pub const fn max(mut self, max: usize) -> Self {
        self.options.max = max;
        self
    }

    /// Idle resources kept by the skim pass.
    #[must_use]
    pub const fn max_idle(mut self, max_idle: usize) -> Self {
        self.options.max_idle = Some(max_idle);
        self
    }

    /// Add a routing tag.
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.options.attributes.insert(attribute.into());
        self
    }

    /// Ceiling on concurrent lifecycle callbacks.
    #[must_use]
    pub const fn concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = Some(concurrency);
        self
    }

    /// How long a queued acquire may wait.
    #[must_use]
    pub const fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.options.shared.acquire_timeout = Some(timeout);
        self
    }

    /// Interval between ping sweeps.
    #[must_use]
    pub const fn ping_interval(mut self, interval: Duration) -> Self {
        self.options.shared.ping_interval = Some(interval);
        self
    }

    /// Interval between skim passes.
    #[must_use]
    pub const fn skim_interval(mut self, interval: Duration) -> Self {
        self.options.shared.skim_interval = Some(interval);
        self
    }

    /// Hand out the longest-available resource first (`true`) or the most recent.
    #[must_use]
    pub const fn fifo(mut self, fifo: bool) -> Self {
        self.options.shared.fifo = Some(fifo);
        self
    }

    /// Idle threshold for the default idle predicate.
    #[must_use]
    pub const fn idles_after(mut self, after: Duration) -> Self {
        self.options.shared.idles_after = Some(after);
        self
    }

    /// Age threshold for the default dead predicate.
    #[must_use]
    pub const fn dies_after(mut self, after: Duration) -> Self {
        self.options.shared.dies_after = Some(after);
        self
    }

    /// Construct the pool (closed; call `open` to start serving).
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingCreate` / `ConfigError::MissingDestroy` if a callback is absent
    /// - `ConfigError::Invalid` for out-of-range limits
    pub fn build(self) -> Result<Pool<T>, ConfigError> {
        let create = self.create.ok_or(ConfigError::MissingCreate)?;
        let destroy = self.destroy.ok_or(ConfigError::MissingDestroy)?;
        Pool::new(Hooks::from_parts(create, destroy), self.options)
    }
}

/// Build a cluster from configuration using a per-pool hooks factory.
///
/// Pools are added in configuration key order; cluster-level options are
/// pushed down onto each pool as it is added.
///
/// # Errors
///
/// Returns the first validation, factory or construction error.
pub fn build_cluster<T, F>(cfg: &ClusterConfig, mut hooks_factory: F) -> Result<Cluster<T>, ConfigError>
where
    T: PoolValue,
    F: FnMut(&str, &PoolConfig) -> Result<Hooks<T>, ConfigError>,
{
    cfg.validate()?;

    let cluster = Cluster::new(ClusterOptions::from_config(cfg))?;
    for (name, pool_cfg) in &cfg.pools {
        let hooks = hooks_factory(name, pool_cfg)?;
        let pool = Pool::new(hooks, PoolOptions::from_config(pool_cfg))?;
        tracing::debug!(name = %name, pool = %pool.id(), "configured pool built");
        cluster.add(pool);
    }
    Ok(cluster)
}
