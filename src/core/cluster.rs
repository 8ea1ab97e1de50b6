//! Attribute-routed composition of pools.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::core::error::{ConfigError, Operation, PoolError};
use crate::core::events::{EventBus, PoolEvent, PoolId};
use crate::core::options::{AcquireOptions, CloseOptions, SharedOptions};
use crate::core::pool::{Pool, PoolStatus, PoolValue, ResourceSource};
use crate::core::stats::ClusterStats;
use crate::infra::queue::RequestQueue;

/// Construction-time cluster options.
pub struct ClusterOptions<T> {
    /// Ceiling on concurrent lifecycle callbacks across every member pool.
    pub concurrency: Option<usize>,
    /// Options copied onto member pools that leave them unset.
    pub shared: SharedOptions<T>,
}

impl<T> Default for ClusterOptions<T> {
    fn default() -> Self {
        Self {
            concurrency: None,
            shared: SharedOptions::default(),
        }
    }
}

impl<T> fmt::Debug for ClusterOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterOptions")
            .field("concurrency", &self.concurrency)
            .field("shared", &self.shared)
            .finish()
    }
}

impl<T> ClusterOptions<T> {
    /// Build from the serde record; callbacks stay unset.
    pub fn from_config(cfg: &ClusterConfig) -> Self {
        Self {
            concurrency: cfg.concurrency,
            shared: SharedOptions::from_config(&cfg.shared),
        }
    }
}

struct Member<T> {
    pool: Pool<T>,
    relay: u64,
}

struct ClusterInner<T> {
    shared: SharedOptions<T>,
    requests: RequestQueue,
    members: RwLock<Vec<Member<T>>>,
    status: Mutex<PoolStatus>,
    closed: watch::Sender<bool>,
    events: EventBus<T>,
}

/// Router over pools tagged with attributes.
///
/// The cluster never owns resources; every operation is delegated to the
/// member pool that owns (or can produce) the value.
pub struct Cluster<T> {
    inner: Arc<ClusterInner<T>>,
}

impl<T> Clone for Cluster<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Cluster<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("pools", &self.inner.members.read().len())
            .field("status", &*self.inner.status.lock())
            .finish()
    }
}

impl<T: PoolValue> Cluster<T> {
    /// Create an empty, closed cluster.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `concurrency == Some(0)`.
    pub fn new(options: ClusterOptions<T>) -> Result<Self, ConfigError> {
        if options.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        let (closed, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(ClusterInner {
                shared: options.shared,
                requests: RequestQueue::new(options.concurrency),
                members: RwLock::new(Vec::new()),
                status: Mutex::new(PoolStatus::Created),
                closed,
                events: EventBus::new(),
            }),
        })
    }

    /// Create a cluster and add `pools` in order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the options are rejected by [`Cluster::new`].
    pub fn with_pools<I>(options: ClusterOptions<T>, pools: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = Pool<T>>,
    {
        let cluster = Self::new(options)?;
        for pool in pools {
            cluster.add(pool);
        }
        Ok(cluster)
    }

    /// Register a pool.
    ///
    /// The pool is bound to the cluster's request queue, inherits every shared
    /// option it leaves unset, and has its signals republished on the cluster.
    /// Returns `false` if the pool is already a member.
    pub fn add(&self, pool: Pool<T>) -> bool {
        let mut members = self.inner.members.write();
        if members.iter().any(|m| m.pool.id() == pool.id()) {
            return false;
        }
        pool.bind_request_queue(self.inner.requests.clone());
        pool.inherit(&self.inner.shared);
        let relay = pool.events().attach(self.inner.events.sender());
        debug!(pool = %pool.id(), attributes = ?pool.attributes(), "pool added to cluster");
        members.push(Member { pool, relay });
        true
    }

    /// Detach a pool and stop republishing its signals.
    pub fn remove(&self, pool: &Pool<T>) -> bool {
        let mut members = self.inner.members.write();
        let Some(pos) = members.iter().position(|m| m.pool.id() == pool.id()) else {
            return false;
        };
        let member = members.remove(pos);
        member.pool.events().detach(member.relay);
        debug!(pool = %pool.id(), "pool removed from cluster");
        true
    }

    /// Member pools in cluster order.
    pub fn pools(&self) -> Vec<Pool<T>> {
        self.inner.members.read().iter().map(|m| m.pool.clone()).collect()
    }

    /// Number of member pools.
    pub fn len(&self) -> usize {
        self.inner.members.read().len()
    }

    /// Whether the cluster has no pools.
    pub fn is_empty(&self) -> bool {
        self.inner.members.read().is_empty()
    }

    /// Whether the cluster is serving acquires.
    pub fn is_open(&self) -> bool {
        *self.inner.status.lock() == PoolStatus::Open
    }

    /// Queue shared by every member pool.
    pub fn request_queue(&self) -> RequestQueue {
        self.inner.requests.clone()
    }

    /// Subscribe to the signals of every member pool.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent<T>> {
        self.inner.events.subscribe()
    }

    /// Live counters over every pool, or only those carrying `attributes`.
    pub fn stats<S: AsRef<str>>(&self, attributes: Option<&[S]>) -> ClusterStats<T> {
        let pools = self
            .pools()
            .into_iter()
            .filter(|p| attributes.is_none_or(|attrs| p.matches(attrs)))
            .collect();
        ClusterStats::new(pools)
    }

    /// Open every member pool concurrently.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the cluster or one of its pools was closed.
    pub async fn open(&self) -> Result<(), PoolError> {
        {
            let mut status = self.inner.status.lock();
            match *status {
                PoolStatus::Open => return Ok(()),
                PoolStatus::Closing | PoolStatus::Closed => return Err(PoolError::Closed),
                PoolStatus::Created => *status = PoolStatus::Open,
            }
        }
        let pools = self.pools();
        info!(pools = pools.len(), "opening cluster");
        join_all(pools.iter().map(Pool::open))
            .await
            .into_iter()
            .collect::<Result<Vec<()>, PoolError>>()?;
        Ok(())
    }

    /// Close every member pool concurrently.
    ///
    /// # Errors
    ///
    /// Propagates the first pool close failure.
    pub async fn close(&self, options: CloseOptions) -> Result<(), PoolError> {
        {
            let mut status = self.inner.status.lock();
            if *status == PoolStatus::Closed {
                return Ok(());
            }
            *status = PoolStatus::Closed;
        }
        self.inner.closed.send_replace(true);
        let pools = self.pools();
        info!(pools = pools.len(), flush = options.flush, "closing cluster");
        join_all(pools.iter().map(|p| p.close(options)))
            .await
            .into_iter()
            .collect::<Result<Vec<()>, PoolError>>()?;
        Ok(())
    }

    /// Acquire from a member pool carrying every requested attribute.
    ///
    /// Prefers a pool with an available resource, then one with creation
    /// headroom; otherwise waits for the first eligible pool to signal
    /// availability (or a creation failure) and delegates to it. The wait and
    /// the delegated acquire share one deadline of the cluster's acquire timeout.
    ///
    /// # Errors
    ///
    /// - `PoolError::Closed` if the cluster is not open or closes while waiting
    /// - `PoolError::NoPools` / `PoolError::NoMatchingPool` when nothing is eligible
    /// - `PoolError::AcquireTimeout` / `PoolError::Create` from the wait or the delegated acquire
    pub async fn acquire(&self, options: AcquireOptions) -> Result<T, PoolError> {
        if !self.is_open() {
            return Err(PoolError::Closed);
        }
        let pools = self.pools();
        if pools.is_empty() {
            return Err(PoolError::NoPools);
        }
        let eligible: Vec<Pool<T>> = pools
            .into_iter()
            .filter(|p| p.matches(&options.attributes))
            .collect();
        if eligible.is_empty() {
            return Err(PoolError::NoMatchingPool(options.attributes));
        }
        if let [only] = eligible.as_slice() {
            return only.acquire(options).await;
        }

        if let Some(pool) = eligible.iter().find(|p| p.available() > 0) {
            return pool.acquire(options).await;
        }
        if let Some(pool) = eligible.iter().find(|p| p.size() + p.pending() < p.max()) {
            debug!(pool = %pool.id(), "cluster acquire creating on pool with headroom");
            return pool.acquire(options).await;
        }

        let deadline = Instant::now() + self.inner.shared.acquire_timeout();
        let chosen = self.wait_for_available(&eligible, deadline).await?;
        let pool = eligible
            .into_iter()
            .find(|p| p.id() == chosen)
            .ok_or(PoolError::Closed)?;
        // The delegated acquire only gets what is left of the cluster timeout.
        let remaining = deadline.saturating_duration_since(Instant::now());
        pool.acquire_within(options, remaining).await
    }

    async fn wait_for_available(
        &self,
        eligible: &[Pool<T>],
        deadline: Instant,
    ) -> Result<PoolId, PoolError> {
        let mut events = self.inner.events.subscribe();
        let mut closed = self.inner.closed.subscribe();
        if let Some(pool) = eligible.iter().find(|p| p.available() > 0) {
            return Ok(pool.id());
        }
        let ids: HashSet<PoolId> = eligible.iter().map(Pool::id).collect();
        debug!(pools = ids.len(), "cluster acquire waiting for availability");

        let wait = async {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(PoolEvent::Available { pool }) if ids.contains(&pool) => return Ok(pool),
                        Ok(PoolEvent::CreateError { pool, error }) if ids.contains(&pool) => {
                            return Err(PoolError::Create(error));
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "cluster acquire lagged behind pool signals");
                            if let Some(pool) = eligible.iter().find(|p| p.available() > 0) {
                                return Ok(pool.id());
                            }
                        }
                        Err(RecvError::Closed) => return Err(PoolError::Closed),
                    },
                    changed = closed.changed() => {
                        if changed.is_err() || *closed.borrow() {
                            return Err(PoolError::Closed);
                        }
                    }
                }
            }
        };
        tokio::time::timeout_at(deadline, wait)
            .await
            .map_err(|_| PoolError::AcquireTimeout)?
    }

    fn owner_of(&self, value: &T) -> Option<Pool<T>> {
        self.inner
            .members
            .read()
            .iter()
            .find(|m| m.pool.includes(value))
            .map(|m| m.pool.clone())
    }

    /// Release a value to the member pool that owns it.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::UnknownResource` if no member pool has it borrowed.
    pub fn release(&self, value: &T) -> Result<(), PoolError> {
        self.owner_of(value)
            .ok_or(PoolError::UnknownResource(Operation::Release))?
            .release(value)
    }

    /// Destroy a value through the member pool that owns it.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::UnknownResource` if no member pool tracks it.
    pub async fn destroy(&self, value: &T) -> Result<(), PoolError> {
        let pool = self
            .owner_of(value)
            .ok_or(PoolError::UnknownResource(Operation::Destroy))?;
        pool.destroy(value).await
    }
}

#[async_trait]
impl<T: PoolValue> ResourceSource<T> for Cluster<T> {
    async fn acquire(&self, options: AcquireOptions) -> Result<T, PoolError> {
        Self::acquire(self, options).await
    }

    fn release(&self, value: &T) -> Result<(), PoolError> {
        Self::release(self, value)
    }

    async fn destroy(&self, value: &T) -> Result<(), PoolError> {
        Self::destroy(self, value).await
    }

    async fn open(&self) -> Result<(), PoolError> {
        Self::open(self).await
    }

    async fn close(&self, options: CloseOptions) -> Result<(), PoolError> {
        Self::close(self, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoxError, Hooks, PoolOptions};
    use std::time::Duration;

    fn tagged(attributes: &[&str], max: usize) -> Pool<String> {
        let tag = attributes.join("+");
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let hooks = Hooks::new(
            move || {
                let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let value = format!("{tag}-{n}");
                async move { Ok::<_, BoxError>(value) }
            },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        Pool::new(
            hooks,
            PoolOptions {
                max,
                attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
                ..PoolOptions::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_binds_queue_and_inherits() {
        let cluster: Cluster<String> = Cluster::new(ClusterOptions {
            concurrency: Some(2),
            shared: SharedOptions {
                acquire_timeout: Some(Duration::from_millis(250)),
                ..SharedOptions::default()
            },
        })
        .unwrap();
        let pool = tagged(&["r"], 1);
        assert!(cluster.add(pool.clone()));
        assert!(!cluster.add(pool.clone()));

        assert!(pool.request_queue().same_queue(&cluster.request_queue()));
        assert_eq!(
            pool.shared_options().acquire_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let options: ClusterOptions<String> = ClusterOptions {
            concurrency: Some(0),
            shared: SharedOptions::default(),
        };
        assert!(matches!(Cluster::new(options), Err(ConfigError::Invalid(_))));
        let options: ClusterOptions<String> = ClusterOptions {
            concurrency: Some(0),
            shared: SharedOptions::default(),
        };
        assert!(matches!(
            Cluster::with_pools(options, [tagged(&["r"], 1)]),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_cluster_rejects() {
        let cluster: Cluster<String> = Cluster::new(ClusterOptions::default()).unwrap();
        cluster.open().await.unwrap();
        let err = cluster.acquire(AcquireOptions::new()).await.unwrap_err();
        assert!(matches!(err, PoolError::NoPools));
    }

    #[tokio::test]
    async fn test_no_matching_pool() {
        let cluster = Cluster::with_pools(ClusterOptions::default(), [tagged(&["r"], 1)]).unwrap();
        cluster.open().await.unwrap();
        let err = cluster
            .acquire(AcquireOptions::new().with_attributes(["w"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NoMatchingPool(_)));
    }

    #[tokio::test]
    async fn test_remove_detaches_relay() {
        let pool = tagged(&["r"], 2);
        let cluster = Cluster::with_pools(ClusterOptions::default(), [pool.clone()]).unwrap();
        let mut events = cluster.subscribe();

        assert!(cluster.remove(&pool));
        assert!(!cluster.remove(&pool));
        pool.open().await.unwrap();
        let value = pool.acquire(AcquireOptions::new()).await.unwrap();
        pool.release(&value).unwrap();

        assert!(events.try_recv().is_err());
        assert!(cluster.is_empty());
    }

    #[tokio::test]
    async fn test_release_unknown() {
        let cluster = Cluster::with_pools(ClusterOptions::default(), [tagged(&["r"], 1)]).unwrap();
        cluster.open().await.unwrap();
        let err = cluster.release(&"stranger".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Unable to release unknown resource.");
        let err = cluster.destroy(&"stranger".to_string()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unable to destroy unknown resource.");
    }
}
