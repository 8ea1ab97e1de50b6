//! Pool state machine: acquisition queueing, capacity control and maintenance.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::error::{share, BoxError, ConfigError, Operation, PoolError};
use crate::core::events::{EventBus, PoolEvent, PoolId};
use crate::core::options::{AcquireOptions, CloseOptions, PoolOptions, SharedOptions};
use crate::core::resource::{self, Hooks, PingFn, Resource, ResourceId};
use crate::core::resource_list::{Order, ResourceList};
use crate::infra::queue::{InFlight, InFlightGuard, RequestQueue, WaiterQueue};

/// Marker trait for values a pool can hand out.
///
/// Values are matched by equality on `release`/`destroy`, so handles should
/// compare by identity (an id, a pointer-equal wrapper, ...).
pub trait PoolValue: Clone + PartialEq + Send + Sync + 'static {}

impl<T> PoolValue for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Shared interface of [`Pool`] and [`Cluster`](crate::core::Cluster).
#[async_trait]
pub trait ResourceSource<T: PoolValue>: Send + Sync {
    /// Hand out a resource value.
    async fn acquire(&self, options: AcquireOptions) -> Result<T, PoolError>;
    /// Return a borrowed value.
    fn release(&self, value: &T) -> Result<(), PoolError>;
    /// Remove a value and run its destroy callback.
    async fn destroy(&self, value: &T) -> Result<(), PoolError>;
    /// Start serving.
    async fn open(&self) -> Result<(), PoolError>;
    /// Stop serving and destroy every resource.
    async fn close(&self, options: CloseOptions) -> Result<(), PoolError>;
}

/// Lifecycle of a pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Constructed, not yet opened.
    Created,
    /// Serving acquires.
    Open,
    /// `close` is waiting for in-flight work.
    Closing,
    /// Terminal.
    Closed,
}

/// Point-in-time counters of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    /// Pool identity.
    pub id: PoolId,
    /// Lifecycle status.
    pub status: PoolStatus,
    /// Available plus borrowed.
    pub size: usize,
    /// Resources ready to hand out.
    pub available: usize,
    /// Resources handed out.
    pub borrowed: usize,
    /// Available resources matching the idle predicate.
    pub idle: usize,
    /// Creations in flight.
    pub pending: usize,
    /// Queued acquires.
    pub waiting: usize,
    /// Configured minimum.
    pub min: usize,
    /// Configured maximum.
    pub max: usize,
    /// Routing tags.
    pub attributes: BTreeSet<String>,
}

struct State<T> {
    status: PoolStatus,
    available: ResourceList<T>,
    borrowed: ResourceList<T>,
    pending: usize,
    waiters: WaiterQueue<T>,
    min: usize,
    max: usize,
    max_idle: Option<usize>,
    timers: Vec<JoinHandle<()>>,
}

impl<T> State<T> {
    fn size(&self) -> usize {
        self.available.len() + self.borrowed.len()
    }
}

struct Inner<T> {
    id: PoolId,
    hooks: Hooks<T>,
    attributes: BTreeSet<String>,
    shared: RwLock<SharedOptions<T>>,
    state: Mutex<State<T>>,
    requests: RwLock<RequestQueue>,
    in_flight: Arc<InFlight>,
    events: EventBus<T>,
    next_waiter: AtomicU64,
}

#[derive(Clone, Copy)]
enum Maintenance {
    Ping,
    Skim,
}

/// A queued acquire. If the acquiring future is dropped before it settles,
/// the waiter is withdrawn and a value already dispatched to it is released.
struct PendingAcquire<'a, T: PoolValue> {
    pool: &'a Pool<T>,
    waiter: u64,
    rx: oneshot::Receiver<Result<T, PoolError>>,
    settled: bool,
}

impl<T: PoolValue> Drop for PendingAcquire<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.pool.inner.state.lock().waiters.remove(self.waiter);
        self.rx.close();
        if let Ok(Ok(value)) = self.rx.try_recv() {
            debug!(pool = %self.pool.inner.id, waiter = self.waiter, "acquire dropped after dispatch, releasing");
            let _ = self.pool.release(&value);
        }
    }
}

/// A bounded set of resources handed out to concurrent callers.
///
/// Cloning yields another handle to the same pool. Every method that may
/// start a callback must run inside a Tokio runtime.
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("status", &state.status)
            .field("available", &state.available.len())
            .field("borrowed", &state.borrowed.len())
            .field("pending", &state.pending)
            .finish()
    }
}

impl<T: PoolValue> Pool<T> {
    /// Create a closed pool.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `min > max` or `concurrency == Some(0)`.
    pub fn new(hooks: Hooks<T>, options: PoolOptions<T>) -> Result<Self, ConfigError> {
        if options.min > options.max {
            return Err(ConfigError::Invalid(format!(
                "min ({}) must not exceed max ({})",
                options.min, options.max
            )));
        }
        if options.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be greater than 0".into()));
        }
        let order = Order::from_fifo(options.shared.fifo());
        let id = PoolId::next();
        debug!(pool = %id, min = options.min, max = options.max, "pool created");
        Ok(Self {
            inner: Arc::new(Inner {
                id,
                hooks,
                attributes: options.attributes,
                shared: RwLock::new(options.shared),
                state: Mutex::new(State {
                    status: PoolStatus::Created,
                    available: ResourceList::new(order),
                    borrowed: ResourceList::new(order),
                    pending: 0,
                    waiters: WaiterQueue::new(),
                    min: options.min,
                    max: options.max,
                    max_idle: options.max_idle,
                    timers: Vec::new(),
                }),
                requests: RwLock::new(RequestQueue::new(options.concurrency)),
                in_flight: Arc::new(InFlight::default()),
                events: EventBus::new(),
                next_waiter: AtomicU64::new(1),
            }),
        })
    }

    /// Pool identity.
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    /// Static routing tags.
    pub fn attributes(&self) -> &BTreeSet<String> {
        &self.inner.attributes
    }

    /// Whether this pool carries every requested tag.
    pub fn matches<S: AsRef<str>>(&self, attributes: &[S]) -> bool {
        attributes
            .iter()
            .all(|a| self.inner.attributes.contains(a.as_ref()))
    }

    /// Lifecycle status.
    pub fn status(&self) -> PoolStatus {
        self.inner.state.lock().status
    }

    /// Whether the pool is serving acquires.
    pub fn is_open(&self) -> bool {
        self.status() == PoolStatus::Open
    }

    /// Available plus borrowed resources.
    pub fn size(&self) -> usize {
        self.inner.state.lock().size()
    }

    /// Resources ready to hand out.
    pub fn available(&self) -> usize {
        self.inner.state.lock().available.len()
    }

    /// Resources currently handed out.
    pub fn borrowed(&self) -> usize {
        self.inner.state.lock().borrowed.len()
    }

    /// Creations in flight.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().pending
    }

    /// Queued acquires.
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }

    /// Available resources matching the idle predicate.
    pub fn idle(&self) -> usize {
        let shared = self.inner.shared.read().clone();
        let state = self.inner.state.lock();
        state
            .available
            .iter()
            .filter(|r| r.is_idle(shared.is_idle.as_ref(), shared.idles_after))
            .count()
    }

    /// Configured minimum.
    pub fn min(&self) -> usize {
        self.inner.state.lock().min
    }

    /// Configured maximum.
    pub fn max(&self) -> usize {
        self.inner.state.lock().max
    }

    /// Configured idle ceiling for skim passes.
    pub fn max_idle(&self) -> Option<usize> {
        self.inner.state.lock().max_idle
    }

    /// Raise or lower the minimum; an open pool starts filling in the background.
    pub fn set_min(&self, min: usize) {
        let handles = {
            let mut state = self.inner.state.lock();
            state.min = min;
            self.replenish(&mut state)
        };
        debug!(pool = %self.inner.id, min, started = handles.len(), "min updated");
    }

    /// Raise or lower the maximum; excess resources are destroyed as they are released.
    pub fn set_max(&self, max: usize) {
        let handles = {
            let mut state = self.inner.state.lock();
            state.max = max;
            self.replenish(&mut state)
        };
        debug!(pool = %self.inner.id, max, started = handles.len(), "max updated");
    }

    /// Change the idle ceiling used by the next skim pass.
    pub fn set_max_idle(&self, max_idle: Option<usize>) {
        self.inner.state.lock().max_idle = max_idle;
    }

    /// Copy every option unset on this pool from `parent`.
    pub fn inherit(&self, parent: &SharedOptions<T>) {
        let fifo = {
            let mut shared = self.inner.shared.write();
            shared.inherit(parent);
            shared.fifo()
        };
        let mut state = self.inner.state.lock();
        state.available.set_order(Order::from_fifo(fifo));
        state.borrowed.set_order(Order::from_fifo(fifo));
    }

    /// Effective shareable options.
    pub fn shared_options(&self) -> SharedOptions<T> {
        self.inner.shared.read().clone()
    }

    /// Route create/destroy/ping callbacks through `queue`.
    pub fn bind_request_queue(&self, queue: RequestQueue) {
        *self.inner.requests.write() = queue;
    }

    /// Queue used for lifecycle callbacks.
    pub fn request_queue(&self) -> RequestQueue {
        self.inner.requests.read().clone()
    }

    /// Subscribe to lifecycle signals.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent<T>> {
        self.inner.events.subscribe()
    }

    pub(crate) fn events(&self) -> &EventBus<T> {
        &self.inner.events
    }

    /// Whether `value` is available or borrowed in this pool.
    pub fn includes(&self, value: &T) -> bool {
        let state = self.inner.state.lock();
        state.available.find_by_value(value).is_some() || state.borrowed.find_by_value(value).is_some()
    }

    /// Point-in-time counters.
    pub fn snapshot(&self) -> PoolSnapshot {
        let idle = self.idle();
        let state = self.inner.state.lock();
        PoolSnapshot {
            id: self.inner.id,
            status: state.status,
            size: state.size(),
            available: state.available.len(),
            borrowed: state.borrowed.len(),
            idle,
            pending: state.pending,
            waiting: state.waiters.len(),
            min: state.min,
            max: state.max,
            attributes: self.inner.attributes.clone(),
        }
    }

    /// Open the pool, fill it to `min` and arm the maintenance timers.
    ///
    /// Creation failures during the fill surface as `CreateError` events.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Closed` if the pool has already been closed.
    pub async fn open(&self) -> Result<(), PoolError> {
        {
            let mut state = self.inner.state.lock();
            match state.status {
                PoolStatus::Open => return Ok(()),
                PoolStatus::Closing | PoolStatus::Closed => return Err(PoolError::Closed),
                PoolStatus::Created => state.status = PoolStatus::Open,
            }
        }
        info!(pool = %self.inner.id, min = self.min(), max = self.max(), "opening pool");
        self.arm_timers();
        self.fill().await;
        Ok(())
    }

    /// Hand out a resource value, waiting up to the acquire timeout.
    ///
    /// # Errors
    ///
    /// - `PoolError::Closed` if the pool is not open or closes while waiting
    /// - `PoolError::AcquireTimeout` if nothing became available in time
    /// - `PoolError::Create` if the creation started for this call failed
    pub async fn acquire(&self, options: AcquireOptions) -> Result<T, PoolError> {
        let timeout = self.inner.shared.read().acquire_timeout();
        self.acquire_within(options, timeout).await
    }

    /// Like [`Pool::acquire`] but bounded by `timeout` instead of the pool's own.
    pub(crate) async fn acquire_within(
        &self,
        options: AcquireOptions,
        timeout: Duration,
    ) -> Result<T, PoolError> {
        let waiter = self.inner.next_waiter.fetch_add(1, Ordering::Relaxed);

        let rx = {
            let mut state = self.inner.state.lock();
            if state.status != PoolStatus::Open {
                return Err(PoolError::Closed);
            }
            if state.waiters.is_empty() {
                if let Some(value) = Self::take_available(&mut state) {
                    return Ok(value);
                }
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(waiter, options.priority, tx);
            if state.size() + state.pending < state.max && state.pending < state.waiters.len() {
                self.spawn_create(&mut state, Some(waiter));
            }
            rx
        };
        debug!(pool = %self.inner.id, waiter, priority = options.priority, "acquire queued");

        let mut pending = PendingAcquire {
            pool: self,
            waiter,
            rx,
            settled: false,
        };
        let result = match tokio::time::timeout(timeout, &mut pending.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => {
                if self.inner.state.lock().waiters.remove(waiter).is_some() {
                    warn!(pool = %self.inner.id, waiter, timeout_ms = timeout.as_millis() as u64, "acquire timed out");
                    Err(PoolError::AcquireTimeout)
                } else {
                    // A reply raced the timeout; it is already in the channel.
                    pending.rx.try_recv().unwrap_or(Err(PoolError::Closed))
                }
            }
        };
        pending.settled = true;
        result
    }

    /// Return a borrowed value to the available list.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::UnknownResource` if the value is not borrowed from this pool.
    pub fn release(&self, value: &T) -> Result<(), PoolError> {
        let mut state = self.inner.state.lock();
        let resource = state
            .borrowed
            .find_by_value(value)
            .map(Resource::id)
            .and_then(|id| state.borrowed.delete(id))
            .ok_or(PoolError::UnknownResource(Operation::Release))?;

        if state.size() >= state.max {
            debug!(pool = %self.inner.id, resource = %resource.id(), "released above max, destroying");
            drop(state);
            self.spawn_destroy(resource);
            return Ok(());
        }

        state.available.add(resource);
        Self::dispatch(&mut state);
        let available = !state.available.is_empty();
        drop(state);

        if available {
            self.inner.events.emit(PoolEvent::Available { pool: self.inner.id });
        }
        Ok(())
    }

    /// Remove a value from the pool and run its destroy callback.
    ///
    /// Callback failures are reported as `DestroyError` events. An open pool
    /// below `min` starts a replacement.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::UnknownResource` if the value is not tracked by this pool.
    pub async fn destroy(&self, value: &T) -> Result<(), PoolError> {
        let resource = {
            let mut state = self.inner.state.lock();
            let borrowed = state.borrowed.find_by_value(value).map(Resource::id);
            let resource = match borrowed {
                Some(id) => state.borrowed.delete(id),
                None => {
                    let available = state.available.find_by_value(value).map(Resource::id);
                    available.and_then(|id| state.available.delete(id))
                }
            }
            .ok_or(PoolError::UnknownResource(Operation::Destroy))?;
            self.replenish(&mut state);
            resource
        };
        let _ = self.spawn_destroy(resource).await;
        Ok(())
    }

    /// Create resources until size plus pending creations reaches `min`.
    pub async fn fill(&self) {
        let handles = {
            let mut state = self.inner.state.lock();
            self.replenish(&mut state)
        };
        if handles.is_empty() {
            return;
        }
        debug!(pool = %self.inner.id, creating = handles.len(), "filling pool");
        join_all(handles).await;
    }

    /// Destroy every available and borrowed resource.
    pub async fn drain(&self) {
        let resources = {
            let mut state = self.inner.state.lock();
            let mut all = state.available.clear();
            all.extend(state.borrowed.clear());
            all
        };
        if resources.is_empty() {
            return;
        }
        debug!(pool = %self.inner.id, count = resources.len(), "draining pool");
        let handles: Vec<_> = resources.into_iter().map(|r| self.spawn_destroy(r)).collect();
        join_all(handles).await;
    }

    /// Close the pool: stop timers, reject waiters, settle in-flight work, drain.
    ///
    /// With `flush` queued acquires are rejected immediately; otherwise they
    /// may still be served by releases until in-flight callbacks settle.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` mirrors [`ResourceSource::close`].
    pub async fn close(&self, options: CloseOptions) -> Result<(), PoolError> {
        let (timers, rejected) = {
            let mut state = self.inner.state.lock();
            match state.status {
                PoolStatus::Created => {
                    state.status = PoolStatus::Closed;
                    return Ok(());
                }
                PoolStatus::Closing | PoolStatus::Closed => return Ok(()),
                PoolStatus::Open => state.status = PoolStatus::Closing,
            }
            let timers = std::mem::take(&mut state.timers);
            let rejected = if options.flush {
                state.waiters.drain()
            } else {
                Vec::new()
            };
            (timers, rejected)
        };
        info!(pool = %self.inner.id, flush = options.flush, "closing pool");

        for timer in timers {
            timer.abort();
        }
        Self::reject_all(rejected);

        self.inner.in_flight.settled().await;

        let rejected = {
            let mut state = self.inner.state.lock();
            state.status = PoolStatus::Closed;
            state.waiters.drain()
        };
        Self::reject_all(rejected);

        self.drain().await;
        self.inner.in_flight.settled().await;
        info!(pool = %self.inner.id, "pool closed");
        Ok(())
    }

    /// Ping every idle available resource once.
    ///
    /// A failure flags the resource (`ping_failed`), which the default dead
    /// predicate turns into removal on the next skim. A success clears the flag.
    /// When no idle criterion is configured every available resource is pinged.
    /// Each ping runs as its own task, so a `close` during the sweep waits for
    /// it instead of cancelling it.
    pub async fn ping_idle(&self) {
        let shared = self.inner.shared.read().clone();
        let Some(ping_fn) = shared.ping.clone() else {
            return;
        };
        let any_idle = shared.is_idle.is_some() || shared.idles_after.is_some();
        // Guards are taken under the state lock so a concurrent close sees them.
        let targets: Vec<(ResourceId, T, InFlightGuard)> = {
            let state = self.inner.state.lock();
            if state.status != PoolStatus::Open {
                return;
            }
            state
                .available
                .iter()
                .filter(|r| !any_idle || r.is_idle(shared.is_idle.as_ref(), shared.idles_after))
                .map(|r| (r.id(), r.value().clone(), self.inner.in_flight.enter()))
                .collect()
        };
        if targets.is_empty() {
            return;
        }

        let handles: Vec<_> = targets
            .into_iter()
            .map(|(id, value, guard)| self.spawn_ping(id, value, ping_fn.clone(), guard))
            .collect();
        join_all(handles).await;
    }

    /// Run one skim pass: destroy dead and excess idle available resources.
    ///
    /// Excess idle resources beyond `max_idle` are evicted oldest-idle first.
    pub async fn skim(&self) {
        let shared = self.inner.shared.read().clone();
        let (dead, excess) = {
            let mut state = self.inner.state.lock();
            if state.status != PoolStatus::Open {
                return;
            }
            let dead = state
                .available
                .remove_where(|r| r.is_dead(shared.is_dead.as_ref(), shared.dies_after));

            let mut excess = Vec::new();
            if let Some(max_idle) = state.max_idle {
                let mut idle: Vec<(ResourceId, Instant)> = state
                    .available
                    .iter()
                    .filter(|r| r.is_idle(shared.is_idle.as_ref(), shared.idles_after))
                    .map(|r| (r.id(), r.state().last_acquired))
                    .collect();
                if idle.len() > max_idle {
                    idle.sort_by_key(|(_, last_acquired)| *last_acquired);
                    let evict = idle.len() - max_idle;
                    excess.extend(
                        idle.into_iter()
                            .take(evict)
                            .filter_map(|(id, _)| state.available.delete(id)),
                    );
                }
            }
            if !dead.is_empty() || !excess.is_empty() {
                self.replenish(&mut state);
            }
            (dead, excess)
        };
        if dead.is_empty() && excess.is_empty() {
            return;
        }
        info!(pool = %self.inner.id, dead = dead.len(), idle = excess.len(), "skimming pool");
        let handles: Vec<_> = dead
            .into_iter()
            .chain(excess)
            .map(|r| self.spawn_destroy(r))
            .collect();
        join_all(handles).await;
    }

    fn take_available(state: &mut State<T>) -> Option<T> {
        let mut resource = state.available.shift()?;
        resource.touch();
        let value = resource.value().clone();
        state.borrowed.add(resource);
        Some(value)
    }

    /// Hand available resources to queued waiters in priority order.
    fn dispatch(state: &mut State<T>) -> usize {
        let mut served = 0;
        while !state.available.is_empty() {
            let Some(waiter) = state.waiters.pop() else {
                break;
            };
            if waiter.reply.is_closed() {
                continue;
            }
            let Some(mut resource) = state.available.shift() else {
                break;
            };
            let id = resource.id();
            let value = resource.value().clone();
            resource.touch();
            state.borrowed.add(resource);
            if waiter.reply.send(Ok(value)).is_ok() {
                served += 1;
            } else if let Some(resource) = state.borrowed.delete(id) {
                state.available.unshift(resource);
            }
        }
        served
    }

    fn reject_all(waiters: Vec<crate::infra::queue::Waiter<T>>) {
        for waiter in waiters {
            let _ = waiter.reply.send(Err(PoolError::Closed));
        }
    }

    /// Start creations needed to reach `min` and to cover queued waiters, bounded by `max`.
    fn replenish(&self, state: &mut State<T>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if state.status != PoolStatus::Open {
            return handles;
        }
        loop {
            let planned = state.size() + state.pending;
            if planned >= state.max {
                break;
            }
            let below_min = planned < state.min;
            let uncovered = state.pending < state.waiters.len();
            if !below_min && !uncovered {
                break;
            }
            handles.push(self.spawn_create(state, None));
        }
        handles
    }

    fn spawn_create(&self, state: &mut State<T>, waiter: Option<u64>) -> JoinHandle<()> {
        state.pending += 1;
        let guard = self.inner.in_flight.enter();
        let pool = self.clone();
        let requests = self.request_queue();
        tokio::spawn(async move {
            let result = requests.run(Resource::create(&pool.inner.hooks)).await;
            pool.finish_create(result, waiter);
            drop(guard);
        })
    }

    fn finish_create(&self, result: Result<Resource<T>, BoxError>, waiter: Option<u64>) {
        let pool = self.inner.id;
        match result {
            Ok(resource) => {
                let value = resource.value().clone();
                let mut state = self.inner.state.lock();
                state.pending -= 1;
                if state.status != PoolStatus::Open {
                    drop(state);
                    debug!(pool = %pool, resource = %resource.id(), "created after close, destroying");
                    self.inner.events.emit(PoolEvent::Created { pool, value });
                    self.spawn_destroy(resource);
                    return;
                }
                debug!(pool = %pool, resource = %resource.id(), "resource created");
                state.available.add(resource);
                Self::dispatch(&mut state);
                let available = !state.available.is_empty();
                drop(state);

                self.inner.events.emit(PoolEvent::Created { pool, value });
                if available {
                    self.inner.events.emit(PoolEvent::Available { pool });
                }
            }
            Err(err) => {
                let error = share(err);
                let rejected = {
                    let mut state = self.inner.state.lock();
                    state.pending -= 1;
                    // Fall back to the head of the queue when the triggering
                    // waiter was already served and a waiter is left uncovered.
                    match waiter.and_then(|id| state.waiters.remove(id)) {
                        Some(w) => Some(w),
                        None if state.pending < state.waiters.len() => state.waiters.pop(),
                        None => None,
                    }
                };
                warn!(pool = %pool, error = %error, "resource creation failed");
                self.inner.events.emit(PoolEvent::CreateError {
                    pool,
                    error: Arc::clone(&error),
                });
                if let Some(waiter) = rejected {
                    let _ = waiter.reply.send(Err(PoolError::Create(error)));
                }
            }
        }
    }

    fn spawn_destroy(&self, resource: Resource<T>) -> JoinHandle<()> {
        let guard = self.inner.in_flight.enter();
        let pool = self.clone();
        let requests = self.request_queue();
        tokio::spawn(async move {
            let id = resource.id();
            let value = resource.value().clone();
            let result = requests.run(resource.destroy(&pool.inner.hooks)).await;
            let event = match result {
                Ok(()) => {
                    debug!(pool = %pool.inner.id, resource = %id, "resource destroyed");
                    PoolEvent::Destroyed {
                        pool: pool.inner.id,
                        value,
                    }
                }
                Err(err) => {
                    let error = share(err);
                    warn!(pool = %pool.inner.id, resource = %id, error = %error, "resource destruction failed");
                    PoolEvent::DestroyError {
                        pool: pool.inner.id,
                        value,
                        error,
                    }
                }
            };
            pool.inner.events.emit(event);
            drop(guard);
        })
    }

    fn spawn_ping(
        &self,
        id: ResourceId,
        value: T,
        ping_fn: PingFn<T>,
        guard: InFlightGuard,
    ) -> JoinHandle<()> {
        let pool = self.clone();
        let requests = self.request_queue();
        tokio::spawn(async move {
            let result = requests.run(resource::ping(Some(&ping_fn), value.clone())).await;
            {
                let mut state = pool.inner.state.lock();
                let failed = result.is_err();
                if let Some(r) = state.available.get_mut(id) {
                    r.set_ping_failed(failed);
                } else if let Some(r) = state.borrowed.get_mut(id) {
                    r.set_ping_failed(failed);
                }
            }
            if let Err(PoolError::Ping(error)) = result {
                warn!(pool = %pool.inner.id, resource = %id, error = %error, "ping failed");
                pool.inner.events.emit(PoolEvent::PingError {
                    pool: pool.inner.id,
                    value,
                    error,
                });
            }
            drop(guard);
        })
    }

    fn arm_timers(&self) {
        let (ping_interval, skim_interval, has_ping) = {
            let shared = self.inner.shared.read();
            (shared.ping_interval, shared.skim_interval, shared.ping.is_some())
        };
        let mut timers = Vec::new();
        if let (Some(interval), true) = (ping_interval, has_ping) {
            timers.push(self.spawn_maintenance(interval, Maintenance::Ping));
        }
        if let Some(interval) = skim_interval {
            timers.push(self.spawn_maintenance(interval, Maintenance::Skim));
        }
        self.inner.state.lock().timers.extend(timers);
    }

    fn spawn_maintenance(&self, period: Duration, task: Maintenance) -> JoinHandle<()> {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let pool = Self { inner };
                if !pool.is_open() {
                    break;
                }
                match task {
                    Maintenance::Ping => pool.ping_idle().await,
                    Maintenance::Skim => pool.skim().await,
                }
            }
        })
    }
}

#[async_trait]
impl<T: PoolValue> ResourceSource<T> for Pool<T> {
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
    use std::sync::atomic::AtomicU32;

    fn counting_pool(min: usize, max: usize) -> Pool<u32> {
        let next = Arc::new(AtomicU32::new(0));
        let hooks = Hooks::new(
            move || {
                let next = Arc::clone(&next);
                async move { Ok::<_, BoxError>(next.fetch_add(1, Ordering::SeqCst)) }
            },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        Pool::new(
            hooks,
            PoolOptions {
                min,
                max,
                ..PoolOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_min_above_max_rejected() {
        let hooks: Hooks<u32> = Hooks::new(
            || async { Ok::<_, BoxError>(1) },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        let options = PoolOptions {
            min: 3,
            max: 1,
            ..PoolOptions::default()
        };
        assert!(matches!(Pool::new(hooks, options), Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_acquire_before_open_is_closed() {
        let pool = counting_pool(0, 1);
        let err = pool.acquire(AcquireOptions::new()).await.unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }

    #[tokio::test]
    async fn test_dispatch_skips_abandoned_waiters() {
        let pool = counting_pool(0, 2);
        pool.open().await.unwrap();
        let value = pool.acquire(AcquireOptions::new()).await.unwrap();

        {
            let mut state = pool.inner.state.lock();
            let (dead_tx, dead_rx) = oneshot::channel();
            state.waiters.push(100, 0, dead_tx);
            drop(dead_rx);
        }
        pool.release(&value).unwrap();

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.borrowed(), 0);
        assert_eq!(pool.waiting(), 0);
    }

    #[tokio::test]
    async fn test_release_above_max_destroys() {
        let pool = counting_pool(0, 2);
        pool.open().await.unwrap();
        let a = pool.acquire(AcquireOptions::new()).await.unwrap();
        let _b = pool.acquire(AcquireOptions::new()).await.unwrap();

        pool.set_max(1);
        pool.release(&a).unwrap();
        tokio::task::yield_now().await;

        assert!(!pool.includes(&a));
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_reopen_rejected() {
        let pool = counting_pool(1, 2);
        pool.open().await.unwrap();
        pool.open().await.unwrap();
        pool.close(CloseOptions::default()).await.unwrap();
        assert!(matches!(pool.open().await, Err(PoolError::Closed)));
        assert_eq!(pool.status(), PoolStatus::Closed);
    }

    #[tokio::test]
    async fn test_matches_attributes() {
        let hooks: Hooks<u32> = Hooks::new(
            || async { Ok::<_, BoxError>(1) },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        let pool = Pool::new(
            hooks,
            PoolOptions {
                attributes: ["r", "w"].into_iter().map(String::from).collect(),
                ..PoolOptions::default()
            },
        )
        .unwrap();
        assert!(pool.matches(&["w"]));
        assert!(pool.matches::<&str>(&[]));
        assert!(!pool.matches(&["x"]));
    }
}
