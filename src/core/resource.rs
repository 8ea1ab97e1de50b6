//! A single pooled value and its lifecycle metadata.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::core::error::{share, BoxError, PoolError};

/// Boxed future returned by lifecycle callbacks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub(crate) type CreateFn<T> = dyn Fn() -> BoxFuture<Result<T, BoxError>> + Send + Sync;
pub(crate) type ValueFn<T> = dyn Fn(T) -> BoxFuture<Result<(), BoxError>> + Send + Sync;

/// Predicate evaluated against a resource snapshot (`is_dead` / `is_idle`).
pub type Predicate = Arc<dyn Fn(&ResourceState) -> bool + Send + Sync>;

/// Ping callback shared between pools of a cluster.
pub type PingFn<T> = Arc<ValueFn<T>>;

/// Unique identity of a resource inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ResourceId(Uuid);

impl ResourceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Snapshot of the lifecycle metadata of a resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceState {
    /// Resource identity.
    pub id: ResourceId,
    /// When the create callback resolved.
    pub created_at: Instant,
    /// When the resource was last handed to a borrower.
    pub last_acquired: Instant,
    /// Whether the most recent ping failed.
    pub ping_failed: bool,
}

impl ResourceState {
    /// Time elapsed since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time elapsed since the last acquisition.
    pub fn idle_for(&self) -> Duration {
        self.last_acquired.elapsed()
    }
}

/// Default dead check: too old, or the last ping failed.
pub fn default_is_dead(state: &ResourceState, dies_after: Option<Duration>) -> bool {
    state.ping_failed || dies_after.is_some_and(|limit| state.age() > limit)
}

/// Default idle check: not acquired for longer than `idles_after`.
pub fn default_is_idle(state: &ResourceState, idles_after: Option<Duration>) -> bool {
    idles_after.is_some_and(|limit| state.idle_for() > limit)
}

/// User-supplied lifecycle callbacks for pooled values.
pub struct Hooks<T> {
    create: Arc<CreateFn<T>>,
    destroy: Arc<ValueFn<T>>,
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
            destroy: Arc::clone(&self.destroy),
        }
    }
}

impl<T: Send + 'static> Hooks<T> {
    /// Bundle a create and destroy callback.
    pub fn new<C, CF, CE, D, DF, DE>(create: C, destroy: D) -> Self
    where
        C: Fn() -> CF + Send + Sync + 'static,
        CF: Future<Output = Result<T, CE>> + Send + 'static,
        CE: Into<BoxError>,
        D: Fn(T) -> DF + Send + Sync + 'static,
        DF: Future<Output = Result<(), DE>> + Send + 'static,
        DE: Into<BoxError>,
    {
        Self::from_parts(boxed_create_fn(create), boxed_value_fn(destroy))
    }

    pub(crate) fn from_parts(create: Arc<CreateFn<T>>, destroy: Arc<ValueFn<T>>) -> Self {
        Self { create, destroy }
    }

    pub(crate) async fn create(&self) -> Result<T, BoxError> {
        (self.create)().await
    }

    pub(crate) async fn destroy(&self, value: T) -> Result<(), BoxError> {
        (self.destroy)(value).await
    }
}

pub(crate) fn boxed_create_fn<T, F, Fut, E>(f: F) -> Arc<CreateFn<T>>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(move || -> BoxFuture<Result<T, BoxError>> {
        let fut = f();
        Box::pin(async move { fut.await.map_err(Into::into) })
    })
}

/// Box a `Fn(T) -> Future<Result<(), E>>` into the shared callback shape.
pub fn boxed_value_fn<T, F, Fut, E>(f: F) -> PingFn<T>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Arc::new(move |value| -> BoxFuture<Result<(), BoxError>> {
        let fut = f(value);
        Box::pin(async move { fut.await.map_err(Into::into) })
    })
}

/// Invoke an optional ping callback.
pub(crate) async fn ping<T>(ping: Option<&PingFn<T>>, value: T) -> Result<(), PoolError> {
    let Some(ping) = ping else {
        return Err(PoolError::PingNotConfigured);
    };
    ping(value).await.map_err(|e| PoolError::Ping(share(e)))
}

/// A pooled value plus liveness timestamps.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    value: T,
    state: ResourceState,
}

impl<T: Clone + Send + 'static> Resource<T> {
    /// Run the create callback and wrap the produced value.
    ///
    /// Rejections propagate unchanged; there is no retry at this layer.
    pub async fn create(hooks: &Hooks<T>) -> Result<Self, BoxError> {
        let value = hooks.create().await?;
        Ok(Self::from_value(value))
    }

    /// Run the destroy callback with this resource's value.
    pub async fn destroy(self, hooks: &Hooks<T>) -> Result<(), BoxError> {
        hooks.destroy(self.value).await
    }

    /// Run the ping callback, failing with `PingNotConfigured` when absent.
    pub async fn ping(&self, ping_fn: Option<&PingFn<T>>) -> Result<(), PoolError> {
        ping(ping_fn, self.value.clone()).await
    }
}

impl<T> Resource<T> {
    pub(crate) fn from_value(value: T) -> Self {
        let now = Instant::now();
        Self {
            value,
            state: ResourceState {
                id: ResourceId::new(),
                created_at: now,
                last_acquired: now,
                ping_failed: false,
            },
        }
    }

    /// Pooled value.
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Resource identity.
    pub const fn id(&self) -> ResourceId {
        self.state.id
    }

    /// Lifecycle snapshot.
    pub const fn state(&self) -> &ResourceState {
        &self.state
    }

    pub(crate) fn touch(&mut self) {
        self.state.last_acquired = Instant::now();
    }

    pub(crate) fn set_ping_failed(&mut self, failed: bool) {
        self.state.ping_failed = failed;
    }

    /// Evaluate the dead predicate, falling back to the age/ping default.
    pub fn is_dead(&self, predicate: Option<&Predicate>, dies_after: Option<Duration>) -> bool {
        predicate.map_or_else(
            || default_is_dead(&self.state, dies_after),
            |p| p(&self.state),
        )
    }

    /// Evaluate the idle predicate, falling back to the time-since-acquire default.
    pub fn is_idle(&self, predicate: Option<&Predicate>, idles_after: Option<Duration>) -> bool {
        predicate.map_or_else(
            || default_is_idle(&self.state, idles_after),
            |p| p(&self.state),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hooks() -> Hooks<u32> {
        Hooks::new(
            || async { Ok::<_, BoxError>(7) },
            |_v| async { Ok::<_, BoxError>(()) },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_dies_after_age() {
        let res = Resource::create(&hooks()).await.unwrap();
        assert!(!res.is_dead(None, Some(Duration::from_millis(100))));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(res.is_dead(None, Some(Duration::from_millis(100))));
        assert!(!res.is_dead(None, None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_failure_marks_dead() {
        let mut res = Resource::create(&hooks()).await.unwrap();
        res.set_ping_failed(true);
        assert!(res.is_dead(None, None));
        res.set_ping_failed(false);
        assert!(!res.is_dead(None, None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_resets_on_touch() {
        let mut res = Resource::create(&hooks()).await.unwrap();
        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(res.is_idle(None, Some(Duration::from_millis(10))));
        res.touch();
        assert!(!res.is_idle(None, Some(Duration::from_millis(10))));
    }

    #[tokio::test]
    async fn test_custom_predicate_overrides_default() {
        let res = Resource::create(&hooks()).await.unwrap();
        let always: Predicate = Arc::new(|_| true);
        assert!(res.is_dead(Some(&always), None));
        assert!(res.is_idle(Some(&always), None));
    }

    #[tokio::test]
    async fn test_ping_not_configured() {
        let res = Resource::create(&hooks()).await.unwrap();
        let err = res.ping(None).await.unwrap_err();
        assert!(matches!(err, PoolError::PingNotConfigured));
    }

    #[tokio::test]
    async fn test_create_error_propagates() {
        let failing: Hooks<u32> = Hooks::new(
            || async { Err::<u32, BoxError>("boom".into()) },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        let err = Resource::create(&failing).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
