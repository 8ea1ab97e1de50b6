//! Signal surface of pools and clusters.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::core::error::SharedError;

const EVENT_CAPACITY: usize = 256;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_RELAY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool-{}", self.0)
    }
}

/// Lifecycle signal emitted by a pool and republished by its clusters.
#[derive(Debug, Clone)]
pub enum PoolEvent<T> {
    /// A resource is sitting in the available list.
    Available {
        /// Emitting pool.
        pool: PoolId,
    },
    /// The create callback produced a value.
    Created {
        /// Emitting pool.
        pool: PoolId,
        /// New value.
        value: T,
    },
    /// The create callback failed.
    CreateError {
        /// Emitting pool.
        pool: PoolId,
        /// Underlying failure.
        error: SharedError,
    },
    /// The destroy callback completed.
    Destroyed {
        /// Emitting pool.
        pool: PoolId,
        /// Destroyed value.
        value: T,
    },
    /// The destroy callback failed.
    DestroyError {
        /// Emitting pool.
        pool: PoolId,
        /// Value being destroyed.
        value: T,
        /// Underlying failure.
        error: SharedError,
    },
    /// The ping callback failed.
    PingError {
        /// Emitting pool.
        pool: PoolId,
        /// Pinged value.
        value: T,
        /// Underlying failure.
        error: SharedError,
    },
}

impl<T> PoolEvent<T> {
    /// Pool that emitted the event.
    pub const fn pool(&self) -> PoolId {
        match self {
            Self::Available { pool }
            | Self::Created { pool, .. }
            | Self::CreateError { pool, .. }
            | Self::Destroyed { pool, .. }
            | Self::DestroyError { pool, .. }
            | Self::PingError { pool, .. } => *pool,
        }
    }
}

/// Broadcast channel plus relays that republish onto other buses.
pub struct EventBus<T> {
    sender: broadcast::Sender<PoolEvent<T>>,
    relays: Mutex<HashMap<u64, broadcast::Sender<PoolEvent<T>>>>,
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            relays: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent<T>> {
        self.sender.subscribe()
    }

    /// Sender half, used as a relay target by other buses.
    pub fn sender(&self) -> broadcast::Sender<PoolEvent<T>> {
        self.sender.clone()
    }

    /// Publish to subscribers and every relay. Missing receivers are not an error.
    pub fn emit(&self, event: PoolEvent<T>) {
        for relay in self.relays.lock().values() {
            let _ = relay.send(event.clone());
        }
        let _ = self.sender.send(event);
    }

    /// Republish every event onto `target`; returns a handle for [`Self::detach`].
    pub fn attach(&self, target: broadcast::Sender<PoolEvent<T>>) -> u64 {
        let id = NEXT_RELAY_ID.fetch_add(1, Ordering::Relaxed);
        self.relays.lock().insert(id, target);
        id
    }

    /// Stop republishing onto a previously attached target.
    pub fn detach(&self, relay: u64) -> bool {
        self.relays.lock().remove(&relay).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_republishes_until_detached() {
        let source: EventBus<u32> = EventBus::new();
        let target: EventBus<u32> = EventBus::new();
        let mut direct = source.subscribe();
        let mut relayed = target.subscribe();

        let relay = source.attach(target.sender());
        let pool = PoolId::next();
        source.emit(PoolEvent::Created { pool, value: 3 });

        assert!(matches!(direct.recv().await.unwrap(), PoolEvent::Created { value: 3, .. }));
        let event = relayed.recv().await.unwrap();
        assert_eq!(event.pool(), pool);

        assert!(source.detach(relay));
        source.emit(PoolEvent::Available { pool });
        assert!(direct.recv().await.is_ok());
        assert!(relayed.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus: EventBus<u32> = EventBus::new();
        bus.emit(PoolEvent::Available { pool: PoolId::next() });
    }
}
