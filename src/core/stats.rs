//! Live aggregate counters over a set of pools.

use serde::Serialize;

use crate::core::pool::{Pool, PoolValue};

/// Aggregated counters, serializable for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Pools covered.
    pub pools: usize,
    /// Sum of available resources.
    pub available: usize,
    /// Sum of borrowed resources.
    pub borrowed: usize,
    /// Sum of idle resources.
    pub idle: usize,
    /// Sum of pool sizes.
    pub size: usize,
    /// Sum of in-flight creations.
    pub pending: usize,
}

/// Read-only view summing counters across pools.
///
/// Nothing is cached: each accessor reads the member pools at call time, so a
/// long-lived `ClusterStats` keeps reflecting live state.
#[derive(Debug, Clone)]
pub struct ClusterStats<T> {
    pools: Vec<Pool<T>>,
}

impl<T: PoolValue> ClusterStats<T> {
    /// View over `pools`.
    pub const fn new(pools: Vec<Pool<T>>) -> Self {
        Self { pools }
    }

    fn sum(&self, f: impl Fn(&Pool<T>) -> usize) -> usize {
        self.pools.iter().map(f).sum()
    }

    /// Pools covered by this view.
    pub fn pools(&self) -> usize {
        self.pools.len()
    }

    /// Sum of available resources.
    pub fn available(&self) -> usize {
        self.sum(Pool::available)
    }

    /// Sum of borrowed resources.
    pub fn borrowed(&self) -> usize {
        self.sum(Pool::borrowed)
    }

    /// Sum of idle resources.
    pub fn idle(&self) -> usize {
        self.sum(Pool::idle)
    }

    /// Sum of pool sizes.
    pub fn size(&self) -> usize {
        self.sum(Pool::size)
    }

    /// Sum of in-flight creations.
    pub fn pending(&self) -> usize {
        self.sum(Pool::pending)
    }

    /// Capture every counter at once.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pools: self.pools(),
            available: self.available(),
            borrowed: self.borrowed(),
            idle: self.idle(),
            size: self.size(),
            pending: self.pending(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AcquireOptions, BoxError, Hooks, PoolOptions};

    fn pool(min: usize) -> Pool<u64> {
        let hooks = Hooks::new(
            || async { Ok::<_, BoxError>(next_id()) },
            |_v| async { Ok::<_, BoxError>(()) },
        );
        Pool::new(
            hooks,
            PoolOptions {
                min,
                max: 4,
                ..PoolOptions::default()
            },
        )
        .unwrap()
    }

    fn next_id() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);
        NEXT.fetch_add(1, Ordering::Relaxed)
    }

    #[tokio::test]
    async fn test_stats_track_live_state() {
        let a = pool(2);
        let b = pool(1);
        a.open().await.unwrap();
        b.open().await.unwrap();

        let stats = ClusterStats::new(vec![a.clone(), b.clone()]);
        assert_eq!(stats.size(), 3);
        assert_eq!(stats.available(), 3);

        let value = a.acquire(AcquireOptions::new()).await.unwrap();
        assert_eq!(stats.available(), 2);
        assert_eq!(stats.borrowed(), 1);

        a.release(&value).unwrap();
        let snap = stats.snapshot();
        assert_eq!(snap.available, 3);
        assert_eq!(snap.borrowed, 0);
        assert_eq!(snap.pools, 2);
    }

    #[test]
    fn test_empty_view() {
        let stats: ClusterStats<u64> = ClusterStats::new(Vec::new());
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
