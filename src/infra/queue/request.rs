//! Concurrency-limited queue for create/destroy/ping callbacks.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, Semaphore};

/// Shared ceiling on concurrently running lifecycle callbacks.
///
/// Cloning yields a handle to the same ceiling; a cluster hands one clone to
/// every member pool.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    permits: Arc<Semaphore>,
    concurrency: Option<usize>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RequestQueue {
    /// Create a queue running at most `concurrency` callbacks at once, or
    /// unbounded when `None`.
    pub fn new(concurrency: Option<usize>) -> Self {
        let permits = concurrency.map_or(Semaphore::MAX_PERMITS, |n| n.max(1));
        Self {
            permits: Arc::new(Semaphore::new(permits)),
            concurrency,
        }
    }

    /// Configured ceiling.
    pub const fn concurrency(&self) -> Option<usize> {
        self.concurrency
    }

    /// Whether both handles share one ceiling.
    pub fn same_queue(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.permits, &other.permits)
    }

    /// Run `fut` once a slot is free.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // The semaphore is never closed, so acquisition only fails if that changes.
        let _permit = self.permits.acquire().await.ok();
        fut.await
    }
}

/// Counter of in-flight operations with a wait-for-zero primitive.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    settled: Notify,
}

impl InFlight {
    /// Register an operation; the returned guard unregisters it on drop.
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Operations currently running.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Resolve once no operation is running.
    pub async fn settled(&self) {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Unregisters an operation from its [`InFlight`] tracker on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tracker.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.tracker.settled.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrency_ceiling() {
        let queue = RequestQueue::new(Some(2));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let queue = queue.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                queue
                    .run(async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await;
            }
        });
        futures::future::join_all(jobs).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_ceiling() {
        let queue = RequestQueue::new(Some(1));
        assert!(queue.same_queue(&queue.clone()));
        assert!(!queue.same_queue(&RequestQueue::new(Some(1))));
    }

    #[tokio::test]
    async fn test_settled_waits_for_guards() {
        let tracker = Arc::new(InFlight::default());
        tracker.settled().await;

        let guard = tracker.enter();
        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.settled().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(tracker.count(), 0);
    }
}
