//! Priority queue of pending acquire requests.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::sync::oneshot;

use crate::core::PoolError;

/// Channel half used to hand a resource (or a rejection) to a waiter.
pub type Reply<T> = oneshot::Sender<Result<T, PoolError>>;

/// A caller parked until a resource becomes available.
pub struct Waiter<T> {
    /// Waiter identity, used to withdraw it on timeout.
    pub id: u64,
    /// Higher values are served first.
    pub priority: i32,
    seq: u64,
    /// Reply channel.
    pub reply: Reply<T>,
}

impl<T> PartialEq for Waiter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Waiter<T> {}

impl<T> PartialOrd for Waiter<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Waiter<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first
        match self.priority.cmp(&other.priority) {
            // FIFO within same priority: lower sequence wins (reversed for max-heap)
            Ordering::Equal => other.seq.cmp(&self.seq),
            other => other,
        }
    }
}

/// Waiters ordered by priority, FIFO among equal priorities.
pub struct WaiterQueue<T> {
    waiters: BinaryHeap<Waiter<T>>,
    next_seq: u64,
}

impl<T> Default for WaiterQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WaiterQueue<T> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            waiters: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Enqueue a waiter behind every waiter of equal or higher priority.
    pub fn push(&mut self, id: u64, priority: i32, reply: Reply<T>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.waiters.push(Waiter {
            id,
            priority,
            seq,
            reply,
        });
    }

    /// Dequeue the next waiter to serve.
    pub fn pop(&mut self) -> Option<Waiter<T>> {
        self.waiters.pop()
    }

    /// Withdraw a waiter by identity.
    pub fn remove(&mut self, id: u64) -> Option<Waiter<T>> {
        if !self.waiters.iter().any(|w| w.id == id) {
            return None;
        }
        let mut found = None;
        let rest: Vec<_> = self
            .waiters
            .drain()
            .filter_map(|w| {
                if w.id == id {
                    found = Some(w);
                    None
                } else {
                    Some(w)
                }
            })
            .collect();
        self.waiters = rest.into();
        found
    }

    /// Whether a waiter with this identity is still queued.
    pub fn contains(&self, id: u64) -> bool {
        self.waiters.iter().any(|w| w.id == id)
    }

    /// Remove every waiter.
    pub fn drain(&mut self) -> Vec<Waiter<T>> {
        self.waiters.drain().collect()
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Whether no waiter is queued.
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(q: &mut WaiterQueue<u32>, id: u64, priority: i32) -> oneshot::Receiver<Result<u32, PoolError>> {
        let (tx, rx) = oneshot::channel();
        q.push(id, priority, tx);
        rx
    }

    #[test]
    fn test_priority_ordering() {
        let mut q = WaiterQueue::new();
        let _r1 = push(&mut q, 1, 0);
        let _r2 = push(&mut q, 2, 10);
        let _r3 = push(&mut q, 3, 5);
        let _r4 = push(&mut q, 4, -1);

        assert_eq!(q.pop().unwrap().id, 2);
        assert_eq!(q.pop().unwrap().id, 3);
        assert_eq!(q.pop().unwrap().id, 1);
        assert_eq!(q.pop().unwrap().id, 4);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut q = WaiterQueue::new();
        let _r: Vec<_> = (1..=4).map(|id| push(&mut q, id, 1)).collect();
        let order: Vec<u64> = std::iter::from_fn(|| q.pop().map(|w| w.id)).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut q = WaiterQueue::new();
        let _r: Vec<_> = (1..=4).map(|id| push(&mut q, id, 0)).collect();
        assert!(q.remove(2).is_some());
        assert!(q.remove(2).is_none());
        assert!(!q.contains(2));
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop().unwrap().id, 1);
        assert_eq!(q.pop().unwrap().id, 3);
    }

    #[test]
    fn test_drain_empties() {
        let mut q = WaiterQueue::new();
        let _r1 = push(&mut q, 1, 0);
        let _r2 = push(&mut q, 2, 0);
        assert_eq!(q.drain().len(), 2);
        assert!(q.is_empty());
    }
}
