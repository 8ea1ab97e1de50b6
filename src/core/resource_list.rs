//! Ordered container of resources with a fixed insertion policy.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::resource::{Resource, ResourceId};

/// Insertion policy of a [`ResourceList`].
///
/// Resources are always taken from the front, so `Fifo` appends (queue) and
/// `Lifo` prepends (stack).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// Append on insert; the oldest released resource is handed out first.
    #[default]
    Fifo,
    /// Prepend on insert; the most recently released resource is handed out first.
    Lifo,
}

impl Order {
    /// Policy matching a `fifo` flag.
    pub const fn from_fifo(fifo: bool) -> Self {
        if fifo {
            Self::Fifo
        } else {
            Self::Lifo
        }
    }
}

/// Ordered sequence of resources without duplicates.
#[derive(Debug)]
pub struct ResourceList<T> {
    order: Order,
    items: VecDeque<Resource<T>>,
}

impl<T> ResourceList<T> {
    /// Create an empty list with the given insertion policy.
    pub const fn new(order: Order) -> Self {
        Self {
            order,
            items: VecDeque::new(),
        }
    }

    /// Insertion policy.
    pub const fn order(&self) -> Order {
        self.order
    }

    /// Change the insertion policy for subsequent inserts.
    pub fn set_order(&mut self, order: Order) {
        self.order = order;
    }

    /// Insert per the list's policy. A resource already present is left in place.
    pub fn add(&mut self, resource: Resource<T>) {
        if self.contains_id(resource.id()) {
            return;
        }
        match self.order {
            Order::Fifo => self.items.push_back(resource),
            Order::Lifo => self.items.push_front(resource),
        }
    }

    /// Put a resource back at the front regardless of policy.
    pub(crate) fn unshift(&mut self, resource: Resource<T>) {
        if !self.contains_id(resource.id()) {
            self.items.push_front(resource);
        }
    }

    /// Remove and return the front resource.
    pub fn shift(&mut self) -> Option<Resource<T>> {
        self.items.pop_front()
    }

    /// Remove by identity; `None` if absent.
    pub fn delete(&mut self, id: ResourceId) -> Option<Resource<T>> {
        let pos = self.items.iter().position(|r| r.id() == id)?;
        self.items.remove(pos)
    }

    /// Remove every resource, returning them in list order.
    pub fn clear(&mut self) -> Vec<Resource<T>> {
        self.items.drain(..).collect()
    }

    /// First resource matching the predicate.
    pub fn find_where<F>(&self, mut predicate: F) -> Option<&Resource<T>>
    where
        F: FnMut(&Resource<T>) -> bool,
    {
        self.items.iter().find(|r| predicate(r))
    }

    /// Mutable access by identity.
    pub fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource<T>> {
        self.items.iter_mut().find(|r| r.id() == id)
    }

    /// Whether a resource with this identity is present.
    pub fn contains_id(&self, id: ResourceId) -> bool {
        self.items.iter().any(|r| r.id() == id)
    }

    /// Remove and return every resource matching the predicate.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Resource<T>>
    where
        F: FnMut(&Resource<T>) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for resource in self.items.drain(..) {
            if predicate(&resource) {
                removed.push(resource);
            } else {
                kept.push_back(resource);
            }
        }
        self.items = kept;
        removed
    }

    /// Iterate in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource<T>> {
        self.items.iter()
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: PartialEq> ResourceList<T> {
    /// First resource whose value equals `value`.
    pub fn find_by_value(&self, value: &T) -> Option<&Resource<T>> {
        self.find_where(|r| r.value() == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(list: &ResourceList<u32>) -> Vec<u32> {
        list.iter().map(|r| *r.value()).collect()
    }

    #[test]
    fn test_fifo_appends() {
        let mut list = ResourceList::new(Order::Fifo);
        for v in 1..=3 {
            list.add(Resource::from_value(v));
        }
        assert_eq!(values(&list), vec![1, 2, 3]);
        assert_eq!(*list.shift().unwrap().value(), 1);
    }

    #[test]
    fn test_lifo_prepends() {
        let mut list = ResourceList::new(Order::Lifo);
        for v in 1..=3 {
            list.add(Resource::from_value(v));
        }
        assert_eq!(values(&list), vec![3, 2, 1]);
        assert_eq!(*list.shift().unwrap().value(), 3);
    }

    #[test]
    fn test_no_duplicates() {
        let mut list = ResourceList::new(Order::Fifo);
        let res = Resource::from_value(1);
        list.add(res.clone());
        list.add(res);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_delete_absent_is_noop() {
        let mut list = ResourceList::new(Order::Fifo);
        list.add(Resource::from_value(1));
        let stranger = Resource::from_value(1);
        assert!(list.delete(stranger.id()).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_find_and_remove_where() {
        let mut list = ResourceList::new(Order::Fifo);
        for v in 1..=5 {
            list.add(Resource::from_value(v));
        }
        assert_eq!(*list.find_by_value(&4).unwrap().value(), 4);
        assert!(list.find_by_value(&9).is_none());

        let evens = list.remove_where(|r| r.value() % 2 == 0);
        assert_eq!(evens.len(), 2);
        assert_eq!(values(&list), vec![1, 3, 5]);

        assert_eq!(list.clear().len(), 3);
        assert!(list.is_empty());
    }
}
