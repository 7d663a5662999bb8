// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Listener registry with stable identities

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Identity of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Ordered set of listeners; iteration follows registration order.
pub struct ObserverRegistry<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> ObserverRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Returns `false` when `id` was not registered (already removed).
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.lock().iter().any(|(lid, _)| *lid == id)
    }

    /// Call every listener with `value` in registration order.
    ///
    /// Callbacks run on a copy of the list without the lock held. A listener
    /// removed by an earlier callback in the same round is skipped.
    pub fn notify(&self, value: &T) {
        let round: Vec<(ListenerId, Listener<T>)> = self.listeners.lock().clone();
        for (id, listener) in round {
            if self.contains(id) {
                listener(value);
            }
        }
    }

    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by a subscribe call.
///
/// Dropping the handle keeps the listener registered; call
/// [`Unsubscribe::unsubscribe`] to remove it.
pub struct Unsubscribe<T> {
    registry: Weak<ObserverRegistry<T>>,
    id: ListenerId,
}

impl<T> Unsubscribe<T> {
    pub(crate) fn new(registry: &Arc<ObserverRegistry<T>>, id: ListenerId) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Remove exactly this listener. Later calls are no-ops.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.remove(self.id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let registry: ObserverRegistry<u32> = ObserverRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let seen = seen.clone();
            registry.register(Arc::new(move |v: &u32| seen.lock().push((tag, *v))));
        }
        registry.notify(&7);

        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_unsubscribe_twice() {
        let registry = Arc::new(ObserverRegistry::<u32>::new());
        let id = registry.register(Arc::new(|_: &u32| {}));
        let keep = registry.register(Arc::new(|_: &u32| {}));
        let handle = Unsubscribe::new(&registry, id);

        assert!(handle.unsubscribe());
        assert!(!handle.unsubscribe());
        assert_eq!(registry.len(), 1);
        assert!(!registry.remove(id));
        assert!(registry.remove(keep));
    }

    #[test]
    fn test_removed_mid_round_is_skipped() {
        let registry = Arc::new(ObserverRegistry::<u32>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&registry);
        let first = seen.clone();
        registry.register(Arc::new(move |_: &u32| {
            first.lock().push("clear");
            if let Some(registry) = weak.upgrade() {
                registry.clear();
            }
        }));
        let second = seen.clone();
        registry.register(Arc::new(move |_: &u32| second.lock().push("late")));

        registry.notify(&1);
        assert_eq!(*seen.lock(), vec!["clear"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsubscribe_after_registry_dropped() {
        let registry = Arc::new(ObserverRegistry::<u32>::new());
        let id = registry.register(Arc::new(|_: &u32| {}));
        let handle = Unsubscribe::new(&registry, id);
        drop(registry);
        assert!(!handle.unsubscribe());
    }
}
