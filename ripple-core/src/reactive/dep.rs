//! Dependency Sets
//!
//! A [`Dep`] is the registry of subscribers interested in one mutable slot:
//! a reactive property, or the shape of an observed object or array.
//!
//! Dependency sets never own their subscribers. They hold weak references,
//! and subscribers remove themselves explicitly when their dependencies
//! change or when they are torn down.
//!
//! # Notification
//!
//! Notifying collects the live subscribers first and releases the set's lock
//! before calling any of them, so a subscriber reacting synchronously may
//! subscribe or unsubscribe without deadlocking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;
use crate::config;

/// A trait for computations that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Record that the current evaluation read from `dep`.
    fn add_dep(&self, dep: &Dep);

    /// React to a change in one of the dependencies.
    fn update(&self);
}

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct DepInner {
    id: DepId,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

/// The set of subscribers interested in one reactive slot.
///
/// Cloning a `Dep` yields another handle to the same set.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

impl Dep {
    /// Create an empty dependency set with a fresh ID.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DepInner {
                id: DepId::next(),
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// This set's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Add a subscriber. A subscriber is present at most once.
    pub fn add_sub(&self, id: SubscriberId, subscriber: Weak<dyn Reactive>) {
        self.inner.subscribers.lock().entry(id).or_insert(subscriber);
        tracing::trace!(dep = self.id().raw(), subscriber = id.raw(), "subscribed");
    }

    /// Remove a subscriber. Unknown IDs are ignored.
    pub fn remove_sub(&self, id: SubscriberId) {
        self.inner.subscribers.lock().shift_remove(&id);
    }

    /// True if `id` is registered.
    pub fn has_sub(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.lock().contains_key(&id)
    }

    /// Number of registered subscribers, including ones already dropped
    /// but not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Register the currently evaluating subscriber, if any.
    pub fn depend(&self) {
        ReactiveContext::track(self);
    }

    /// Notify every subscriber that the slot changed.
    pub fn notify(&self) {
        let mut subscribers: Vec<Arc<dyn Reactive>> = {
            let mut guard = self.inner.subscribers.lock();
            guard.retain(|_, weak| weak.strong_count() > 0);
            guard.values().filter_map(Weak::upgrade).collect()
        };

        // Flushing synchronously means the queue will not sort them.
        if !config::with(|c| c.async_flush) {
            subscribers.sort_by_key(|s| s.subscriber_id());
        }

        for subscriber in subscribers {
            subscriber.update();
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dep {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Dep {}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
