//! Computed Values
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computed Values Work
//!
//! 1. The value is not evaluated on creation. It is built on a lazy
//!    subscriber, which starts out dirty.
//!
//! 2. On access, a dirty computed re-evaluates and caches the result. A
//!    clean one returns the cache.
//!
//! 3. When a dependency changes, the lazy subscriber only marks itself
//!    dirty. Computed values that are never read again do no work.
//!
//! 4. A read inside another subscriber's evaluation re-exports the
//!    computed value's dependencies to that subscriber, so the reader
//!    re-runs when the inputs change.

use std::fmt;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use super::value::Value;
use crate::error::Result;

/// A cached derived value.
#[derive(Clone)]
pub struct Computed {
    subscriber: Subscriber,
}

impl Computed {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self::labeled("<computed>", compute)
    }

    pub fn labeled<F>(label: impl Into<String>, compute: F) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            subscriber: Subscriber::new_lazy(compute, label),
        }
    }

    /// Get the current value, recomputing if dirty.
    pub fn get(&self) -> Result<Value> {
        if self.subscriber.is_dirty() {
            self.subscriber.evaluate()?;
        }
        if ReactiveContext::is_active() {
            self.subscriber.depend();
        }
        Ok(self.subscriber.value())
    }

    pub fn is_dirty(&self) -> bool {
        self.subscriber.is_dirty()
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Stop tracking. The cached value stays readable.
    pub fn dispose(&self) {
        self.subscriber.teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.subscriber.id())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
