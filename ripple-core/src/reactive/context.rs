//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently evaluating.
//! This enables automatic dependency tracking: when a reactive property is
//! read, the current subscriber is registered with that property's
//! dependency set.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a context pushes an entry, and the
//! returned guard pops it when dropped. A stack rather than a single slot
//! lets a subscriber evaluate while another is collecting (a computed value
//! read during a render, or a child component mounted from a parent's patch).
//!
//! An entry may also be empty: [`untracked`] pushes one so that reads inside
//! it are attributed to nobody.

use std::cell::RefCell;
use std::sync::Arc;

use super::dep::{Dep, Reactive};
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The evaluating subscriber, or `None` for an untracked section.
    subscriber: Option<Arc<dyn Reactive>>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the evaluation returns early with
/// an error or panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any reactive property that is read
    /// registers the subscriber as a dependent.
    pub fn enter(subscriber: Arc<dyn Reactive>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some(subscriber),
            });
        });

        Self { subscriber_id }
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { subscriber: None });
        });

        Self { subscriber_id: None }
    }

    /// Check if reads are currently attributed to a subscriber.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref())
                .map(|s| s.subscriber_id())
        })
    }

    /// Nesting depth of the stack, tracked and untracked entries included.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Register the current subscriber with `dep`.
    ///
    /// This is called by reactive reads. Outside of a tracking context it
    /// does nothing.
    pub fn track(dep: &Dep) {
        let current = CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        });

        // The stack borrow is released before calling out.
        if let Some(subscriber) = current {
            subscriber.add_dep(dep);
        }
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.as_ref().map(|s| s.subscriber_id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` with dependency tracking suspended.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Probe {
        id: SubscriberId,
        seen: Mutex<Vec<u64>>,
    }

    impl Probe {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: SubscriberId::new(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl Reactive for Probe {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn add_dep(&self, dep: &Dep) {
            self.seen.lock().push(dep.id().raw());
        }

        fn update(&self) {}
    }

    #[test]
    fn context_tracks_subscriber() {
        let probe = Probe::new();
        let id = probe.id;

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(probe);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn track_records_on_current_subscriber() {
        let probe = Probe::new();
        let dep1 = Dep::new();
        let dep2 = Dep::new();

        // No subscriber, nothing recorded.
        ReactiveContext::track(&dep1);

        {
            let _ctx = ReactiveContext::enter(probe.clone());
            ReactiveContext::track(&dep1);
            ReactiveContext::track(&dep2);
        }

        assert_eq!(*probe.seen.lock(), vec![dep1.id().raw(), dep2.id().raw()]);
    }

    #[test]
    fn nested_contexts() {
        let outer = Probe::new();
        let inner = Probe::new();
        let (id1, id2) = (outer.id, inner.id);

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_hides_outer_subscriber() {
        let probe = Probe::new();
        let dep = Dep::new();

        let _ctx = ReactiveContext::enter(probe.clone());
        untracked(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track(&dep);
        });
        assert!(ReactiveContext::is_active());
        assert!(probe.seen.lock().is_empty());
    }
}
