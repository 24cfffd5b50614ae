//! Subscriber Implementation
//!
//! A Subscriber is a re-evaluatable computation that tracks its own
//! dependencies: a component render, a computed value, or a user watch.
//!
//! # How Subscribers Work
//!
//! 1. Evaluation pushes the subscriber onto the tracking stack and runs its
//!    function. Every reactive read records the read slot's dependency set
//!    into the subscriber's *new* dependency list, subscribing on first sight.
//!
//! 2. After evaluation the new list becomes the current one. Dependency sets
//!    that were not read this time are unsubscribed from, so a branch that
//!    stopped being taken stops causing re-runs.
//!
//! 3. When a dependency changes, [`Reactive::update`] decides what happens:
//!    lazy subscribers only mark themselves dirty, synchronous ones re-run
//!    on the spot, everything else is queued with the scheduler.
//!
//! 4. [`Subscriber::run`] re-evaluates and invokes the reaction callback
//!    with `(new, old)` when the value changed. Containers and deep
//!    subscribers always count as changed, since a mutation keeps identity.
//!
//! # Errors
//!
//! User subscribers report evaluation and callback errors through
//! [`config::handle_error`] and keep going. All other subscribers return
//! them to the caller.
//!
//! # Ownership
//!
//! Dependency sets only hold weak references. A subscriber lives as long as
//! some [`Subscriber`] handle does; dropping the last one unsubscribes it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::{untracked, ReactiveContext};
use super::dep::{Dep, DepId, Reactive};
use super::path::Path;
use super::traverse::traverse;
use super::value::Value;
use crate::config;
use crate::error::{Error, Result};
use crate::scheduler;

/// Unique identifier for a subscriber.
///
/// IDs increase monotonically in creation order. The scheduler relies on
/// this: parents are created before their children, so sorting by ID runs
/// parent renders first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The evaluation function of a subscriber.
pub type Getter = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// A reaction callback, called with `(new, old)`.
pub type Callback = Arc<dyn Fn(&Value, &Value) -> Result<()> + Send + Sync>;

/// A call-out run around scheduled re-runs, and by component lifecycles.
pub type LifecycleHook = Arc<dyn Fn() + Send + Sync>;

/// Construction options.
#[derive(Clone, Default)]
pub struct SubscriberOptions {
    /// Read every nested property of the value after each evaluation.
    pub deep: bool,
    /// Do not evaluate until asked; changes only mark the subscriber dirty.
    pub lazy: bool,
    /// Re-run immediately on change instead of queueing.
    pub sync: bool,
    /// Report errors instead of returning them.
    pub user: bool,
    /// Called right before each scheduled re-run.
    pub before: Option<LifecycleHook>,
    /// Called right after each scheduled re-run.
    pub after: Option<LifecycleHook>,
    /// Name used in logs and error messages.
    pub label: Option<String>,
}

impl SubscriberOptions {
    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn user(mut self, user: bool) -> Self {
        self.user = user;
        self
    }

    pub fn before(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn after(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Debug for SubscriberOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberOptions")
            .field("deep", &self.deep)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("user", &self.user)
            .field("label", &self.label)
            .finish()
    }
}

struct State {
    value: Value,
    dirty: bool,
    active: bool,
    deps: IndexMap<DepId, Dep>,
    new_deps: IndexMap<DepId, Dep>,
}

struct SubscriberInner {
    id: SubscriberId,
    expression: String,
    getter: Getter,
    callback: Option<Callback>,
    options: SubscriberOptions,
    this: Weak<SubscriberInner>,
    state: Mutex<State>,
}

impl Reactive for SubscriberInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        let subscribe = {
            let mut state = self.state.lock();
            if state.new_deps.contains_key(&id) {
                return;
            }
            state.new_deps.insert(id, dep.clone());
            !state.deps.contains_key(&id)
        };

        if subscribe {
            let weak: Weak<dyn Reactive> = self.this.clone();
            dep.add_sub(self.id, weak);
        }
    }

    fn update(&self) {
        let Some(inner) = self.this.upgrade() else {
            return;
        };
        let subscriber = Subscriber { inner };

        if self.options.lazy {
            self.state.lock().dirty = true;
        } else if self.options.sync {
            if let Err(err) = subscriber.run() {
                config::handle_error(&err, &format!("synchronous run of \"{}\"", self.expression));
            }
        } else {
            scheduler::enqueue(subscriber);
        }
    }
}

impl Drop for SubscriberInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for dep in state.deps.values().chain(state.new_deps.values()) {
            dep.remove_sub(self.id);
        }
    }
}

/// A re-evaluatable computation with automatically tracked dependencies.
///
/// Cloning yields another handle to the same subscriber.
#[derive(Clone)]
pub struct Subscriber {
    inner: Arc<SubscriberInner>,
}

impl Subscriber {
    /// Create a subscriber from an evaluation function.
    ///
    /// Unless `lazy` is set the function runs immediately to establish the
    /// initial dependencies. A failing first evaluation is returned as an
    /// error for non-user subscribers.
    pub fn new<F>(getter: F, callback: Option<Callback>, options: SubscriberOptions) -> Result<Self>
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        let expression = options
            .label
            .clone()
            .unwrap_or_else(|| "<anonymous>".to_string());
        Self::build(Arc::new(getter), expression, callback, options)
    }

    /// Create a subscriber that watches a dotted path under `root`.
    ///
    /// An invalid path is reported as a warning and the subscriber evaluates
    /// to `Null`.
    pub fn for_path(
        root: &Value,
        path: &str,
        callback: Option<Callback>,
        options: SubscriberOptions,
    ) -> Result<Self> {
        let getter: Getter = match Path::parse(path) {
            Ok(parsed) => {
                let root = root.clone();
                Arc::new(move || Ok(parsed.resolve(&root)))
            }
            Err(err) => {
                config::warn(&err.to_string());
                Arc::new(|| Ok(Value::Null))
            }
        };
        let expression = options.label.clone().unwrap_or_else(|| path.to_string());
        Self::build(getter, expression, callback, options)
    }

    /// Create a lazy subscriber. It stays dirty until [`evaluate`](Self::evaluate).
    pub fn new_lazy<F>(getter: F, label: impl Into<String>) -> Self
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        let options = SubscriberOptions::default().lazy(true);
        Self::allocate(Arc::new(getter), label.into(), None, options)
    }

    fn build(
        getter: Getter,
        expression: String,
        callback: Option<Callback>,
        options: SubscriberOptions,
    ) -> Result<Self> {
        let lazy = options.lazy;
        let subscriber = Self::allocate(getter, expression, callback, options);

        if !lazy {
            let value = subscriber.get()?;
            subscriber.inner.state.lock().value = value;
        }
        Ok(subscriber)
    }

    fn allocate(
        getter: Getter,
        expression: String,
        callback: Option<Callback>,
        options: SubscriberOptions,
    ) -> Self {
        let lazy = options.lazy;
        let inner = Arc::new_cyclic(|this| SubscriberInner {
            id: SubscriberId::new(),
            expression,
            getter,
            callback,
            options,
            this: this.clone(),
            state: Mutex::new(State {
                value: Value::Null,
                dirty: lazy,
                active: true,
                deps: IndexMap::new(),
                new_deps: IndexMap::new(),
            }),
        });
        let subscriber = Self { inner };

        tracing::trace!(
            subscriber = subscriber.id().raw(),
            expression = %subscriber.inner.expression,
            "subscriber created"
        );
        subscriber
    }

    /// Evaluate the function and re-collect dependencies.
    fn get(&self) -> Result<Value> {
        let result = {
            let _ctx = ReactiveContext::enter(self.inner.clone());
            let result = (self.inner.getter)();
            if let (Ok(value), true) = (&result, self.inner.options.deep) {
                traverse(value);
            }
            result
        };
        self.cleanup_deps();

        match result {
            Err(err) if self.inner.options.user => {
                config::handle_error(&err, &format!("getter for watcher \"{}\"", self.inner.expression));
                Ok(Value::Null)
            }
            other => other,
        }
    }

    /// Swap the new dependency list in and unsubscribe from stale sets.
    fn cleanup_deps(&self) {
        let stale: Vec<Dep> = {
            let mut state = self.inner.state.lock();
            let fresh = std::mem::take(&mut state.new_deps);
            let old = std::mem::replace(&mut state.deps, fresh);
            old.into_iter()
                .filter(|(id, _)| !state.deps.contains_key(id))
                .map(|(_, dep)| dep)
                .collect()
        };

        for dep in stale {
            dep.remove_sub(self.inner.id);
        }
    }

    /// Re-evaluate and, if the value changed, invoke the callback.
    ///
    /// Does nothing once torn down.
    pub fn run(&self) -> Result<()> {
        if !self.is_active() {
            return Ok(());
        }

        let value = self.get()?;
        let old = {
            let mut state = self.inner.state.lock();
            let changed =
                !Value::same(&value, &state.value) || value.is_container() || self.inner.options.deep;
            if !changed {
                return Ok(());
            }
            std::mem::replace(&mut state.value, value.clone())
        };

        match &self.inner.callback {
            Some(callback) => self.invoke_callback(callback, &value, &old),
            None => Ok(()),
        }
    }

    fn invoke_callback(&self, callback: &Callback, new: &Value, old: &Value) -> Result<()> {
        match untracked(|| callback(new, old)) {
            Err(err) if self.inner.options.user => {
                let err = Error::Callback {
                    expression: self.inner.expression.clone(),
                    message: err.to_string(),
                };
                config::handle_error(&err, "callback for watcher");
                Ok(())
            }
            other => other,
        }
    }

    /// Evaluate a lazy subscriber and clear its dirty flag.
    pub fn evaluate(&self) -> Result<()> {
        let value = self.get()?;
        let mut state = self.inner.state.lock();
        state.value = value;
        state.dirty = false;
        Ok(())
    }

    /// Register all of this subscriber's dependencies with the currently
    /// evaluating subscriber.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.inner.state.lock().deps.values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// Unsubscribe from every dependency set and stop reacting.
    ///
    /// A run already queued becomes a no-op.
    pub fn teardown(&self) {
        let deps = {
            let mut state = self.inner.state.lock();
            if !state.active {
                return;
            }
            state.active = false;
            let mut deps = std::mem::take(&mut state.deps);
            deps.extend(std::mem::take(&mut state.new_deps));
            deps
        };

        for dep in deps.values() {
            dep.remove_sub(self.inner.id);
        }
        tracing::trace!(subscriber = self.id().raw(), "subscriber torn down");
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The last evaluated value. Untracked.
    pub fn value(&self) -> Value {
        self.inner.state.lock().value.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.options.lazy
    }

    pub fn is_user(&self) -> bool {
        self.inner.options.user
    }

    /// Number of dependency sets this subscriber is subscribed to.
    pub fn dep_count(&self) -> usize {
        self.inner.state.lock().deps.len()
    }

    pub fn ptr_eq(&self, other: &Subscriber) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn call_before(&self) {
        if let Some(hook) = &self.inner.options.before {
            untracked(|| hook());
        }
    }

    pub(crate) fn call_after(&self) {
        if let Some(hook) = &self.inner.options.after {
            untracked(|| hook());
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subscriber")
            .field("id", &self.inner.id)
            .field("expression", &self.inner.expression)
            .field("active", &state.active)
            .field("dirty", &state.dirty)
            .field("dep_count", &state.deps.len())
            .finish()
    }
}

/// Options for [`watch`] and [`watch_path`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub deep: bool,
    pub sync: bool,
    /// Invoke the callback once at registration with `(value, Null)`.
    pub immediate: bool,
}

impl WatchOptions {
    fn subscriber_options(self) -> SubscriberOptions {
        SubscriberOptions::default()
            .deep(self.deep)
            .sync(self.sync)
            .user(true)
    }
}

/// Watch the value produced by `getter`.
///
/// The returned handle keeps the watch alive.
pub fn watch<G, C>(getter: G, callback: C, options: WatchOptions) -> Result<Subscriber>
where
    G: Fn() -> Result<Value> + Send + Sync + 'static,
    C: Fn(&Value, &Value) -> Result<()> + Send + Sync + 'static,
{
    let callback: Callback = Arc::new(callback);
    let subscriber = Subscriber::new(getter, Some(callback.clone()), options.subscriber_options())?;
    if options.immediate {
        subscriber.invoke_callback(&callback, &subscriber.value(), &Value::Null)?;
    }
    Ok(subscriber)
}

/// Watch a dotted path under `root`.
pub fn watch_path<C>(root: &Value, path: &str, callback: C, options: WatchOptions) -> Result<Subscriber>
where
    C: Fn(&Value, &Value) -> Result<()> + Send + Sync + 'static,
{
    let callback: Callback = Arc::new(callback);
    let subscriber =
        Subscriber::for_path(root, path, Some(callback.clone()), options.subscriber_options())?;
    if options.immediate {
        subscriber.invoke_callback(&callback, &subscriber.value(), &Value::Null)?;
    }
    Ok(subscriber)
}
