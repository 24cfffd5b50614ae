//! Module Hooks
//!
//! Modules extend the patch engine: an attribute binder, a class binder,
//! a transition module. Each registers handlers for a fixed set of hook
//! kinds, each kind with its own typed signature, and the engine calls the
//! handlers of a kind in registration order.
//!
//! | Kind | When |
//! |---|---|
//! | `Pre` | once, at the start of a patch |
//! | `Create` | after an element's live node was created |
//! | `Update` | when an element is patched against its previous version |
//! | `Remove` | before an element is detached |
//! | `Destroy` | when a subtree is discarded, children first |
//! | `Post` | once, at the end of a patch |

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::ops::NodeOps;
use super::vnode::VNode;

type PhaseFn = Box<dyn Fn() + Send + Sync>;
type DiffFn<O> = Box<dyn Fn(&O, &VNode<<O as NodeOps>::Node>, &VNode<<O as NodeOps>::Node>) + Send + Sync>;
type RemoveFn<O> = Box<dyn Fn(&VNode<<O as NodeOps>::Node>, RemoveCallback) + Send + Sync>;
type DestroyFn<O> = Box<dyn Fn(&VNode<<O as NodeOps>::Node>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Pre,
    Create,
    Update,
    Remove,
    Destroy,
    Post,
}

/// One hook handler.
///
/// `Create` and `Update` receive `(ops, old, new)`; for `Create` the old
/// node is an empty placeholder. A `Remove` handler must eventually call
/// [`RemoveCallback::done`] on the callback it receives.
pub enum Hook<O: NodeOps> {
    Pre(PhaseFn),
    Create(DiffFn<O>),
    Update(DiffFn<O>),
    Remove(RemoveFn<O>),
    Destroy(DestroyFn<O>),
    Post(PhaseFn),
}

impl<O: NodeOps> Hook<O> {
    /// The registry slot this handler belongs to.
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::Pre(_) => HookKind::Pre,
            Hook::Create(_) => HookKind::Create,
            Hook::Update(_) => HookKind::Update,
            Hook::Remove(_) => HookKind::Remove,
            Hook::Destroy(_) => HookKind::Destroy,
            Hook::Post(_) => HookKind::Post,
        }
    }
}

/// A named set of hook handlers.
pub struct Module<O: NodeOps> {
    name: String,
    hooks: Vec<Hook<O>>,
}

impl<O: NodeOps> Module<O> {
    /// An empty module named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
        }
    }

    /// The name given at construction, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an already boxed handler.
    pub fn with(mut self, hook: Hook<O>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Run at the start of every top-level patch.
    pub fn on_pre(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.with(Hook::Pre(Box::new(f)))
    }

    /// Run for every element or component node created.
    pub fn on_create(self, f: impl Fn(&O, &VNode<O::Node>, &VNode<O::Node>) + Send + Sync + 'static) -> Self {
        self.with(Hook::Create(Box::new(f)))
    }

    /// Run for every node patched in place.
    pub fn on_update(self, f: impl Fn(&O, &VNode<O::Node>, &VNode<O::Node>) + Send + Sync + 'static) -> Self {
        self.with(Hook::Update(Box::new(f)))
    }

    /// Run when an element leaves the tree; detaching waits for the callback.
    pub fn on_remove(self, f: impl Fn(&VNode<O::Node>, RemoveCallback) + Send + Sync + 'static) -> Self {
        self.with(Hook::Remove(Box::new(f)))
    }

    /// Run for every node in a destroyed subtree, children first.
    pub fn on_destroy(self, f: impl Fn(&VNode<O::Node>) + Send + Sync + 'static) -> Self {
        self.with(Hook::Destroy(Box::new(f)))
    }

    /// Run at the end of every top-level patch.
    pub fn on_post(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.with(Hook::Post(Box::new(f)))
    }
}

/// Registered handlers, grouped by kind.
pub struct HookRegistry<O: NodeOps> {
    pre: SmallVec<[PhaseFn; 2]>,
    create: SmallVec<[DiffFn<O>; 4]>,
    update: SmallVec<[DiffFn<O>; 4]>,
    remove: SmallVec<[RemoveFn<O>; 2]>,
    destroy: SmallVec<[DestroyFn<O>; 2]>,
    post: SmallVec<[PhaseFn; 2]>,
}

impl<O: NodeOps> HookRegistry<O> {
    pub fn new() -> Self {
        Self {
            pre: SmallVec::new(),
            create: SmallVec::new(),
            update: SmallVec::new(),
            remove: SmallVec::new(),
            destroy: SmallVec::new(),
            post: SmallVec::new(),
        }
    }

    pub fn from_modules(modules: impl IntoIterator<Item = Module<O>>) -> Self {
        let mut registry = Self::new();
        for module in modules {
            tracing::trace!(module = %module.name, hooks = module.hooks.len(), "registering module");
            for hook in module.hooks {
                registry.register(hook);
            }
        }
        registry
    }

    pub fn register(&mut self, hook: Hook<O>) {
        match hook {
            Hook::Pre(f) => self.pre.push(f),
            Hook::Create(f) => self.create.push(f),
            Hook::Update(f) => self.update.push(f),
            Hook::Remove(f) => self.remove.push(f),
            Hook::Destroy(f) => self.destroy.push(f),
            Hook::Post(f) => self.post.push(f),
        }
    }

    /// Number of handlers registered for `kind`.
    pub fn count(&self, kind: HookKind) -> usize {
        match kind {
            HookKind::Pre => self.pre.len(),
            HookKind::Create => self.create.len(),
            HookKind::Update => self.update.len(),
            HookKind::Remove => self.remove.len(),
            HookKind::Destroy => self.destroy.len(),
            HookKind::Post => self.post.len(),
        }
    }

    pub(crate) fn pre(&self) {
        for f in &self.pre {
            f();
        }
    }

    pub(crate) fn create(&self, ops: &O, empty: &VNode<O::Node>, vnode: &VNode<O::Node>) {
        for f in &self.create {
            f(ops, empty, vnode);
        }
    }

    pub(crate) fn update(&self, ops: &O, old: &VNode<O::Node>, new: &VNode<O::Node>) {
        for f in &self.update {
            f(ops, old, new);
        }
    }

    pub(crate) fn remove(&self, vnode: &VNode<O::Node>, rm: &RemoveCallback) {
        for f in &self.remove {
            f(vnode, rm.clone());
        }
    }

    pub(crate) fn destroy(&self, vnode: &VNode<O::Node>) {
        for f in &self.destroy {
            f(vnode);
        }
    }

    pub(crate) fn post(&self) {
        for f in &self.post {
            f();
        }
    }
}

impl<O: NodeOps> Default for HookRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: NodeOps> fmt::Debug for HookRegistry<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("pre", &self.pre.len())
            .field("create", &self.create.len())
            .field("update", &self.update.len())
            .field("remove", &self.remove.len())
            .field("destroy", &self.destroy.len())
            .field("post", &self.post.len())
            .finish()
    }
}

struct RemoveState {
    listeners: AtomicUsize,
    finish: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// Reference-counted completion callback for removals.
///
/// The node is detached when [`done`](Self::done) has been called once per
/// listener: every remove handler plus the engine (or the node's own remove
/// hook, which then stands in for the engine). Extra calls are ignored.
#[derive(Clone)]
pub struct RemoveCallback {
    inner: Arc<RemoveState>,
}

impl RemoveCallback {
    pub(crate) fn new(listeners: usize, finish: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Arc::new(RemoveState {
                listeners: AtomicUsize::new(listeners),
                finish: Mutex::new(Some(Box::new(finish))),
            }),
        }
    }

    /// Signal that one listener has finished.
    pub fn done(&self) {
        let previous = self
            .inner
            .listeners
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous == Ok(1) {
            let finish = self.inner.finish.lock().take();
            if let Some(finish) = finish {
                finish();
            }
        }
    }

    /// Listeners that have not signalled yet.
    pub fn pending(&self) -> usize {
        self.inner.listeners.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RemoveCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoveCallback")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::MemoryDom;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn remove_callback_fires_after_last_listener() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let rm = RemoveCallback::new(3, move || flag.store(true, Ordering::SeqCst));

        rm.done();
        rm.clone().done();
        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(rm.pending(), 1);

        rm.done();
        assert!(fired.load(Ordering::SeqCst));

        // Extra signals are ignored.
        rm.done();
        assert_eq!(rm.pending(), 0);
    }

    #[test]
    fn registry_groups_by_kind() {
        let module = Module::<MemoryDom>::new("probe")
            .on_pre(|| {})
            .on_create(|_, _, _| {})
            .on_update(|_, _, _| {})
            .on_post(|| {});
        let registry = HookRegistry::from_modules([module, Module::new("empty")]);

        assert_eq!(registry.count(HookKind::Pre), 1);
        assert_eq!(registry.count(HookKind::Create), 1);
        assert_eq!(registry.count(HookKind::Remove), 0);
        assert_eq!(Hook::<MemoryDom>::Post(Box::new(|| {})).kind(), HookKind::Post);
    }
}
