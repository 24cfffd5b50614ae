//! Component Render Loop
//!
//! A component ties reactive root data to a render function. Mounting it
//! creates one render subscriber whose evaluation renders a fresh virtual
//! tree and patches it against the last committed one.
//!
//! # How the Render Loop Works
//!
//! 1. [`Component::new`] observes the root data and marks it as component
//!    root data, so reactive `set`/`del` on it are refused.
//!
//! 2. [`mount_component_render_loop`] runs `before_mount`, then creates the
//!    render subscriber. Its first evaluation renders and patches (or creates
//!    a detached tree when no live node is given), recording every property
//!    the render read.
//!
//! 3. A write to any of those properties queues the subscriber. The flush
//!    calls `before_update`, re-renders, patches, then calls `updated`.
//!    Render subscribers are created before the children they render, so a
//!    parent always re-renders before its children within a flush.
//!
//! 4. [`Component::destroy`] tears down every subscriber the component owns
//!    and runs the destroy hooks of its committed tree. Detaching the live
//!    root is left to the parent, or to the host for a root component.
//!
//! # Static Subtrees
//!
//! Subtrees that never depend on state are built by static builders. Each
//! builder runs at most once per component; later renders return the same
//! shared node, and the patcher skips it by identity.
//!
//! # Child Components
//!
//! [`RenderContext::component`] emits a placeholder node carrying a
//! [`ChildComponent`] host. The patcher asks the host to mount the child on
//! creation and to hand the instance over on update. Props live in a
//! reactive object owned by the instance; the parent's update assigns new
//! prop values into it, which queues the child's own render.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::reactive::{
    define_reactive, observe_root, release_root, should_observe, toggle_observing, untracked, watch,
    watch_path, LifecycleHook, Object, Subscriber, SubscriberOptions, Value, WatchOptions,
};
use crate::scheduler;
use crate::vdom::{ComponentHost, Key, NodeOps, PatchTarget, Patcher, VNode, VNodeRef};

/// Renders the component's current state into a virtual tree.
pub type RenderFn<O> =
    Arc<dyn Fn(&RenderContext<'_, O>) -> Result<VNodeRef<<O as NodeOps>::Node>> + Send + Sync>;

/// Builds a subtree that does not depend on state.
pub type StaticRenderFn<O> = Arc<dyn Fn() -> VNodeRef<<O as NodeOps>::Node> + Send + Sync>;

/// Builds the options of a child component from its props.
pub type ComponentFactory<O> = Arc<dyn Fn(&Object) -> ComponentOptions<O> + Send + Sync>;

/// Lifecycle call-out points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeDestroy,
    Destroyed,
}

/// Everything needed to create a [`Component`].
pub struct ComponentOptions<O: NodeOps> {
    name: String,
    data: Value,
    render: RenderFn<O>,
    static_render_fns: Vec<StaticRenderFn<O>>,
    hooks: Vec<(Lifecycle, LifecycleHook)>,
}

impl<O: NodeOps> ComponentOptions<O> {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_, O>) -> Result<VNodeRef<O::Node>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            data: Value::Object(Object::new()),
            render: Arc::new(render),
            static_render_fns: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Root data. Converted to reactive data when the component is created.
    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    /// Append a static builder; its index is the one passed to
    /// [`RenderContext::static_tree`].
    pub fn static_render(mut self, build: impl Fn() -> VNodeRef<O::Node> + Send + Sync + 'static) -> Self {
        self.static_render_fns.push(Arc::new(build));
        self
    }

    pub fn hook(mut self, lifecycle: Lifecycle, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.push((lifecycle, Arc::new(hook)));
        self
    }
}

impl<O: NodeOps> fmt::Debug for ComponentOptions<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentOptions")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("static_render_fns", &self.static_render_fns.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

struct ComponentState<N> {
    vnode: Option<VNodeRef<N>>,
    el: Option<N>,
    render_subscriber: Option<Subscriber>,
    watchers: Vec<Subscriber>,
    mounted: bool,
    being_destroyed: bool,
    destroyed: bool,
    patch_count: usize,
}

struct ComponentInner<O: NodeOps> {
    name: String,
    data: Value,
    render: RenderFn<O>,
    static_render_fns: Vec<StaticRenderFn<O>>,
    static_trees: Mutex<Vec<Option<VNodeRef<O::Node>>>>,
    hooks: Vec<(Lifecycle, LifecycleHook)>,
    patcher: Arc<Patcher<O>>,
    state: Mutex<ComponentState<O::Node>>,
}

impl<O: NodeOps> ComponentInner<O> {
    fn call_hook(&self, lifecycle: Lifecycle) {
        for (_, hook) in self.hooks.iter().filter(|(l, _)| *l == lifecycle) {
            untracked(|| hook());
        }
    }

    /// Mounted and not being torn down.
    fn is_live(&self) -> bool {
        let state = self.state.lock();
        state.mounted && !state.being_destroyed && !state.destroyed
    }

    /// Render, then patch against the committed tree.
    fn update(self: &Arc<Self>) -> Result<()> {
        let vnode = (self.render)(&RenderContext { component: self })?;
        let (previous, el) = {
            let state = self.state.lock();
            (state.vnode.clone(), state.el.clone())
        };

        let result = untracked(|| match (&previous, el) {
            (Some(previous), _) => self.patcher.patch(PatchTarget::Tree(previous.clone()), &vnode),
            (None, Some(el)) => self.patcher.patch(PatchTarget::Live(el), &vnode),
            (None, None) => self.patcher.create_root(&vnode),
        });
        let elm = match result {
            Ok(elm) => elm,
            Err(err) => {
                self.discard_tree(previous.as_ref(), &vnode);
                return Err(err);
            }
        };

        let mut state = self.state.lock();
        state.vnode = Some(vnode);
        state.el = Some(elm);
        state.patch_count += 1;
        Ok(())
    }

    /// Forget the trees of a failed patch.
    ///
    /// The live tree may hold part of the new render, so neither tree
    /// describes it any more. Both are destroyed, which tears down every
    /// child instance whichever host holds it, and the next render rebuilds
    /// from the live root.
    fn discard_tree(&self, previous: Option<&VNodeRef<O::Node>>, partial: &VNodeRef<O::Node>) {
        let root = previous.and_then(|tree| tree.elm());
        untracked(|| {
            if let Some(previous) = previous {
                self.patcher.destroy_tree(previous);
            }
            self.patcher.destroy_tree(partial);
        });

        let mut state = self.state.lock();
        state.vnode = None;
        if root.is_some() {
            state.el = root;
        }
        tracing::warn!(component = %self.name, "patch failed, committed tree discarded");
    }
}

/// A component instance. Cloning shares the instance.
pub struct Component<O: NodeOps> {
    inner: Arc<ComponentInner<O>>,
}

impl<O: NodeOps> Clone for Component<O> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<O: NodeOps> Component<O> {
    pub fn new(options: ComponentOptions<O>, patcher: Arc<Patcher<O>>) -> Self {
        observe_root(&options.data);
        let static_trees = vec![None; options.static_render_fns.len()];
        Self {
            inner: Arc::new(ComponentInner {
                name: options.name,
                data: options.data,
                render: options.render,
                static_render_fns: options.static_render_fns,
                static_trees: Mutex::new(static_trees),
                hooks: options.hooks,
                patcher,
                state: Mutex::new(ComponentState {
                    vnode: None,
                    el: None,
                    render_subscriber: None,
                    watchers: Vec::new(),
                    mounted: false,
                    being_destroyed: false,
                    destroyed: false,
                    patch_count: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The reactive root data.
    pub fn data(&self) -> &Value {
        &self.inner.data
    }

    /// The live root, once mounted.
    pub fn el(&self) -> Option<O::Node> {
        let (vnode, el) = {
            let state = self.inner.state.lock();
            (state.vnode.clone(), state.el.clone())
        };
        vnode.and_then(|vnode| vnode.elm()).or(el)
    }

    /// The last committed virtual tree.
    pub fn vnode(&self) -> Option<VNodeRef<O::Node>> {
        self.inner.state.lock().vnode.clone()
    }

    pub fn render_subscriber(&self) -> Option<Subscriber> {
        self.inner.state.lock().render_subscriber.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.state.lock().mounted
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.state.lock().destroyed
    }

    /// Number of render-and-patch passes so far.
    pub fn patch_count(&self) -> usize {
        self.inner.state.lock().patch_count
    }

    /// Watch a dotted path under the root data. The watch lives until the
    /// component is destroyed.
    pub fn watch<C>(&self, path: &str, callback: C, options: WatchOptions) -> Result<Subscriber>
    where
        C: Fn(&Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        let subscriber = watch_path(&self.inner.data, path, callback, options)?;
        self.adopt(subscriber)
    }

    /// Watch the value produced by `getter`. The watch lives until the
    /// component is destroyed.
    pub fn watch_fn<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> Result<Subscriber>
    where
        G: Fn() -> Result<Value> + Send + Sync + 'static,
        C: Fn(&Value, &Value) -> Result<()> + Send + Sync + 'static,
    {
        let subscriber = watch(getter, callback, options)?;
        self.adopt(subscriber)
    }

    fn adopt(&self, subscriber: Subscriber) -> Result<Subscriber> {
        let mut state = self.inner.state.lock();
        if state.destroyed || state.being_destroyed {
            drop(state);
            subscriber.teardown();
            return Err(Error::ComponentDestroyed(self.inner.name.clone()));
        }
        state.watchers.push(subscriber.clone());
        Ok(subscriber)
    }

    /// Queue a re-render even though no dependency changed.
    pub fn force_update(&self) {
        let subscriber = self.inner.state.lock().render_subscriber.clone();
        if let Some(subscriber) = subscriber {
            scheduler::enqueue(subscriber);
        }
    }

    /// Tear the component down. Calling it again does nothing.
    pub fn destroy(&self) {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock();
            if state.being_destroyed || state.destroyed {
                return;
            }
            state.being_destroyed = true;
        }
        inner.call_hook(Lifecycle::BeforeDestroy);

        let (render, watchers, vnode) = {
            let mut state = inner.state.lock();
            (
                state.render_subscriber.take(),
                std::mem::take(&mut state.watchers),
                state.vnode.clone(),
            )
        };
        if let Some(render) = render {
            render.teardown();
        }
        for watcher in watchers {
            watcher.teardown();
        }
        if let Some(vnode) = vnode {
            inner.patcher.destroy_tree(&vnode);
        }
        release_root(&inner.data);

        inner.state.lock().destroyed = true;
        inner.call_hook(Lifecycle::Destroyed);
        tracing::debug!(component = %inner.name, "component destroyed");
    }
}

impl<O: NodeOps> fmt::Debug for Component<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Component")
            .field("name", &self.inner.name)
            .field("el", &state.el)
            .field("mounted", &state.mounted)
            .field("destroyed", &state.destroyed)
            .field("patch_count", &state.patch_count)
            .field("watchers", &state.watchers.len())
            .finish()
    }
}

/// Create the render subscriber of `component` and perform the first render.
///
/// With `el` the first patch replaces that live node; without it the tree
/// is created detached. Returns the live root. A failing first render is
/// returned as an error.
pub fn mount_component_render_loop<O: NodeOps>(component: &Component<O>, el: Option<O::Node>) -> Result<O::Node> {
    let inner = &component.inner;
    {
        let mut state = inner.state.lock();
        if state.destroyed || state.being_destroyed {
            return Err(Error::ComponentDestroyed(inner.name.clone()));
        }
        if state.render_subscriber.is_some() {
            return state.el.clone().ok_or(Error::MissingLiveNode("component root"));
        }
        state.el = el;
    }
    inner.call_hook(Lifecycle::BeforeMount);

    let render = Arc::downgrade(inner);
    let before = Arc::downgrade(inner);
    let after = Arc::downgrade(inner);
    let options = SubscriberOptions::default()
        .label(format!("render <{}>", inner.name))
        .before(move || lifecycle_if_live(&before, Lifecycle::BeforeUpdate))
        .after(move || lifecycle_if_live(&after, Lifecycle::Updated));

    let subscriber = Subscriber::new(
        move || {
            if let Some(inner) = render.upgrade() {
                inner.update()?;
            }
            Ok(Value::Null)
        },
        None,
        options,
    )?;

    let el = {
        let mut state = inner.state.lock();
        state.render_subscriber = Some(subscriber);
        state.mounted = true;
        state.el.clone()
    };
    inner.call_hook(Lifecycle::Mounted);
    tracing::debug!(component = %inner.name, "component mounted");
    el.ok_or(Error::MissingLiveNode("component root"))
}

fn lifecycle_if_live<O: NodeOps>(inner: &Weak<ComponentInner<O>>, lifecycle: Lifecycle) {
    if let Some(inner) = inner.upgrade() {
        if inner.is_live() {
            inner.call_hook(lifecycle);
        }
    }
}

/// What a render function sees.
pub struct RenderContext<'a, O: NodeOps> {
    component: &'a Arc<ComponentInner<O>>,
}

impl<'a, O: NodeOps> RenderContext<'a, O> {
    pub fn name(&self) -> &str {
        &self.component.name
    }

    pub fn data(&self) -> &Value {
        &self.component.data
    }

    /// Tracked read of a root data property. Missing keys read as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.component
            .data
            .as_object()
            .and_then(|data| data.get(key))
            .unwrap_or(Value::Null)
    }

    /// The static subtree at `index`, built on first use and shared after.
    pub fn static_tree(&self, index: usize) -> Option<VNodeRef<O::Node>> {
        let inner = self.component;
        if let Some(tree) = inner.static_trees.lock().get(index).cloned().flatten() {
            return Some(tree);
        }

        let build = inner.static_render_fns.get(index)?.clone();
        let tree = untracked(|| build());
        if let Some(slot) = inner.static_trees.lock().get_mut(index) {
            *slot = Some(tree.clone());
        }
        Some(tree)
    }

    /// A child component placeholder.
    pub fn component<K, V, F>(
        &self,
        tag: &str,
        key: Option<Key>,
        props: impl IntoIterator<Item = (K, V)>,
        factory: F,
    ) -> VNodeRef<O::Node>
    where
        K: Into<String>,
        V: Into<Value>,
        F: Fn(&Object) -> ComponentOptions<O> + Send + Sync + 'static,
    {
        let host = ChildComponent::new(
            self.component.patcher.clone(),
            props.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            Arc::new(factory),
        );
        VNode::component(tag, key, Arc::new(host))
    }
}

struct ChildInstance<O: NodeOps> {
    component: Component<O>,
    props: Object,
}

/// Host for a child component placeholder.
pub struct ChildComponent<O: NodeOps> {
    patcher: Arc<Patcher<O>>,
    props: Vec<(String, Value)>,
    factory: ComponentFactory<O>,
    instance: Mutex<Option<ChildInstance<O>>>,
}

impl<O: NodeOps> ChildComponent<O> {
    pub fn new(patcher: Arc<Patcher<O>>, props: Vec<(String, Value)>, factory: ComponentFactory<O>) -> Self {
        Self {
            patcher,
            props,
            factory,
            instance: Mutex::new(None),
        }
    }

    /// The mounted instance, if this host currently owns it.
    pub fn instance(&self) -> Option<Component<O>> {
        self.instance.lock().as_ref().map(|i| i.component.clone())
    }
}

impl<O: NodeOps> ComponentHost<O::Node> for ChildComponent<O> {
    fn mount(&self, _vnode: &VNode<O::Node>) -> Result<O::Node> {
        // Prop values stay as the parent passed them.
        let props = Object::new();
        let observing = should_observe();
        toggle_observing(false);
        for (key, value) in &self.props {
            define_reactive(&props, key, value.clone());
        }
        toggle_observing(observing);

        let component = Component::new((self.factory)(&props), self.patcher.clone());
        let elm = mount_component_render_loop(&component, None)?;
        *self.instance.lock() = Some(ChildInstance { component, props });
        Ok(elm)
    }

    fn prepatch(&self, old: &VNode<O::Node>, _new: &VNode<O::Node>) {
        let Some(previous) = old
            .component_host()
            .and_then(|host| host.as_any().downcast_ref::<ChildComponent<O>>())
        else {
            return;
        };
        if std::ptr::eq(previous, self) {
            return;
        }

        let taken = previous.instance.lock().take();
        let Some(instance) = taken else {
            return;
        };
        for (key, value) in &self.props {
            instance.props.assign(key, value.clone());
        }
        *self.instance.lock() = Some(instance);
    }

    fn destroy(&self, _vnode: &VNode<O::Node>) {
        let taken = self.instance.lock().take();
        if let Some(instance) = taken {
            instance.component.destroy();
        }
    }

    fn root(&self) -> Option<O::Node> {
        let component = self.instance.lock().as_ref().map(|i| i.component.clone())?;
        component.el()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::set;
    use crate::scheduler::run_tick;
    use crate::vdom::{attributes_module, MemoryDom, NodeHandle};

    type Node = VNode<NodeHandle>;

    fn patcher() -> (Arc<MemoryDom>, Arc<Patcher<MemoryDom>>) {
        let dom = Arc::new(MemoryDom::new());
        let patcher = Arc::new(Patcher::new(dom.clone(), [attributes_module()]));
        (dom, patcher)
    }

    fn counter() -> ComponentOptions<MemoryDom> {
        ComponentOptions::new("counter", |cx: &RenderContext<'_, MemoryDom>| {
            let count = cx.get("count").as_f64().unwrap_or_default();
            Ok(Node::element("p").text(format!("count: {count}")).build())
        })
        .data(serde_json::json!({ "count": 0 }))
    }

    #[test]
    fn renders_and_rerenders_once_per_tick() {
        let (dom, patcher) = patcher();
        let body = dom.root("body");
        let placeholder = dom.root("div");
        dom.attach(body, placeholder);

        let component = Component::new(counter(), patcher);
        let root = mount_component_render_loop(&component, Some(placeholder)).unwrap();
        assert_eq!(dom.to_html(body), "<body><p>count: 0</p></body>");
        assert_eq!(component.patch_count(), 1);

        let data = component.data().as_object().unwrap().clone();
        data.assign("count", 1);
        data.assign("count", 2);
        run_tick().unwrap();

        assert_eq!(dom.text_content(root), "count: 2");
        assert_eq!(component.patch_count(), 2);
    }

    #[test]
    fn lifecycle_order() {
        let (_, patcher) = patcher();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut options = counter();
        for lifecycle in [
            Lifecycle::BeforeMount,
            Lifecycle::Mounted,
            Lifecycle::BeforeUpdate,
            Lifecycle::Updated,
            Lifecycle::BeforeDestroy,
            Lifecycle::Destroyed,
        ] {
            let log = log.clone();
            options = options.hook(lifecycle, move || log.lock().push(lifecycle));
        }

        let component = Component::new(options, patcher);
        mount_component_render_loop(&component, None).unwrap();
        component.data().as_object().unwrap().assign("count", 5);
        run_tick().unwrap();
        component.destroy();
        component.destroy();

        assert_eq!(
            *log.lock(),
            vec![
                Lifecycle::BeforeMount,
                Lifecycle::Mounted,
                Lifecycle::BeforeUpdate,
                Lifecycle::Updated,
                Lifecycle::BeforeDestroy,
                Lifecycle::Destroyed,
            ]
        );
        assert!(component.is_destroyed());
    }

    #[test]
    fn destroyed_component_stops_rendering() {
        let (_, patcher) = patcher();
        let component = Component::new(counter(), patcher);
        mount_component_render_loop(&component, None).unwrap();
        let render = component.render_subscriber().unwrap();

        component.destroy();
        component.data().as_object().unwrap().assign("count", 3);
        run_tick().unwrap();

        assert!(!render.is_active());
        assert_eq!(component.patch_count(), 1);
        assert!(matches!(
            mount_component_render_loop(&component, None),
            Err(Error::ComponentDestroyed(_))
        ));
    }

    #[test]
    fn root_data_refuses_reactive_set() {
        let (_, patcher) = patcher();
        let component = Component::new(counter(), patcher);
        set(component.data(), "extra", 1);
        assert!(!component.data().as_object().unwrap().contains_key("extra"));
    }

    #[test]
    fn static_tree_is_built_once() {
        let (dom, patcher) = patcher();
        let builds = Arc::new(Mutex::new(0));
        let counted = builds.clone();
        let options = ComponentOptions::new("page", |cx: &RenderContext<'_, MemoryDom>| {
            let title = cx.get("title");
            Ok(Node::element("main")
                .child(Node::element("h1").text(title.as_str().unwrap_or_default()).build())
                .children(cx.static_tree(0))
                .build())
        })
        .data(serde_json::json!({ "title": "a" }))
        .static_render(move || {
            *counted.lock() += 1;
            Node::element("footer").text("static").build()
        });

        let component = Component::new(options, patcher);
        let root = mount_component_render_loop(&component, None).unwrap();
        dom.take_ops();

        component.data().as_object().unwrap().assign("title", "b");
        run_tick().unwrap();

        assert_eq!(*builds.lock(), 1);
        assert_eq!(dom.to_html(root), "<main><h1>b</h1><footer>static</footer></main>");
        let ops = dom.take_ops();
        assert_eq!(ops.len(), 1, "only the title changes: {ops:?}");
    }

    #[test]
    fn render_error_propagates_from_mount() {
        let (_, patcher) = patcher();
        let options = ComponentOptions::new("broken", |_: &RenderContext<'_, MemoryDom>| {
            Err(Error::evaluation("render", "boom"))
        });
        let component = Component::new(options, patcher);
        assert!(mount_component_render_loop(&component, None).is_err());
    }

    #[test]
    fn child_component_receives_props_and_is_destroyed() {
        let (dom, patcher) = patcher();
        let destroyed = Arc::new(Mutex::new(0));

        let child_destroyed = destroyed.clone();
        let parent = ComponentOptions::new("parent", move |cx: &RenderContext<'_, MemoryDom>| {
            let show = cx.get("show").as_bool().unwrap_or_default();
            let label = cx.get("label");
            let child_destroyed = child_destroyed.clone();
            let children = show.then(|| {
                cx.component("child", Some(Key::from("c")), [("label", label)], move |props: &Object| {
                    let props = props.clone();
                    let child_destroyed = child_destroyed.clone();
                    ComponentOptions::new("child", move |_: &RenderContext<'_, MemoryDom>| {
                        let label = props.get("label").unwrap_or_default();
                        Ok(Node::element("span").text(label.as_str().unwrap_or_default()).build())
                    })
                    .hook(Lifecycle::Destroyed, move || *child_destroyed.lock() += 1)
                })
            });
            Ok(Node::element("div").children(children).build())
        })
        .data(serde_json::json!({ "show": true, "label": "one" }));

        let component = Component::new(parent, patcher);
        let root = mount_component_render_loop(&component, None).unwrap();
        assert_eq!(dom.to_html(root), "<div><span>one</span></div>");

        let data = component.data().as_object().unwrap().clone();
        data.assign("label", "two");
        run_tick().unwrap();
        assert_eq!(dom.to_html(root), "<div><span>two</span></div>");

        data.assign("show", false);
        run_tick().unwrap();
        assert_eq!(dom.to_html(root), "<div></div>");
        assert_eq!(*destroyed.lock(), 1);
    }

    fn item(props: &Object) -> ComponentOptions<MemoryDom> {
        let props = props.clone();
        ComponentOptions::new("item", move |_: &RenderContext<'_, MemoryDom>| {
            let label = props.get("label").unwrap_or_default();
            let big = props.get("big").and_then(|v| v.as_bool()).unwrap_or(false);
            let tag = if big { "div" } else { "span" };
            Ok(Node::element(tag).text(label.as_str().unwrap_or_default()).build())
        })
    }

    fn labels(value: &Value) -> Vec<String> {
        value
            .as_array()
            .map(|array| array.to_vec())
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    #[test]
    fn child_root_swap_is_followed_by_moves_and_removal() {
        let (dom, patcher) = patcher();
        let parent = ComponentOptions::new("list", |cx: &RenderContext<'_, MemoryDom>| {
            let big = cx.get("big");
            let children: Vec<_> = labels(&cx.get("order"))
                .into_iter()
                .map(|label| {
                    let big = if label == "a" { big.clone() } else { Value::from(false) };
                    let props = [("label", Value::from(label.as_str())), ("big", big)];
                    cx.component("item", Some(Key::from(label.as_str())), props, item)
                })
                .collect();
            Ok(Node::element("section").children(children).build())
        })
        .data(serde_json::json!({ "big": false, "order": ["a", "b"] }));

        let component = Component::new(parent, patcher);
        let root = mount_component_render_loop(&component, None).unwrap();
        assert_eq!(dom.to_html(root), "<section><span>a</span><span>b</span></section>");

        let data = component.data().as_object().unwrap().clone();
        data.assign("big", true);
        run_tick().unwrap();
        assert_eq!(dom.to_html(root), "<section><div>a</div><span>b</span></section>");

        data.assign("order", serde_json::json!(["b", "a"]));
        run_tick().unwrap();
        assert_eq!(dom.to_html(root), "<section><span>b</span><div>a</div></section>");

        data.assign("order", serde_json::json!(["b"]));
        run_tick().unwrap();
        assert_eq!(dom.to_html(root), "<section><span>b</span></section>");
    }

    #[test]
    fn root_component_placeholder_follows_child_root() {
        let (dom, patcher) = patcher();
        let parent = ComponentOptions::new("wrapper", |cx: &RenderContext<'_, MemoryDom>| {
            let props = [("label", Value::from("x")), ("big", cx.get("big"))];
            Ok(cx.component("item", None, props, item))
        })
        .data(serde_json::json!({ "big": false }));

        let component = Component::new(parent, patcher);
        mount_component_render_loop(&component, None).unwrap();
        component.data().as_object().unwrap().assign("big", true);
        run_tick().unwrap();

        let el = component.el().unwrap();
        assert_eq!(dom.to_html(el), "<div>x</div>");
    }

    fn flaky(props: &Object) -> ComponentOptions<MemoryDom> {
        let props = props.clone();
        ComponentOptions::new("flaky", move |_: &RenderContext<'_, MemoryDom>| {
            if props.get("broken").and_then(|v| v.as_bool()).unwrap_or(false) {
                return Err(Error::evaluation("render", "broken"));
            }
            Ok(Node::element("em").text("x").build())
        })
    }

    #[test]
    fn failed_patch_rebuilds_from_the_live_root() {
        let (dom, patcher) = patcher();
        let body = dom.root("body");
        let placeholder = dom.root("div");
        dom.attach(body, placeholder);

        let parent = ComponentOptions::new("list", |cx: &RenderContext<'_, MemoryDom>| {
            let broken = cx.get("broken");
            let children: Vec<_> = labels(&cx.get("order"))
                .into_iter()
                .map(|label| match label.as_str() {
                    "x" => cx.component("flaky", Some(Key::from("x")), [("broken", broken.clone())], flaky),
                    _ => Node::element("li").key(label.as_str()).text(label.as_str()).build(),
                })
                .collect();
            Ok(Node::element("ul").children(children).build())
        })
        .data(serde_json::json!({ "broken": true, "order": ["a", "b"] }));

        let component = Component::new(parent, patcher);
        mount_component_render_loop(&component, Some(placeholder)).unwrap();
        assert_eq!(dom.to_html(body), "<body><ul><li>a</li><li>b</li></ul></body>");

        // "b" moves before "a", then creating "x" fails.
        let data = component.data().as_object().unwrap().clone();
        data.assign("order", serde_json::json!(["b", "a", "x"]));
        assert!(matches!(run_tick(), Err(Error::ComponentMount { .. })));
        assert!(component.vnode().is_none());

        data.assign("order", serde_json::json!(["a", "b"]));
        run_tick().unwrap();
        assert_eq!(dom.to_html(body), "<body><ul><li>a</li><li>b</li></ul></body>");

        data.assign("broken", false);
        data.assign("order", serde_json::json!(["a", "b", "x"]));
        run_tick().unwrap();
        assert_eq!(dom.to_html(body), "<body><ul><li>a</li><li>b</li><em>x</em></ul></body>");
        assert_eq!(dom.children(body), vec![component.el().unwrap()]);
    }

    #[test]
    fn component_watch_is_torn_down_with_it() {
        let (_, patcher) = patcher();
        let component = Component::new(counter(), patcher);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let watcher = component
            .watch(
                "count",
                move |new, old| {
                    log.lock().push((new.clone(), old.clone()));
                    Ok(())
                },
                WatchOptions::default(),
            )
            .unwrap();

        component.data().as_object().unwrap().assign("count", 1);
        run_tick().unwrap();
        assert_eq!(*seen.lock(), vec![(Value::from(1), Value::from(0))]);

        component.destroy();
        assert!(!watcher.is_active());
    }
}
