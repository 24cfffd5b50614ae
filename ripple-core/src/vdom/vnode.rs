//! Virtual Tree Nodes
//!
//! A [`VNode`] is an immutable description of one node of the UI, produced
//! by a render pass. Nodes are shared through [`VNodeRef`]; the patch engine
//! compares references by identity before comparing structure, which lets a
//! render reuse a static subtree at no cost.
//!
//! The only mutable part of a node is the handle of the live node it was
//! reconciled into, recorded by the patch engine.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::hooks::RemoveCallback;
use crate::error::Result;

/// Shared handle to a virtual node.
pub type VNodeRef<N> = Arc<VNode<N>>;

/// Identity key used to match children across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Str(s) => f.write_str(s),
            Key::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i.into())
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Int(i as i64)
    }
}

pub type VNodeHook<N> = Arc<dyn Fn(&VNode<N>) + Send + Sync>;
pub type VNodePairHook<N> = Arc<dyn Fn(&VNode<N>, &VNode<N>) + Send + Sync>;
pub type VNodeRemoveHook<N> = Arc<dyn Fn(&VNode<N>, RemoveCallback) + Send + Sync>;

/// Per-node hooks.
///
/// A `remove` hook takes over the removal: the node is detached only once
/// the hook has signalled the callback it receives.
pub struct VNodeHooks<N> {
    /// Before the live node is created.
    pub init: Option<VNodeHook<N>>,
    /// After the live node and its children were created.
    pub create: Option<VNodeHook<N>>,
    /// After the whole patch that inserted the node.
    pub insert: Option<VNodeHook<N>>,
    pub prepatch: Option<VNodePairHook<N>>,
    pub update: Option<VNodePairHook<N>>,
    pub postpatch: Option<VNodePairHook<N>>,
    pub destroy: Option<VNodeHook<N>>,
    pub remove: Option<VNodeRemoveHook<N>>,
}

impl<N> Default for VNodeHooks<N> {
    fn default() -> Self {
        Self {
            init: None,
            create: None,
            insert: None,
            prepatch: None,
            update: None,
            postpatch: None,
            destroy: None,
            remove: None,
        }
    }
}

impl<N> Clone for VNodeHooks<N> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            create: self.create.clone(),
            insert: self.insert.clone(),
            prepatch: self.prepatch.clone(),
            update: self.update.clone(),
            postpatch: self.postpatch.clone(),
            destroy: self.destroy.clone(),
            remove: self.remove.clone(),
        }
    }
}

/// Data consumed by modules and the engine.
pub struct VNodeData<N> {
    pub attrs: IndexMap<String, String>,
    /// Class names toggled on (`true`) or off.
    pub class: IndexMap<String, bool>,
    /// Namespace for `create_element_ns`.
    pub ns: Option<String>,
    pub hook: VNodeHooks<N>,
}

impl<N> Default for VNodeData<N> {
    fn default() -> Self {
        Self {
            attrs: IndexMap::new(),
            class: IndexMap::new(),
            ns: None,
            hook: VNodeHooks::default(),
        }
    }
}

/// A component placeholder's link to its component instance.
pub trait ComponentHost<N>: Send + Sync {
    /// Instantiate and render the component, returning its live root.
    fn mount(&self, vnode: &VNode<N>) -> Result<N>;

    /// Take over the instance from `old`'s host and pass new inputs to it.
    fn prepatch(&self, old: &VNode<N>, new: &VNode<N>);

    /// Tear the instance down.
    fn destroy(&self, vnode: &VNode<N>);

    /// The instance's current live root, while this host owns a mounted
    /// instance.
    fn root(&self) -> Option<N> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VNodeKind {
    Element,
    Text,
    Comment,
    Component,
}

/// Selector used for comment nodes.
pub const COMMENT_SELECTOR: &str = "!";

/// One node of a virtual tree.
pub struct VNode<N> {
    sel: Option<String>,
    key: Option<Key>,
    data: VNodeData<N>,
    children: Option<Vec<VNodeRef<N>>>,
    text: Option<String>,
    component: Option<Arc<dyn ComponentHost<N>>>,
    elm: Mutex<Option<N>>,
}

impl<N> VNode<N> {
    /// Start building an element, e.g. `VNode::element("div#main.wide")`.
    pub fn element(sel: impl Into<String>) -> VNodeBuilder<N> {
        VNodeBuilder {
            sel: sel.into(),
            key: None,
            data: VNodeData::default(),
            children: None,
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> VNodeRef<N> {
        Arc::new(Self::raw(None, None, VNodeData::default(), None, Some(text.into())))
    }

    pub fn comment(text: impl Into<String>) -> VNodeRef<N> {
        Arc::new(Self::raw(
            Some(COMMENT_SELECTOR.to_string()),
            None,
            VNodeData::default(),
            None,
            Some(text.into()),
        ))
    }

    /// A placeholder for a child component.
    pub fn component(tag: impl Into<String>, key: Option<Key>, host: Arc<dyn ComponentHost<N>>) -> VNodeRef<N> {
        let mut node = Self::raw(Some(tag.into()), key, VNodeData::default(), None, None);
        node.component = Some(host);
        Arc::new(node)
    }

    /// An empty element node with no live node.
    pub(crate) fn empty() -> VNodeRef<N> {
        Arc::new(Self::raw(Some(String::new()), None, VNodeData::default(), Some(Vec::new()), None))
    }

    /// Wrap an existing live node.
    pub(crate) fn at_live(sel: String, elm: N) -> VNodeRef<N> {
        let node = Self::raw(Some(sel), None, VNodeData::default(), Some(Vec::new()), None);
        *node.elm.lock() = Some(elm);
        Arc::new(node)
    }

    fn raw(
        sel: Option<String>,
        key: Option<Key>,
        data: VNodeData<N>,
        children: Option<Vec<VNodeRef<N>>>,
        text: Option<String>,
    ) -> Self {
        Self {
            sel,
            key,
            data,
            children,
            text,
            component: None,
            elm: Mutex::new(None),
        }
    }

    pub fn sel(&self) -> Option<&str> {
        self.sel.as_deref()
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn data(&self) -> &VNodeData<N> {
        &self.data
    }

    pub fn children(&self) -> Option<&[VNodeRef<N>]> {
        self.children.as_deref()
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn component_host(&self) -> Option<&Arc<dyn ComponentHost<N>>> {
        self.component.as_ref()
    }

    pub fn kind(&self) -> VNodeKind {
        match (&self.component, self.sel.as_deref()) {
            (Some(_), _) => VNodeKind::Component,
            (None, Some(COMMENT_SELECTOR)) => VNodeKind::Comment,
            (None, Some(_)) => VNodeKind::Element,
            (None, None) => VNodeKind::Text,
        }
    }
}

impl<N: Clone> VNode<N> {
    /// The live node, once created or patched.
    ///
    /// A component placeholder reports its instance's current root, which
    /// changes when the instance re-renders into a different root.
    pub fn elm(&self) -> Option<N> {
        if let Some(root) = self.component.as_ref().and_then(|host| host.root()) {
            *self.elm.lock() = Some(root.clone());
            return Some(root);
        }
        self.elm.lock().clone()
    }

    pub(crate) fn set_elm(&self, elm: N) {
        *self.elm.lock() = Some(elm);
    }
}

impl<N: fmt::Debug> fmt::Debug for VNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VNode")
            .field("sel", &self.sel)
            .field("key", &self.key)
            .field("text", &self.text)
            .field("children", &self.children)
            .field("component", &self.component.is_some())
            .field("elm", &*self.elm.lock())
            .finish()
    }
}

/// Two nodes may be patched into each other when key and selector match.
pub fn same_vnode<N>(a: &VNode<N>, b: &VNode<N>) -> bool {
    a.key == b.key && a.sel == b.sel
}

/// Builder returned by [`VNode::element`].
pub struct VNodeBuilder<N> {
    sel: String,
    key: Option<Key>,
    data: VNodeData<N>,
    children: Option<Vec<VNodeRef<N>>>,
    text: Option<String>,
}

impl<N> VNodeBuilder<N> {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.attrs.insert(name.into(), value.into());
        self
    }

    pub fn class(mut self, name: impl Into<String>, on: bool) -> Self {
        self.data.class.insert(name.into(), on);
        self
    }

    pub fn ns(mut self, ns: impl Into<String>) -> Self {
        self.data.ns = Some(ns.into());
        self
    }

    pub fn child(mut self, child: VNodeRef<N>) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = VNodeRef<N>>) -> Self {
        self.children.get_or_insert_with(Vec::new).extend(children);
        self
    }

    /// Text content. Replaces any children.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self.children = None;
        self
    }

    /// Set per-node hooks.
    pub fn hooks(mut self, configure: impl FnOnce(&mut VNodeHooks<N>)) -> Self {
        configure(&mut self.data.hook);
        self
    }

    pub fn on_insert(self, hook: impl Fn(&VNode<N>) + Send + Sync + 'static) -> Self {
        self.hooks(|h| h.insert = Some(Arc::new(hook)))
    }

    pub fn on_destroy(self, hook: impl Fn(&VNode<N>) + Send + Sync + 'static) -> Self {
        self.hooks(|h| h.destroy = Some(Arc::new(hook)))
    }

    pub fn on_remove(self, hook: impl Fn(&VNode<N>, RemoveCallback) + Send + Sync + 'static) -> Self {
        self.hooks(|h| h.remove = Some(Arc::new(hook)))
    }

    pub fn build(self) -> VNodeRef<N> {
        Arc::new(VNode::raw(Some(self.sel), self.key, self.data, self.children, self.text))
    }
}

/// Shorthand for an element with children.
pub fn h<N>(sel: &str, children: Vec<VNodeRef<N>>) -> VNodeRef<N> {
    VNode::element(sel).children(children).build()
}

/// The parts of a `tag#id.class1.class2` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector<'a> {
    pub tag: &'a str,
    pub id: Option<&'a str>,
    pub classes: Vec<&'a str>,
}

/// Split a selector into tag, id and classes.
///
/// The id must come before the classes; a `#` after the first `.` is part
/// of a class name.
pub fn parse_selector(sel: &str) -> Selector<'_> {
    let hash = sel.find('#');
    let dot = sel[hash.unwrap_or(0)..].find('.').map(|i| i + hash.unwrap_or(0));

    let tag_end = match (hash, dot) {
        (Some(h), Some(d)) => h.min(d),
        (Some(i), None) | (None, Some(i)) => i,
        (None, None) => sel.len(),
    };
    let id = hash.map(|h| &sel[h + 1..dot.unwrap_or(sel.len())]);
    let classes = dot
        .map(|d| sel[d + 1..].split('.').filter(|c| !c.is_empty()).collect())
        .unwrap_or_default();

    Selector {
        tag: &sel[..tag_end],
        id,
        classes,
    }
}
