//! Diff/Patch Engine
//!
//! [`Patcher::patch`] reconciles a new virtual tree against either a live
//! node (first mount) or the tree produced by the previous render, and
//! returns the live root.
//!
//! # How Patching Works
//!
//! 1. A live node target is wrapped as an empty virtual node. The new tree
//!    is created in full, inserted after it, and the wrapped node removed.
//!
//! 2. A previous tree whose root has the same key and selector is patched
//!    in place with `patch_node`. Otherwise the new tree is
//!    created, inserted after the old one, and the old one removed.
//!
//! 3. Patching a node copies the live handle over, runs the update hooks,
//!    then reconciles children or text. A node patched against itself is
//!    left alone, which is how reused static subtrees cost nothing.
//!
//! 4. Removal destroys the subtree bottom-up first, so hooks can still see
//!    descendants, then detaches the node once every remove hook has
//!    signalled. Text and comment nodes are detached directly.

use std::fmt;
use std::sync::Arc;

use super::hooks::{HookKind, HookRegistry, Module, RemoveCallback};
use super::ops::NodeOps;
use super::vnode::{parse_selector, same_vnode, VNode, VNodeKind, VNodeRef};
use crate::error::{Error, Result};

/// What a patch reconciles against.
#[derive(Debug, Clone)]
pub enum PatchTarget<N> {
    /// A live node with no virtual counterpart, replaced on first mount.
    Live(N),
    /// The tree committed by the previous patch.
    Tree(VNodeRef<N>),
}

/// Nodes whose `insert` hook runs at the end of the patch.
pub(super) type InsertQueue<N> = Vec<VNodeRef<N>>;

/// The patch engine, bound to a set of node operations and modules.
pub struct Patcher<O: NodeOps> {
    ops: Arc<O>,
    hooks: HookRegistry<O>,
    empty: VNodeRef<O::Node>,
}

impl<O: NodeOps> Patcher<O> {
    pub fn new(ops: Arc<O>, modules: impl IntoIterator<Item = Module<O>>) -> Self {
        Self {
            ops,
            hooks: HookRegistry::from_modules(modules),
            empty: VNode::empty(),
        }
    }

    pub fn ops(&self) -> &Arc<O> {
        &self.ops
    }

    pub fn hooks(&self) -> &HookRegistry<O> {
        &self.hooks
    }

    /// Reconcile `vnode` against `target` and return the live root.
    pub fn patch(&self, target: PatchTarget<O::Node>, vnode: &VNodeRef<O::Node>) -> Result<O::Node> {
        let mut inserted = InsertQueue::new();
        self.hooks.pre();

        let result = match &target {
            PatchTarget::Live(elm) => {
                let old = self.empty_node_at(elm);
                self.replace(&old, vnode, &mut inserted)
            }
            PatchTarget::Tree(old) if same_vnode(&**old, &**vnode) => self.patch_node(old, vnode, &mut inserted),
            PatchTarget::Tree(old) => self.replace(old, vnode, &mut inserted),
        };

        self.flush_inserted(&inserted);
        self.hooks.post();
        result?;

        let elm = vnode.elm().ok_or(Error::MissingLiveNode("patched root"))?;
        tracing::debug!(
            root = vnode.sel().unwrap_or("#text"),
            first_mount = matches!(target, PatchTarget::Live(_)),
            inserted = inserted.len(),
            "patched"
        );
        Ok(elm)
    }

    /// Create a detached live tree for `vnode`, as for a component mounted
    /// without a target.
    pub fn create_root(&self, vnode: &VNodeRef<O::Node>) -> Result<O::Node> {
        let mut inserted = InsertQueue::new();
        self.hooks.pre();
        let result = self.create_elm(vnode, &mut inserted);
        self.flush_inserted(&inserted);
        self.hooks.post();
        result
    }

    /// Run the destroy hooks of a whole tree without detaching anything.
    pub fn destroy_tree(&self, vnode: &VNode<O::Node>) {
        self.invoke_destroy_hook(vnode);
    }

    /// Destroy `vnode` and detach it from `parent`.
    pub fn remove_tree(&self, parent: &O::Node, vnode: &VNodeRef<O::Node>) -> Result<()> {
        self.remove_vnodes(parent, std::slice::from_ref(vnode))
    }

    fn flush_inserted(&self, inserted: &InsertQueue<O::Node>) {
        for vnode in inserted {
            if let Some(insert) = &vnode.data().hook.insert {
                insert(&**vnode);
            }
        }
    }

    /// Wrap a live node as an empty virtual node with a matching selector.
    fn empty_node_at(&self, elm: &O::Node) -> VNodeRef<O::Node> {
        let mut sel = self.ops.tag_name(elm).to_lowercase();
        if let Some(id) = self.ops.get_attribute(elm, "id").filter(|id| !id.is_empty()) {
            sel.push('#');
            sel.push_str(&id);
        }
        if let Some(class) = self.ops.get_attribute(elm, "class") {
            for name in class.split_whitespace() {
                sel.push('.');
                sel.push_str(name);
            }
        }
        VNode::at_live(sel, elm.clone())
    }

    /// Create `vnode`'s tree, insert it after `old`, and remove `old`.
    fn replace(
        &self,
        old: &VNodeRef<O::Node>,
        vnode: &VNodeRef<O::Node>,
        inserted: &mut InsertQueue<O::Node>,
    ) -> Result<()> {
        let old_elm = old.elm().ok_or(Error::MissingLiveNode("replaced root"))?;
        let parent = self.ops.parent_node(&old_elm);

        let elm = self.create_elm(vnode, inserted)?;
        match parent {
            Some(parent) => {
                let next = self.ops.next_sibling(&old_elm);
                self.ops.insert_before(&parent, &elm, next.as_ref());
                self.remove_vnodes(&parent, std::slice::from_ref(old))?;
            }
            None => self.invoke_destroy_hook(old),
        }
        Ok(())
    }

    /// Build the live tree for `vnode` and record it on every node.
    pub(super) fn create_elm(
        &self,
        vnode: &VNodeRef<O::Node>,
        inserted: &mut InsertQueue<O::Node>,
    ) -> Result<O::Node> {
        let data = vnode.data();
        if let Some(init) = &data.hook.init {
            init(&**vnode);
        }

        let elm = match vnode.kind() {
            VNodeKind::Component => {
                let host = vnode
                    .component_host()
                    .ok_or(Error::MissingLiveNode("component host"))?;
                let elm = host.mount(vnode).map_err(|source| Error::ComponentMount {
                    name: vnode.sel().unwrap_or_default().to_string(),
                    source: Box::new(source),
                })?;
                vnode.set_elm(elm.clone());
                self.hooks.create(&self.ops, &self.empty, vnode);
                elm
            }
            VNodeKind::Comment => {
                let elm = self.ops.create_comment(vnode.text_content().unwrap_or_default());
                vnode.set_elm(elm.clone());
                return Ok(elm);
            }
            VNodeKind::Text => {
                let elm = self.ops.create_text_node(vnode.text_content().unwrap_or_default());
                vnode.set_elm(elm.clone());
                return Ok(elm);
            }
            VNodeKind::Element => {
                let selector = parse_selector(vnode.sel().unwrap_or_default());
                let elm = match &data.ns {
                    Some(ns) => self.ops.create_element_ns(ns, selector.tag),
                    None => self.ops.create_element(selector.tag),
                };
                vnode.set_elm(elm.clone());
                if let Some(id) = selector.id {
                    self.ops.set_attribute(&elm, "id", id);
                }
                if !selector.classes.is_empty() {
                    self.ops.set_attribute(&elm, "class", &selector.classes.join(" "));
                }

                self.hooks.create(&self.ops, &self.empty, vnode);

                if let Some(children) = vnode.children() {
                    for child in children {
                        let child_elm = self.create_elm(child, inserted)?;
                        self.ops.append_child(&elm, &child_elm);
                    }
                } else if let Some(text) = vnode.text_content() {
                    let text = self.ops.create_text_node(text);
                    self.ops.append_child(&elm, &text);
                }
                elm
            }
        };

        if let Some(create) = &data.hook.create {
            create(&**vnode);
        }
        if data.hook.insert.is_some() {
            inserted.push(vnode.clone());
        }
        Ok(elm)
    }

    pub(super) fn add_vnodes(
        &self,
        parent: &O::Node,
        before: Option<&O::Node>,
        vnodes: &[VNodeRef<O::Node>],
        inserted: &mut InsertQueue<O::Node>,
    ) -> Result<()> {
        for vnode in vnodes {
            let elm = self.create_elm(vnode, inserted)?;
            self.ops.insert_before(parent, &elm, before);
        }
        Ok(())
    }

    /// Run destroy hooks over a subtree, children before parents.
    fn invoke_destroy_hook(&self, vnode: &VNode<O::Node>) {
        if matches!(vnode.kind(), VNodeKind::Text | VNodeKind::Comment) {
            return;
        }
        if let Some(children) = vnode.children() {
            for child in children {
                self.invoke_destroy_hook(child);
            }
        }
        if let Some(host) = vnode.component_host() {
            host.destroy(vnode);
        }
        if let Some(destroy) = &vnode.data().hook.destroy {
            destroy(vnode);
        }
        self.hooks.destroy(vnode);
    }

    pub(super) fn remove_vnodes<'a>(
        &self,
        parent: &O::Node,
        vnodes: impl IntoIterator<Item = &'a VNodeRef<O::Node>>,
    ) -> Result<()>
    where
        O::Node: 'a,
    {
        for vnode in vnodes {
            let elm = vnode.elm().ok_or(Error::MissingLiveNode("removed node"))?;
            if matches!(vnode.kind(), VNodeKind::Text | VNodeKind::Comment) {
                self.ops.remove_child(parent, &elm);
                continue;
            }

            self.invoke_destroy_hook(vnode);

            let ops = self.ops.clone();
            let listeners = self.hooks.count(HookKind::Remove) + 1;
            let rm = RemoveCallback::new(listeners, move || {
                if let Some(parent) = ops.parent_node(&elm) {
                    ops.remove_child(&parent, &elm);
                }
            });

            self.hooks.remove(vnode, &rm);
            match &vnode.data().hook.remove {
                Some(remove) => remove(&**vnode, rm),
                None => rm.done(),
            }
        }
        Ok(())
    }

    /// Patch `old` into `new`, reusing `old`'s live node.
    pub(super) fn patch_node(
        &self,
        old: &VNodeRef<O::Node>,
        new: &VNodeRef<O::Node>,
        inserted: &mut InsertQueue<O::Node>,
    ) -> Result<()> {
        if Arc::ptr_eq(old, new) {
            return Ok(());
        }

        let hook = &new.data().hook;
        if let Some(prepatch) = &hook.prepatch {
            prepatch(&**old, &**new);
        }
        if let Some(host) = new.component_host() {
            host.prepatch(old, new);
        }

        // After prepatch a component instance belongs to `new`'s host, whose
        // root may differ from the one `old` recorded.
        let elm = new
            .component_host()
            .and_then(|host| host.root())
            .or_else(|| old.elm())
            .ok_or(Error::MissingLiveNode("patched node"))?;
        new.set_elm(elm.clone());

        if new.kind() != VNodeKind::Text {
            self.hooks.update(&self.ops, old, new);
            if let Some(update) = &hook.update {
                update(&**old, &**new);
            }
        }

        if new.kind() != VNodeKind::Component {
            match new.text_content() {
                None => match (old.children(), new.children()) {
                    (Some(old_children), Some(new_children)) => {
                        if !std::ptr::eq(old_children, new_children) {
                            self.update_children(&elm, old_children, new_children, inserted)?;
                        }
                    }
                    (None, Some(new_children)) => {
                        if old.text_content().is_some() {
                            self.ops.set_text_content(&elm, "");
                        }
                        self.add_vnodes(&elm, None, new_children, inserted)?;
                    }
                    (Some(old_children), None) => self.remove_vnodes(&elm, old_children)?,
                    (None, None) => {
                        if old.text_content().is_some() {
                            self.ops.set_text_content(&elm, "");
                        }
                    }
                },
                Some(text) => {
                    if old.text_content() != Some(text) {
                        if let Some(old_children) = old.children() {
                            self.remove_vnodes(&elm, old_children)?;
                        }
                        self.ops.set_text_content(&elm, text);
                    }
                }
            }
        }

        if let Some(postpatch) = &hook.postpatch {
            postpatch(&**old, &**new);
        }
        Ok(())
    }
}

impl<O: NodeOps> fmt::Debug for Patcher<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patcher").field("hooks", &self.hooks).finish()
    }
}
