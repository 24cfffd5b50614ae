//! In-Memory Tree
//!
//! [`MemoryDom`] implements [`NodeOps`] over an arena of nodes. It is the
//! host used by tests and benchmarks: every operation is logged as a
//! [`DomOp`] and every call, reads included, is counted, so a test can
//! assert exactly how much work a patch did.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::ops::NodeOps;

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One logged mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DomOp {
    CreateElement { node: NodeHandle, tag: String },
    CreateElementNs { node: NodeHandle, ns: String, tag: String },
    CreateTextNode { node: NodeHandle, text: String },
    CreateComment { node: NodeHandle, text: String },
    InsertBefore { parent: NodeHandle, node: NodeHandle, reference: Option<NodeHandle> },
    AppendChild { parent: NodeHandle, node: NodeHandle },
    RemoveChild { parent: NodeHandle, node: NodeHandle },
    SetTextContent { node: NodeHandle, text: String },
    SetAttribute { node: NodeHandle, name: String, value: String },
    RemoveAttribute { node: NodeHandle, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Element { tag: String, ns: Option<String>, attrs: IndexMap<String, String> },
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct Slot {
    content: Content,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    log: Vec<DomOp>,
}

impl Arena {
    fn alloc(&mut self, content: Content) -> NodeHandle {
        let handle = NodeHandle(self.slots.len());
        self.slots.push(Slot {
            content,
            parent: None,
            children: Vec::new(),
        });
        handle
    }

    fn detach(&mut self, node: NodeHandle) {
        if let Some(parent) = self.slots[node.0].parent.take() {
            self.slots[parent.0].children.retain(|c| *c != node);
        }
    }

    fn insert(&mut self, parent: NodeHandle, node: NodeHandle, reference: Option<NodeHandle>) {
        self.detach(node);
        let children = &mut self.slots[parent.0].children;
        let at = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(at, node);
        self.slots[node.0].parent = Some(parent);
    }
}

/// An arena-backed tree with an operation log.
#[derive(Default)]
pub struct MemoryDom {
    arena: Mutex<Arena>,
    calls: AtomicUsize,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Create a detached element without counting or logging it.
    pub fn root(&self, tag: &str) -> NodeHandle {
        self.arena.lock().alloc(Content::Element {
            tag: tag.to_string(),
            ns: None,
            attrs: IndexMap::new(),
        })
    }

    /// Append `child` to `parent` without counting or logging it.
    pub fn attach(&self, parent: NodeHandle, child: NodeHandle) {
        self.arena.lock().insert(parent, child, None);
    }

    pub fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.arena.lock().slots[node.0].parent
    }

    pub fn children(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.arena.lock().slots[node.0].children.clone()
    }

    /// The tag as created, or an empty string for non-elements.
    pub fn tag(&self, node: NodeHandle) -> String {
        match &self.arena.lock().slots[node.0].content {
            Content::Element { tag, .. } => tag.clone(),
            _ => String::new(),
        }
    }

    pub fn attribute(&self, node: NodeHandle, name: &str) -> Option<String> {
        match &self.arena.lock().slots[node.0].content {
            Content::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    /// Concatenated text of the subtree, comments excluded.
    pub fn text_content(&self, node: NodeHandle) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    /// Serialize the subtree as markup.
    pub fn to_html(&self, node: NodeHandle) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        write_html(&arena, node, &mut out);
        out
    }

    /// Drain the operation log.
    pub fn take_ops(&self) -> Vec<DomOp> {
        std::mem::take(&mut self.arena.lock().log)
    }

    /// Number of [`NodeOps`] calls so far, reads included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Clear the log and the call count.
    pub fn reset_log(&self) {
        self.arena.lock().log.clear();
        self.calls.store(0, Ordering::Relaxed);
    }

    /// Number of nodes ever created.
    pub fn node_count(&self) -> usize {
        self.arena.lock().slots.len()
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.lock();
        f.debug_struct("MemoryDom")
            .field("nodes", &arena.slots.len())
            .field("logged", &arena.log.len())
            .field("calls", &self.call_count())
            .finish()
    }
}

fn collect_text(arena: &Arena, node: NodeHandle, out: &mut String) {
    let slot = &arena.slots[node.0];
    match &slot.content {
        Content::Text(text) => out.push_str(text),
        Content::Comment(_) => {}
        Content::Element { .. } => {
            for child in &slot.children {
                collect_text(arena, *child, out);
            }
        }
    }
}

fn write_html(arena: &Arena, node: NodeHandle, out: &mut String) {
    let slot = &arena.slots[node.0];
    match &slot.content {
        Content::Text(text) => out.push_str(text),
        Content::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Content::Element { tag, ns, attrs } => {
            out.push('<');
            out.push_str(tag);
            if let Some(ns) = ns {
                out.push_str(&format!(" xmlns=\"{ns}\""));
            }
            for (name, value) in attrs {
                out.push_str(&format!(" {name}=\"{value}\""));
            }
            out.push('>');
            for child in &slot.children {
                write_html(arena, *child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

impl NodeOps for MemoryDom {
    type Node = NodeHandle;

    fn create_element(&self, tag: &str) -> NodeHandle {
        self.call();
        let mut arena = self.arena.lock();
        let node = arena.alloc(Content::Element {
            tag: tag.to_string(),
            ns: None,
            attrs: IndexMap::new(),
        });
        arena.log.push(DomOp::CreateElement { node, tag: tag.to_string() });
        node
    }

    fn create_element_ns(&self, namespace: &str, tag: &str) -> NodeHandle {
        self.call();
        let mut arena = self.arena.lock();
        let node = arena.alloc(Content::Element {
            tag: tag.to_string(),
            ns: Some(namespace.to_string()),
            attrs: IndexMap::new(),
        });
        arena.log.push(DomOp::CreateElementNs {
            node,
            ns: namespace.to_string(),
            tag: tag.to_string(),
        });
        node
    }

    fn create_text_node(&self, text: &str) -> NodeHandle {
        self.call();
        let mut arena = self.arena.lock();
        let node = arena.alloc(Content::Text(text.to_string()));
        arena.log.push(DomOp::CreateTextNode { node, text: text.to_string() });
        node
    }

    fn create_comment(&self, text: &str) -> NodeHandle {
        self.call();
        let mut arena = self.arena.lock();
        let node = arena.alloc(Content::Comment(text.to_string()));
        arena.log.push(DomOp::CreateComment { node, text: text.to_string() });
        node
    }

    fn insert_before(&self, parent: &NodeHandle, node: &NodeHandle, reference: Option<&NodeHandle>) {
        self.call();
        let mut arena = self.arena.lock();
        arena.insert(*parent, *node, reference.copied());
        arena.log.push(DomOp::InsertBefore {
            parent: *parent,
            node: *node,
            reference: reference.copied(),
        });
    }

    fn remove_child(&self, parent: &NodeHandle, child: &NodeHandle) {
        self.call();
        let mut arena = self.arena.lock();
        if arena.slots[child.0].parent == Some(*parent) {
            arena.detach(*child);
        }
        arena.log.push(DomOp::RemoveChild { parent: *parent, node: *child });
    }

    fn append_child(&self, parent: &NodeHandle, child: &NodeHandle) {
        self.call();
        let mut arena = self.arena.lock();
        arena.insert(*parent, *child, None);
        arena.log.push(DomOp::AppendChild { parent: *parent, node: *child });
    }

    fn parent_node(&self, node: &NodeHandle) -> Option<NodeHandle> {
        self.call();
        self.arena.lock().slots[node.0].parent
    }

    fn next_sibling(&self, node: &NodeHandle) -> Option<NodeHandle> {
        self.call();
        let arena = self.arena.lock();
        let parent = arena.slots[node.0].parent?;
        let siblings = &arena.slots[parent.0].children;
        let at = siblings.iter().position(|c| c == node)?;
        siblings.get(at + 1).copied()
    }

    fn tag_name(&self, node: &NodeHandle) -> String {
        self.call();
        self.tag(*node).to_uppercase()
    }

    fn set_text_content(&self, node: &NodeHandle, text: &str) {
        self.call();
        let mut arena = self.arena.lock();
        let is_element = matches!(arena.slots[node.0].content, Content::Element { .. });
        if is_element {
            for child in std::mem::take(&mut arena.slots[node.0].children) {
                arena.slots[child.0].parent = None;
            }
            if !text.is_empty() {
                let text_node = arena.alloc(Content::Text(text.to_string()));
                arena.insert(*node, text_node, None);
            }
        } else {
            match &mut arena.slots[node.0].content {
                Content::Text(t) | Content::Comment(t) => *t = text.to_string(),
                Content::Element { .. } => {}
            }
        }
        arena.log.push(DomOp::SetTextContent { node: *node, text: text.to_string() });
    }

    fn set_attribute(&self, node: &NodeHandle, name: &str, value: &str) {
        self.call();
        let mut arena = self.arena.lock();
        if let Content::Element { attrs, .. } = &mut arena.slots[node.0].content {
            attrs.insert(name.to_string(), value.to_string());
        }
        arena.log.push(DomOp::SetAttribute {
            node: *node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&self, node: &NodeHandle, name: &str) {
        self.call();
        let mut arena = self.arena.lock();
        if let Content::Element { attrs, .. } = &mut arena.slots[node.0].content {
            attrs.shift_remove(name);
        }
        arena.log.push(DomOp::RemoveAttribute { node: *node, name: name.to_string() });
    }

    fn get_attribute(&self, node: &NodeHandle, name: &str) -> Option<String> {
        self.call();
        self.attribute(*node, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_moves_nodes() {
        let dom = MemoryDom::new();
        let root = dom.root("ul");
        let a = dom.create_element("li");
        let b = dom.create_element("li");
        dom.append_child(&root, &a);
        dom.append_child(&root, &b);

        dom.insert_before(&root, &b, Some(&a));
        assert_eq!(dom.children(root), vec![b, a]);
        assert_eq!(dom.next_sibling(&b), Some(a));
        assert_eq!(dom.next_sibling(&a), None);

        dom.remove_child(&root, &b);
        assert_eq!(dom.children(root), vec![a]);
        assert_eq!(dom.parent(b), None);
    }

    #[test]
    fn text_content_replaces_children() {
        let dom = MemoryDom::new();
        let p = dom.root("p");
        let b = dom.create_element("b");
        dom.append_child(&p, &b);

        dom.set_text_content(&p, "plain");
        assert_eq!(dom.to_html(p), "<p>plain</p>");
        assert_eq!(dom.parent(b), None);

        dom.set_text_content(&p, "");
        assert_eq!(dom.to_html(p), "<p></p>");
    }

    #[test]
    fn reads_are_counted_but_not_logged() {
        let dom = MemoryDom::new();
        let div = dom.root("div");
        dom.set_attribute(&div, "id", "x");
        assert_eq!(dom.get_attribute(&div, "id").as_deref(), Some("x"));
        assert_eq!(dom.tag_name(&div), "DIV");

        assert_eq!(dom.call_count(), 3);
        assert_eq!(dom.take_ops().len(), 1);

        dom.reset_log();
        assert_eq!(dom.call_count(), 0);
    }

    #[test]
    fn ops_serialize_with_tag() {
        let op = DomOp::RemoveAttribute {
            node: NodeHandle(3),
            name: "title".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "remove_attribute");
        assert_eq!(json["node"], 3);
    }
}
