//! Node Operations
//!
//! The patch engine never touches a live tree directly. Every mutation and
//! inspection goes through a [`NodeOps`] implementation supplied by the
//! host, which keeps the engine independent of any particular platform.

use std::fmt::Debug;

/// The primitive operations on a live tree.
///
/// `Node` is a cheap handle to one live node. Two handles compare equal when
/// they refer to the same node.
pub trait NodeOps: Send + Sync + 'static {
    type Node: Clone + PartialEq + Debug + Send + Sync + 'static;

    fn create_element(&self, tag: &str) -> Self::Node;

    fn create_element_ns(&self, namespace: &str, tag: &str) -> Self::Node;

    fn create_text_node(&self, text: &str) -> Self::Node;

    fn create_comment(&self, text: &str) -> Self::Node;

    /// Insert `node` into `parent` before `reference`, or at the end when
    /// `reference` is `None`. A node that already has a parent is moved.
    fn insert_before(&self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);

    fn remove_child(&self, parent: &Self::Node, child: &Self::Node);

    fn append_child(&self, parent: &Self::Node, child: &Self::Node);

    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn tag_name(&self, node: &Self::Node) -> String;

    /// Replace the node's content with a single text, or nothing when
    /// `text` is empty.
    fn set_text_content(&self, node: &Self::Node, text: &str);

    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&self, node: &Self::Node, name: &str);

    fn get_attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
}
