//! Virtual Tree
//!
//! Renders produce immutable virtual trees ([`VNode`]); the [`Patcher`]
//! turns the difference between two trees into the minimal set of
//! [`NodeOps`] calls on the live tree.
//!
//! # Layout
//!
//! - [`vnode`](VNode): the node model, selectors and keys
//! - [`Patcher`]: patching, creation and removal
//! - keyed child reconciliation, used by the patcher
//! - [`Module`]: hooks that extend the patcher, with two built in
//! - [`MemoryDom`]: an in-memory host for tests and benchmarks

mod hooks;
mod memory;
mod modules;
mod ops;
mod patch;
mod reconcile;
mod vnode;

pub use hooks::{Hook, HookKind, HookRegistry, Module, RemoveCallback};
pub use memory::{DomOp, MemoryDom, NodeHandle};
pub use modules::{attributes_module, class_module};
pub use ops::NodeOps;
pub use patch::{PatchTarget, Patcher};
pub use vnode::{
    h, parse_selector, same_vnode, ComponentHost, Key, Selector, VNode, VNodeBuilder, VNodeData, VNodeHook,
    VNodeHooks, VNodeKind, VNodePairHook, VNodeRef, VNodeRemoveHook, COMMENT_SELECTOR,
};
