//! Class binding.
//!
//! The live `class` attribute is the selector's classes followed by every
//! `data.class` entry switched on.

use super::super::hooks::Module;
use super::super::ops::NodeOps;
use super::super::vnode::{parse_selector, VNode};

pub fn class_module<O: NodeOps>() -> Module<O> {
    Module::new("class")
        .on_create(|ops: &O, _: &VNode<O::Node>, vnode: &VNode<O::Node>| {
            if vnode.data().class.is_empty() {
                return;
            }
            let Some(elm) = vnode.elm() else {
                return;
            };
            let class = class_string(vnode);
            if ops.get_attribute(&elm, "class").unwrap_or_default() != class {
                ops.set_attribute(&elm, "class", &class);
            }
        })
        .on_update(|ops: &O, old: &VNode<O::Node>, vnode: &VNode<O::Node>| {
            if old.data().class.is_empty() && vnode.data().class.is_empty() {
                return;
            }
            let Some(elm) = vnode.elm() else {
                return;
            };
            let class = class_string(vnode);
            if class != class_string(old) {
                if class.is_empty() {
                    ops.remove_attribute(&elm, "class");
                } else {
                    ops.set_attribute(&elm, "class", &class);
                }
            }
        })
}

fn class_string<N>(vnode: &VNode<N>) -> String {
    let selector = parse_selector(vnode.sel().unwrap_or_default());
    let mut names: Vec<&str> = selector.classes;
    for (name, on) in &vnode.data().class {
        if *on && !names.contains(&name.as_str()) {
            names.push(name);
        }
    }
    names.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vdom::{MemoryDom, NodeHandle, PatchTarget, Patcher};
    use std::sync::Arc;

    type Node = VNode<NodeHandle>;

    #[test]
    fn toggles_classes() {
        let dom = Arc::new(MemoryDom::new());
        let patcher = Patcher::new(dom.clone(), [class_module()]);

        let v1 = Node::element("li.item").class("active", true).class("done", false).build();
        let root = patcher.create_root(&v1).unwrap();
        assert_eq!(dom.attribute(root, "class").as_deref(), Some("item active"));

        let v2 = Node::element("li.item").class("active", false).class("done", true).build();
        patcher.patch(PatchTarget::Tree(v1), &v2).unwrap();
        assert_eq!(dom.attribute(root, "class").as_deref(), Some("item done"));

        dom.take_ops();
        let v3 = Node::element("li.item").class("active", false).class("done", true).build();
        patcher.patch(PatchTarget::Tree(v2), &v3).unwrap();
        assert!(dom.take_ops().is_empty());
    }

    #[test]
    fn selector_classes_alone_need_no_work() {
        let dom = Arc::new(MemoryDom::new());
        let patcher = Patcher::new(dom.clone(), [class_module()]);
        let root = patcher.create_root(&Node::element("p.a.b").build()).unwrap();
        assert_eq!(dom.attribute(root, "class").as_deref(), Some("a b"));
        assert_eq!(dom.take_ops().len(), 2);
    }
}
