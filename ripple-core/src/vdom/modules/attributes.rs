//! Attribute binding.

use super::super::hooks::Module;
use super::super::ops::NodeOps;
use super::super::vnode::VNode;

/// Keeps `data.attrs` in sync with the live node's attributes.
pub fn attributes_module<O: NodeOps>() -> Module<O> {
    Module::new("attributes")
        .on_create(update_attrs::<O>)
        .on_update(update_attrs::<O>)
}

fn update_attrs<O: NodeOps>(ops: &O, old: &VNode<O::Node>, vnode: &VNode<O::Node>) {
    let (old_attrs, attrs) = (&old.data().attrs, &vnode.data().attrs);
    if old_attrs.is_empty() && attrs.is_empty() {
        return;
    }
    let Some(elm) = vnode.elm() else {
        return;
    };

    for (name, value) in attrs {
        if old_attrs.get(name) != Some(value) {
            ops.set_attribute(&elm, name, value);
        }
    }
    for name in old_attrs.keys() {
        if !attrs.contains_key(name) {
            ops.remove_attribute(&elm, name);
        }
    }
}
