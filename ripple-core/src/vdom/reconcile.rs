//! Keyed Child Reconciliation
//!
//! # How Reconciliation Works
//!
//! Two cursors walk the old and the new child lists from both ends:
//!
//! 1. Matching starts are patched in place, as are matching ends.
//! 2. An old start matching the new end is patched and moved after the old
//!    end; an old end matching the new start is moved before the old start.
//!    This handles reversals and rotations with moves alone.
//! 3. Otherwise the new start is looked up by key among the remaining old
//!    children. A hit with the same selector is patched and moved, and its
//!    old slot is emptied. A miss is created fresh.
//! 4. Leftover new children are inserted, leftover old children removed.
//!
//! Unkeyed children match positionally through the end comparisons.
//!
//! Moves read the live node from the freshly patched child, which is where
//! a component placeholder's current root is recorded.

use std::collections::HashMap;

use super::ops::NodeOps;
use super::patch::{InsertQueue, Patcher};
use super::vnode::{same_vnode, Key, VNodeRef};
use crate::error::{Error, Result};

impl<O: NodeOps> Patcher<O> {
    pub(super) fn update_children(
        &self,
        parent: &O::Node,
        old_ch: &[VNodeRef<O::Node>],
        new_ch: &[VNodeRef<O::Node>],
        inserted: &mut InsertQueue<O::Node>,
    ) -> Result<()> {
        let ops = self.ops();
        // Moved-out entries become `None`.
        let mut old: Vec<Option<VNodeRef<O::Node>>> = old_ch.iter().cloned().map(Some).collect();

        // Cursors are half-open: `start..end`.
        let (mut old_start, mut old_end) = (0, old.len());
        let (mut new_start, mut new_end) = (0, new_ch.len());
        let mut key_index: Option<HashMap<Key, usize>> = None;

        while old_start < old_end && new_start < new_end {
            let Some(old_start_node) = old[old_start].clone() else {
                old_start += 1;
                continue;
            };
            let Some(old_end_node) = old[old_end - 1].clone() else {
                old_end -= 1;
                continue;
            };
            let new_start_node = &new_ch[new_start];
            let new_end_node = &new_ch[new_end - 1];

            if same_vnode(&*old_start_node, &**new_start_node) {
                self.patch_node(&old_start_node, new_start_node, inserted)?;
                old_start += 1;
                new_start += 1;
            } else if same_vnode(&*old_end_node, &**new_end_node) {
                self.patch_node(&old_end_node, new_end_node, inserted)?;
                old_end -= 1;
                new_end -= 1;
            } else if same_vnode(&*old_start_node, &**new_end_node) {
                // Moved right.
                self.patch_node(&old_start_node, new_end_node, inserted)?;
                let elm = live(new_end_node)?;
                let after = ops.next_sibling(&live(&old_end_node)?);
                ops.insert_before(parent, &elm, after.as_ref());
                old_start += 1;
                new_end -= 1;
            } else if same_vnode(&*old_end_node, &**new_start_node) {
                // Moved left.
                self.patch_node(&old_end_node, new_start_node, inserted)?;
                let elm = live(new_start_node)?;
                ops.insert_before(parent, &elm, Some(&live(&old_start_node)?));
                old_end -= 1;
                new_start += 1;
            } else {
                let index = key_index.get_or_insert_with(|| build_key_index(&old, old_start, old_end));
                let matched = new_start_node
                    .key()
                    .and_then(|key| index.get(key).copied())
                    .filter(|i| (old_start..old_end).contains(i))
                    .and_then(|i| old[i].clone().map(|node| (i, node)))
                    .filter(|(_, node)| node.sel() == new_start_node.sel());

                let before = live(&old_start_node)?;
                match matched {
                    Some((i, to_move)) => {
                        self.patch_node(&to_move, new_start_node, inserted)?;
                        old[i] = None;
                        ops.insert_before(parent, &live(new_start_node)?, Some(&before));
                    }
                    None => {
                        let elm = self.create_elm(new_start_node, inserted)?;
                        ops.insert_before(parent, &elm, Some(&before));
                    }
                }
                new_start += 1;
            }
        }

        if old_start >= old_end {
            if new_start < new_end {
                let before = new_ch.get(new_end).and_then(|node| node.elm());
                self.add_vnodes(parent, before.as_ref(), &new_ch[new_start..new_end], inserted)?;
            }
        } else if new_start >= new_end {
            self.remove_vnodes(parent, old[old_start..old_end].iter().flatten())?;
        }
        Ok(())
    }
}

fn live<N: Clone>(vnode: &VNodeRef<N>) -> Result<N> {
    vnode.elm().ok_or(Error::MissingLiveNode("reconciled child"))
}

fn build_key_index<N>(old: &[Option<VNodeRef<N>>], start: usize, end: usize) -> HashMap<Key, usize> {
    let mut index = HashMap::new();
    for (i, node) in old.iter().enumerate().take(end).skip(start) {
        if let Some(key) = node.as_ref().and_then(|node| node.key()) {
            index.insert(key.clone(), i);
        }
    }
    index
}
