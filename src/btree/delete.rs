//! Write path: `Remove`, with coalesce/redistribute rebalancing and
//! `AdjustRoot`.
//!
//! Grounded on `examples/small-db-small-db/src/btree/table/table/
//! delete.rs`'s recursive descent plus sibling selection, and
//! `original_source/src/storage/index/b_plus_tree.cpp`'s
//! `CoalesceOrRedistribute`/`Coalesce`/`Redistribute`/`AdjustRoot`: fetch
//! the left sibling when one exists (`index > 0`), else the right one;
//! coalesce (left absorbs right) when the combined size still fits in
//! `max_size`, else shift one entry across and fix the parent separator.

use log::debug;

use crate::btree::index::BTreeIndex;
use crate::btree::key::Key;
use crate::btree::page::{BTreePage, InternalPage, LeafPage, Node};
use crate::btree::page_id::{BTreePageID, PageCategory};
use crate::error::VoidResult;
use crate::page::{PageId, INVALID_PAGE_ID};
use crate::txn::Transaction;
use crate::util::HandyRwLock;

impl<K: Key> BTreeIndex<K> {
    pub fn remove(&self, key: &K, txn: &Transaction) -> VoidResult {
        if self.is_empty() {
            return Ok(());
        }
        let root = self.fetch(self.root_page_id());
        self.remove_from_node(root, key, txn);
        self.adjust_root(txn);
        txn.take_page_set();
        let deleted = txn.take_deleted_page_set();
        if !deleted.is_empty() {
            debug!("remove: disposed of pages {:?}", deleted);
        }
        Ok(())
    }

    fn is_safe_for_delete(node: &Node<K>) -> bool {
        match node {
            Node::Leaf(p) => p.rl().size() > p.rl().min_size(),
            Node::Internal(p) => p.rl().size() > p.rl().min_size(),
        }
    }

    fn underflowed(node: &Node<K>) -> bool {
        match node {
            Node::Leaf(p) => p.rl().size() < p.rl().min_size(),
            Node::Internal(p) => p.rl().size() < p.rl().min_size(),
        }
    }

    fn remove_from_node(&self, node: Node<K>, key: &K, txn: &Transaction) {
        match node {
            Node::Leaf(leaf_arc) => {
                let mut guard = leaf_arc.wl();
                txn.add_into_page_set(guard.page_id());
                if let Some(rid) = guard.get(key) {
                    guard.remove(key, rid);
                }
            }
            Node::Internal(int_arc) => {
                let mut guard = int_arc.wl();
                txn.add_into_page_set(guard.page_id());
                let child_id = guard.lookup(key);
                let child = self.fetch(BTreePageID::new(self.category_of(child_id), child_id));

                if Self::is_safe_for_delete(&child) {
                    drop(guard);
                    self.remove_from_node(child, key, txn);
                    return;
                }

                self.remove_from_node(child.clone(), key, txn);
                if Self::underflowed(&child) {
                    self.rebalance(&mut guard, child_id, &child, txn);
                }
            }
        }
    }

    /// `guard` is the deficient child's parent, already write-latched.
    fn rebalance(&self, parent: &mut InternalPage<K>, child_id: PageId, child: &Node<K>, txn: &Transaction) {
        let index = parent
            .child_index(child_id)
            .expect("deficient child must be one of parent's children");

        let (sibling_id, child_is_left) = if index > 0 {
            (parent.entries()[index - 1].1, false)
        } else {
            (parent.entries()[index + 1].1, true)
        };
        let sibling = self.fetch(BTreePageID::new(self.category_of(sibling_id), sibling_id));

        match (child, &sibling) {
            (Node::Leaf(child_leaf), Node::Leaf(sibling_leaf)) => {
                let combined = child_leaf.rl().size() + sibling_leaf.rl().size();
                if combined <= child_leaf.rl().max_size() {
                    let (left, right, removed_id) = if child_is_left {
                        (child_leaf, sibling_leaf, sibling_id)
                    } else {
                        (sibling_leaf, child_leaf, child_id)
                    };
                    let mut left_guard = left.wl();
                    let mut right_guard = right.wl();
                    left_guard.absorb(&mut right_guard);
                    drop(left_guard);
                    drop(right_guard);
                    parent.remove_child(removed_id);
                    self.delete_node(removed_id);
                    txn.add_into_deleted_page_set(removed_id);
                } else if child_is_left {
                    let sep = sibling_leaf.wl().shift_first_to(&mut child_leaf.wl());
                    parent.update_separator(sibling_id, sep);
                } else {
                    let sep = sibling_leaf.wl().shift_last_to(&mut child_leaf.wl());
                    parent.update_separator(child_id, sep);
                }
            }
            (Node::Internal(child_int), Node::Internal(sibling_int)) => {
                let combined = child_int.rl().size() + sibling_int.rl().size();
                if combined <= child_int.rl().max_size() {
                    let (left_id, left, right, parent_sep) = if child_is_left {
                        let sep = parent
                            .entries()
                            .iter()
                            .find(|(_, c)| *c == sibling_id)
                            .and_then(|(k, _)| k.clone())
                            .expect("sibling must have a separator");
                        (child_id, child_int, sibling_int, sep)
                    } else {
                        let sep = parent
                            .entries()
                            .iter()
                            .find(|(_, c)| *c == child_id)
                            .and_then(|(k, _)| k.clone())
                            .expect("child must have a separator");
                        (sibling_id, sibling_int, child_int, sep)
                    };
                    let removed_id = right.rl().page_id().page_id;
                    let mut left_guard = left.wl();
                    let mut right_guard = right.wl();
                    let moved_children: Vec<PageId> = right_guard.children().collect();
                    left_guard.absorb(parent_sep, &mut right_guard);
                    drop(left_guard);
                    drop(right_guard);
                    let left_btree_id = BTreePageID::new(PageCategory::Internal, left_id);
                    for cid in moved_children {
                        self.fetch(BTreePageID::new(self.category_of(cid), cid))
                            .set_parent_page_id(left_btree_id);
                    }
                    parent.remove_child(removed_id);
                    self.delete_node(removed_id);
                    txn.add_into_deleted_page_set(removed_id);
                } else if child_is_left {
                    let parent_sep = parent
                        .entries()
                        .iter()
                        .find(|(_, c)| *c == sibling_id)
                        .and_then(|(k, _)| k.clone())
                        .expect("sibling must have a separator");
                    let moved_first_child = sibling_int.rl().entries()[0].1;
                    let new_sep =
                        sibling_int.wl().shift_first_to(&mut child_int.wl(), parent_sep);
                    self.fetch(BTreePageID::new(
                        self.category_of(moved_first_child),
                        moved_first_child,
                    ))
                    .set_parent_page_id(BTreePageID::new(PageCategory::Internal, child_id));
                    parent.update_separator(sibling_id, new_sep);
                } else {
                    let parent_sep = parent
                        .entries()
                        .iter()
                        .find(|(_, c)| *c == child_id)
                        .and_then(|(k, _)| k.clone())
                        .expect("child must have a separator");
                    let moved_last_child = sibling_int.rl().entries().last().unwrap().1;
                    let new_sep = sibling_int
                        .wl()
                        .shift_last_to(&mut child_int.wl(), parent_sep);
                    self.fetch(BTreePageID::new(
                        self.category_of(moved_last_child),
                        moved_last_child,
                    ))
                    .set_parent_page_id(BTreePageID::new(PageCategory::Internal, child_id));
                    parent.update_separator(child_id, new_sep);
                }
            }
            _ => unreachable!("sibling pages at the same level always share a variant"),
        }
    }

    fn adjust_root(&self, txn: &Transaction) {
        let root_id = self.root_page_id();
        match self.fetch(root_id) {
            Node::Leaf(leaf) => {
                if leaf.rl().size() == 0 {
                    self.delete_node(root_id.page_id);
                    txn.add_into_deleted_page_set(root_id.page_id);
                    *self.root_page_id.wl() = BTreePageID::new(PageCategory::Leaf, INVALID_PAGE_ID);
                }
            }
            Node::Internal(internal) => {
                let size = internal.rl().size();
                if size == 1 {
                    let only_child = internal.rl().entries()[0].1;
                    let child_category = self.category_of(only_child);
                    let no_parent = BTreePageID::new(PageCategory::Internal, INVALID_PAGE_ID);
                    self.fetch(BTreePageID::new(child_category, only_child))
                        .set_parent_page_id(no_parent);
                    self.delete_node(root_id.page_id);
                    txn.add_into_deleted_page_set(root_id.page_id);
                    *self.root_page_id.wl() = BTreePageID::new(child_category, only_child);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::key::Key8;
    use crate::rid::Rid;
    use crate::txn::IsolationLevel;

    fn k(v: i64) -> Key8 {
        Key8::from_i64(v)
    }

    /// spec.md §8 scenario 2: removing down to an empty tree collapses
    /// the root.
    #[test]
    fn removing_everything_collapses_root() {
        let tree: BTreeIndex<Key8> = BTreeIndex::new(3, 3);
        let txn = Transaction::new(IsolationLevel::ReadCommitted);
        for i in 1..=4 {
            tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
        }
        for i in 1..=4 {
            tree.remove(&k(i), &txn).unwrap();
        }
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_of_absent_key_is_noop() {
        let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
        let txn = Transaction::new(IsolationLevel::ReadCommitted);
        tree.insert(k(1), Rid::new(1, 0), &txn).unwrap();
        tree.remove(&k(99), &txn).unwrap();
        assert_eq!(tree.get_value(&k(1)), Some(Rid::new(1, 0)));
    }

    #[test]
    fn insert_remove_round_trip_restores_key_set() {
        let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
        let txn = Transaction::new(IsolationLevel::ReadCommitted);
        for i in 0..50 {
            tree.insert(k(i), Rid::new(i as u32, 0), &txn).unwrap();
        }
        for i in 0..50 {
            if i % 2 == 0 {
                tree.remove(&k(i), &txn).unwrap();
            }
        }
        tree.check_integrity();
        for i in 0..50 {
            let expected = if i % 2 == 0 {
                None
            } else {
                Some(Rid::new(i as u32, 0))
            };
            assert_eq!(tree.get_value(&k(i)), expected);
        }
    }
}
