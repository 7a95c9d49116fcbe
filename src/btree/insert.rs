//! Write path: `Insert`, with latch-crabbing descent and leaf/internal
//! splitting.
//!
//! Grounded on `examples/small-db-small-db/src/btree/table/table/
//! insert.rs`'s recursive descent (there built around an
//! `Action::Release` callback; here expressed as ordinary recursion,
//! since each stack frame's `RwLockWriteGuard` already drops at the
//! right point without an explicit callback) and
//! `original_source/src/storage/index/b_plus_tree.cpp`'s `InsertIntoLeaf`
//! / `InsertIntoParent` / `Split` (move-half-count split, safe-child
//! check before releasing the ancestor latch).

use std::sync::{Arc, RwLock};

use log::debug;

use crate::btree::index::BTreeIndex;
use crate::btree::key::Key;
use crate::btree::page::{BTreePage, InternalPage, Node};
use crate::btree::page_id::{BTreePageID, PageCategory};
use crate::error::Result;
use crate::page::PageId;
use crate::rid::Rid;
use crate::txn::Transaction;
use crate::util::HandyRwLock;

/// Outcome of descending into a single node during an insert: either the
/// key was already present (nothing changed), the insert landed cleanly,
/// or the node overflowed and must be split, with the caller (its parent)
/// linking the new sibling in.
enum InsertOutcome<K> {
    Duplicate,
    Done,
    Split(K, PageId),
}

impl<K: Key> BTreeIndex<K> {
    /// Inserts `key` with `rid`. Returns `Ok(false)` without modifying the
    /// tree if `key` is already present — keys are unique within the tree
    /// — otherwise inserts and returns `Ok(true)`.
    pub fn insert(&self, key: K, rid: Rid, txn: &Transaction) -> Result<bool> {
        if self.is_empty() {
            debug!("insert: starting new tree");
            self.start_new_tree(key, rid, txn);
            txn.take_page_set();
            return Ok(true);
        }

        let root = self.fetch(self.root_page_id());
        let outcome = self.insert_into_node(root, true, &key, rid, txn)?;
        let inserted = match outcome {
            InsertOutcome::Duplicate => {
                debug!("insert: rejected duplicate key");
                false
            }
            InsertOutcome::Done => true,
            InsertOutcome::Split(sep_key, new_child) => {
                debug!("insert: root split, promoting new child {}", new_child);
                self.create_new_root(sep_key, new_child);
                true
            }
        };
        txn.take_page_set();
        Ok(inserted)
    }

    fn start_new_tree(&self, key: K, rid: Rid, txn: &Transaction) {
        let leaf = self.new_leaf();
        {
            let mut guard = leaf.wl();
            guard.insert(key, rid);
            txn.add_into_page_set(guard.page_id());
        }
        let page_id = leaf.rl().page_id();
        *self.root_page_id.wl() = page_id;
    }

    fn create_new_root(&self, sep_key: K, new_child: PageId) {
        let old_root_id = self.root_page_id();
        let new_root_id = self.alloc_page_id();
        let new_root = InternalPage::new_root(
            new_root_id,
            self.internal_max_size,
            old_root_id.page_id,
            sep_key,
            new_child,
        );
        let new_root_btree_id = BTreePageID::new(PageCategory::Internal, new_root_id);

        self.fetch(old_root_id).set_parent_page_id(new_root_btree_id);
        self.fetch(BTreePageID::new(self.category_of(new_child), new_child))
            .set_parent_page_id(new_root_btree_id);

        let new_root_arc = Arc::new(RwLock::new(new_root));
        self.register_internal(new_root_id, new_root_arc);
        *self.root_page_id.wl() = new_root_btree_id;
    }

    fn is_safe_for_insert(node: &Node<K>) -> bool {
        match node {
            Node::Leaf(p) => p.rl().is_safe_for_insert(),
            Node::Internal(p) => p.rl().is_safe_for_insert(),
        }
    }

    fn insert_into_node(
        &self,
        node: Node<K>,
        _is_root: bool,
        key: &K,
        rid: Rid,
        txn: &Transaction,
    ) -> Result<InsertOutcome<K>> {
        match node {
            Node::Leaf(leaf_arc) => {
                let mut guard = leaf_arc.wl();
                txn.add_into_page_set(guard.page_id());
                if guard.insert(key.clone(), rid).is_none() {
                    return Ok(InsertOutcome::Duplicate);
                }

                if guard.size() <= guard.max_size() {
                    return Ok(InsertOutcome::Done);
                }

                let new_id = self.alloc_page_id();
                let sibling = guard.split_off(new_id);
                let sep = sibling.first_key().cloned().expect("split produces entries");
                self.nodes
                    .wl()
                    .insert(new_id, Node::Leaf(Arc::new(RwLock::new(sibling))));
                Ok(InsertOutcome::Split(sep, new_id))
            }
            Node::Internal(int_arc) => {
                let mut guard = int_arc.wl();
                txn.add_into_page_set(guard.page_id());
                let child_id = guard.lookup(key);
                let child = self.fetch(BTreePageID::new(self.category_of(child_id), child_id));

                if Self::is_safe_for_insert(&child) {
                    drop(guard);
                    return self.insert_into_node(child, false, key, rid, txn);
                }

                let result = self.insert_into_node(child, false, key, rid, txn)?;
                match result {
                    InsertOutcome::Duplicate => Ok(InsertOutcome::Duplicate),
                    InsertOutcome::Done => Ok(InsertOutcome::Done),
                    InsertOutcome::Split(sep_key, new_child_id) => {
                        guard.insert_after(child_id, sep_key, new_child_id);
                        self.fetch(BTreePageID::new(
                            self.category_of(new_child_id),
                            new_child_id,
                        ))
                        .set_parent_page_id(guard.page_id());

                        if guard.size() <= guard.max_size() {
                            return Ok(InsertOutcome::Done);
                        }

                        let new_id = self.alloc_page_id();
                        let (promoted, sibling) = guard.split_off(new_id);
                        let sibling_arc = Arc::new(RwLock::new(sibling));
                        let sibling_children: Vec<PageId> =
                            sibling_arc.rl().children().collect();
                        let sibling_btree_id = BTreePageID::new(PageCategory::Internal, new_id);
                        for cid in sibling_children {
                            self.fetch(BTreePageID::new(self.category_of(cid), cid))
                                .set_parent_page_id(sibling_btree_id);
                        }
                        self.register_internal(new_id, sibling_arc);
                        Ok(InsertOutcome::Split(promoted, new_id))
                    }
                }
            }
        }
    }
}
