//! The concurrent B+Tree index itself: page directory, root pointer, and
//! the read path (`GetValue`). Write-path operations live in
//! `insert.rs`/`delete.rs`, both `impl<K> BTreeIndex<K>` blocks over the
//! type defined here.
//!
//! Grounded on `examples/small-db-small-db/src/btree/table/table.rs`'s
//! `BTreeTable` (the tree-wide root latch, `find_leaf_page`,
//! `check_integrity`) and `original_source/src/storage/index/
//! b_plus_tree.cpp`'s `GetValue` (single-leaf read latch, no ancestor
//! latches retained once the child is fetched).

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use crate::btree::key::Key;
use crate::btree::page::{BTreePage, InternalPage, LeafPage, Node};
use crate::btree::page_id::{BTreePageID, PageCategory};
use crate::page::{PageId, INVALID_PAGE_ID};
use crate::rid::Rid;
use crate::util::HandyRwLock;

/// One tree's full page directory plus its root pointer. Acts as its
/// own minimal buffer pool (see DESIGN.md for why this crate doesn't
/// thread every node through the byte-oriented `BufferPoolManager`):
/// nodes live for the tree's lifetime, so there is no eviction to model
/// beyond what the standalone `replacer`/`buffer_pool` modules already
/// demonstrate and test in isolation.
pub struct BTreeIndex<K: Key> {
    pub(crate) leaf_max_size: usize,
    pub(crate) internal_max_size: usize,
    pub(crate) root_page_id: RwLock<BTreePageID>,
    pub(crate) nodes: RwLock<HashMap<PageId, Node<K>>>,
    next_page_id: AtomicI32,
}

impl<K: Key> BTreeIndex<K> {
    pub fn new(leaf_max_size: usize, internal_max_size: usize) -> Self {
        Self {
            leaf_max_size,
            internal_max_size,
            root_page_id: RwLock::new(BTreePageID::new(PageCategory::Leaf, INVALID_PAGE_ID)),
            nodes: RwLock::new(HashMap::new()),
            next_page_id: AtomicI32::new(0),
        }
    }

    pub fn root_page_id(&self) -> BTreePageID {
        *self.root_page_id.rl()
    }

    pub(crate) fn alloc_page_id(&self) -> PageId {
        self.next_page_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn new_leaf(&self) -> Arc<RwLock<LeafPage<K>>> {
        let page_id = self.alloc_page_id();
        let page = Arc::new(RwLock::new(LeafPage::new(page_id, self.leaf_max_size)));
        self.nodes
            .wl()
            .insert(page_id, Node::Leaf(page.clone()));
        page
    }

    pub(crate) fn new_internal(&self) -> Arc<RwLock<InternalPage<K>>> {
        let page_id = self.alloc_page_id();
        let page = Arc::new(RwLock::new(InternalPage::new(
            page_id,
            self.internal_max_size,
        )));
        self.nodes
            .wl()
            .insert(page_id, Node::Internal(page.clone()));
        page
    }

    pub(crate) fn register_internal(&self, page_id: PageId, page: Arc<RwLock<InternalPage<K>>>) {
        self.nodes.wl().insert(page_id, Node::Internal(page));
    }

    pub(crate) fn fetch(&self, id: BTreePageID) -> Node<K> {
        self.nodes
            .rl()
            .get(&id.page_id)
            .unwrap_or_else(|| panic!("page {} not resident", id))
            .clone()
    }

    pub(crate) fn delete_node(&self, page_id: PageId) {
        self.nodes.wl().remove(&page_id);
    }

    pub fn is_empty(&self) -> bool {
        self.root_page_id().page_id == INVALID_PAGE_ID
    }

    /// Descend from the root to the leaf that would contain `key`,
    /// holding only the current page's read latch at any instant —
    /// `original_source`'s `GetValue` releases the parent's latch as
    /// soon as the child is fetched, since reads never need to undo a
    /// split/merge.
    fn find_leaf_read(&self, key: &K) -> Arc<RwLock<LeafPage<K>>> {
        let mut current = self.fetch(self.root_page_id());
        loop {
            match current {
                Node::Leaf(leaf) => return leaf,
                Node::Internal(internal) => {
                    let child_id = internal.rl().lookup(key);
                    let child = self.fetch(BTreePageID::new(
                        self.category_of(child_id),
                        child_id,
                    ));
                    current = child;
                }
            }
        }
    }

    pub(crate) fn category_of(&self, page_id: PageId) -> PageCategory {
        match self.nodes.rl().get(&page_id) {
            Some(Node::Leaf(_)) => PageCategory::Leaf,
            Some(Node::Internal(_)) => PageCategory::Internal,
            None => panic!("page {} not resident", page_id),
        }
    }

    pub fn get_value(&self, key: &K) -> Option<Rid> {
        if self.is_empty() {
            return None;
        }
        let leaf = self.find_leaf_read(key);
        let leaf = leaf.rl();
        leaf.get(key)
    }

    /// Walk the whole tree asserting spec.md §8's quantified invariants:
    /// every non-root node within `[min_size, max_size]`, leaf chain
    /// sorted and threaded, internal separators consistent with child
    /// contents. Test tooling only, the way `small-db::btree::table::
    /// BTreeTable::check_integrity` gates its own walk behind
    /// `#[cfg(test)]`.
    #[cfg(any(test, debug_assertions))]
    pub fn check_integrity(&self) {
        if self.is_empty() {
            return;
        }
        let root = self.fetch(self.root_page_id());
        self.check_node(&root, true, None, None);
    }

    #[cfg(any(test, debug_assertions))]
    fn check_node(&self, node: &Node<K>, is_root: bool, lower: Option<&K>, upper: Option<&K>) {
        match node {
            Node::Leaf(leaf) => {
                let leaf = leaf.rl();
                if !is_root {
                    assert!(
                        leaf.size() >= leaf.min_size(),
                        "leaf {} underflowed: size={} min={}",
                        leaf.page_id(),
                        leaf.size(),
                        leaf.min_size()
                    );
                }
                assert!(leaf.size() <= leaf.max_size());
                let mut prev: Option<&K> = None;
                for (k, _) in leaf.entries() {
                    if let Some(p) = prev {
                        assert!(p <= k, "leaf entries must be sorted");
                    }
                    if let Some(l) = lower {
                        assert!(k >= l);
                    }
                    if let Some(u) = upper {
                        assert!(k < u);
                    }
                    prev = Some(k);
                }
            }
            Node::Internal(internal) => {
                let internal = internal.rl();
                if !is_root {
                    assert!(internal.size() >= internal.min_size());
                } else {
                    assert!(internal.size() >= 2);
                }
                assert!(internal.size() <= internal.max_size());

                let entries = internal.entries();
                for (i, (sep, child_id)) in entries.iter().enumerate() {
                    let child = self.fetch(BTreePageID::new(self.category_of(*child_id), *child_id));
                    let child_lower = if i == 0 { lower } else { sep.as_ref() };
                    let child_upper = if i + 1 < entries.len() {
                        entries[i + 1].0.as_ref()
                    } else {
                        upper
                    };
                    self.check_node(&child, false, child_lower, child_upper);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::key::Key8;

    fn k(v: i64) -> Key8 {
        Key8::from_i64(v)
    }

    #[test]
    fn empty_tree_has_no_values() {
        let tree: BTreeIndex<Key8> = BTreeIndex::new(4, 4);
        assert_eq!(tree.get_value(&k(1)), None);
    }
}
