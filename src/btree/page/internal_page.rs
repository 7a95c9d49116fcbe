//! Internal pages: `entries[0].key` is unused, `entries[i>0].key` is the
//! separator guarding `entries[i].child`.
//!
//! Grounded on spec.md §3's internal-node shape and
//! `original_source/src/storage/index/b_plus_tree.cpp`'s
//! `InsertIntoParent`/`Lookup` (rightmost-separator-`<=`-key child
//! selection).

use crate::btree::key::Key;
use crate::btree::page::BTreePage;
use crate::btree::page_id::{BTreePageID, PageCategory};
use crate::page::{PageId, INVALID_PAGE_ID};

pub struct InternalPage<K: Key> {
    page_id: PageId,
    parent_page_id: PageId,
    max_size: usize,
    /// `entries[0].0` is always `None` (unused separator slot).
    entries: Vec<(Option<K>, PageId)>,
}

impl<K: Key> InternalPage<K> {
    pub fn new(page_id: PageId, max_size: usize) -> Self {
        Self {
            page_id,
            parent_page_id: INVALID_PAGE_ID,
            max_size,
            entries: Vec::with_capacity(max_size + 1),
        }
    }

    /// Build a fresh root pointing at exactly two children, separated by
    /// `sep_key`, the shape `StartNewTree`'s promotion produces.
    pub fn new_root(page_id: PageId, max_size: usize, left: PageId, sep_key: K, right: PageId) -> Self {
        let mut page = Self::new(page_id, max_size);
        page.entries.push((None, left));
        page.entries.push((Some(sep_key), right));
        page
    }

    pub fn entries(&self) -> &[(Option<K>, PageId)] {
        &self.entries
    }

    pub fn children(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries.iter().map(|(_, child)| *child)
    }

    /// Find the child page to descend into for `key`: the rightmost
    /// entry whose separator is `<= key`, or `entries[0]` if none.
    pub fn lookup(&self, key: &K) -> PageId {
        let mut result = self.entries[0].1;
        for (sep, child) in &self.entries[1..] {
            match sep {
                Some(sep) if sep <= key => result = *child,
                _ => break,
            }
        }
        result
    }

    pub fn child_index(&self, child: PageId) -> Option<usize> {
        self.entries.iter().position(|(_, c)| *c == child)
    }

    /// Insert `(sep_key, new_child)` immediately after `after_child`.
    pub fn insert_after(&mut self, after_child: PageId, sep_key: K, new_child: PageId) {
        let pos = self
            .child_index(after_child)
            .expect("insert_after target child must exist");
        self.entries.insert(pos + 1, (Some(sep_key), new_child));
    }

    pub fn remove_child(&mut self, child: PageId) {
        if let Some(pos) = self.child_index(child) {
            self.entries.remove(pos);
        }
    }

    pub fn update_separator(&mut self, child: PageId, sep_key: K) {
        if let Some(pos) = self.child_index(child) {
            if pos > 0 {
                self.entries[pos].0 = Some(sep_key);
            }
        }
    }

    /// Split off the upper half, per spec.md §4.1's symmetric
    /// internal-node split. The caller promotes the returned separator
    /// key to the parent; it is stripped from the sibling's own
    /// `entries[0]`.
    pub fn split_off(&mut self, new_page_id: PageId) -> (K, InternalPage<K>) {
        let split_at = self.entries.len() / 2;
        let mut moved = self.entries.split_off(split_at);
        let promoted = moved[0].0.clone().expect("split point must carry a key");
        moved[0].0 = None;

        let mut sibling = InternalPage::new(new_page_id, self.max_size);
        sibling.parent_page_id = self.parent_page_id;
        sibling.entries = moved;
        (promoted, sibling)
    }

    /// Merge `other` into `self` (left absorbs right); `parent_sep`
    /// becomes the separator for `other`'s former first child. Leaves
    /// `other` empty — the caller still owns disposing of its page id.
    pub fn absorb(&mut self, parent_sep: K, other: &mut InternalPage<K>) {
        other.entries[0].0 = Some(parent_sep);
        self.entries.append(&mut other.entries);
    }

    /// Move this page's first child (with `parent_sep` as its new
    /// separator in `left`) onto the end of `left`; returns the new
    /// separator for this page's now-first child.
    pub fn shift_first_to(&mut self, left: &mut InternalPage<K>, parent_sep: K) -> K {
        let (_, child) = self.entries.remove(0);
        left.entries.push((Some(parent_sep), child));
        let new_sep = self.entries[0].0.clone().unwrap();
        self.entries[0].0 = None;
        new_sep
    }

    /// Move this page's last child onto the front of `right`. Returns
    /// the key that separated the moved child from this page's
    /// remainder — the caller's new parent separator between this page
    /// and `right`.
    pub fn shift_last_to(&mut self, right: &mut InternalPage<K>, parent_sep: K) -> K {
        let (sep, child) = self.entries.pop().unwrap();
        let new_parent_sep = sep.expect("non-first entries always carry a key");
        right.entries[0].0 = Some(parent_sep);
        right.entries.insert(0, (None, child));
        new_parent_sep
    }
}

impl<K: Key> BTreePage for InternalPage<K> {
    fn page_id(&self) -> BTreePageID {
        BTreePageID::new(PageCategory::Internal, self.page_id)
    }

    fn parent_page_id(&self) -> BTreePageID {
        BTreePageID::new(PageCategory::Internal, self.parent_page_id)
    }

    fn set_parent_page_id(&mut self, parent: BTreePageID) {
        self.parent_page_id = parent.page_id;
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn min_size(&self) -> usize {
        (self.max_size + 1) / 2
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
    fn lookup_picks_rightmost_separator_leq_key() {
        let mut page: InternalPage<Key8> = InternalPage::new(1, 4);
        page.entries.push((None, 10));
        page.entries.push((Some(k(5)), 20));
        page.entries.push((Some(k(10)), 30));

        assert_eq!(page.lookup(&k(1)), 10);
        assert_eq!(page.lookup(&k(5)), 20);
        assert_eq!(page.lookup(&k(7)), 20);
        assert_eq!(page.lookup(&k(10)), 30);
        assert_eq!(page.lookup(&k(100)), 30);
    }

    #[test]
    fn insert_after_places_new_child_correctly() {
        let mut page: InternalPage<Key8> = InternalPage::new(1, 4);
        page.entries.push((None, 10));
        page.insert_after(10, k(5), 20);
        assert_eq!(page.entries().len(), 2);
        assert_eq!(page.lookup(&k(5)), 20);
    }

    #[test]
    fn split_off_promotes_and_strips_separator() {
        let mut page: InternalPage<Key8> = InternalPage::new(1, 5);
        page.entries.push((None, 10));
        page.entries.push((Some(k(1)), 11));
        page.entries.push((Some(k(2)), 12));
        page.entries.push((Some(k(3)), 13));

        let (promoted, sibling) = page.split_off(2);
        assert_eq!(promoted.to_i64(), 2);
        assert_eq!(sibling.entries()[0].0, None);
        assert_eq!(page.size() + sibling.size(), 4);
    }
}
