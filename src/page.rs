//! Buffer pool page handle: fixed-size raw bytes plus the R/W latch pair
//! B+Tree descents crab across.
//!
//! Grounded on spec.md §6's `Page*` contract (`GetData`/`GetPageId`/
//! `R/WLatch`/`R/WUnlatch`) and the way `small-db::btree::page_cache`
//! wraps stored bytes behind a page-id-keyed map with its own latch per
//! entry, rather than one global lock over the pool.

use std::sync::{Arc, RwLock};

use crate::util::HandyRwLock;

pub const PAGE_SIZE: usize = 4096;

pub type PageId = i32;

/// Sentinel meaning "no page" — an empty tree's `root_page_id`, or a leaf
/// at the end of its chain.
pub const INVALID_PAGE_ID: PageId = -1;

/// A pinned buffer frame: raw bytes plus the latch descents acquire
/// before reading or mutating them. Cloning a `PageRef` clones the
/// `Arc`, not the bytes — every holder of a `PageRef` for the same
/// `page_id` shares one latch.
pub type PageRef = Arc<Page>;

#[derive(Debug)]
pub struct Page {
    page_id: PageId,
    data: RwLock<Vec<u8>>,
}

impl Page {
    pub fn new(page_id: PageId) -> PageRef {
        Arc::new(Self {
            page_id,
            data: RwLock::new(vec![0u8; PAGE_SIZE]),
        })
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Acquire the read latch and run `f` over the page bytes.
    pub fn with_read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.data.rl())
    }

    /// Acquire the write latch and run `f` over the page bytes.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.data.wl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_page_is_zeroed() {
        let page = Page::new(1);
        page.with_read(|data| assert!(data.iter().all(|b| *b == 0)));
    }

    #[test]
    fn write_then_read_observes_mutation() {
        let page = Page::new(1);
        page.with_write(|data| data[0] = 42);
        page.with_read(|data| assert_eq!(data[0], 42));
    }
}
