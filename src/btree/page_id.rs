//! Page category tagging and the `BTreePageID` used to address any page
//! in a tree (leaf, internal, or the tree's root pointer record).
//!
//! Grounded on `examples/small-db-small-db/src/btree/page/page_category.rs`'s
//! fixed tag-per-category encoding.

use std::fmt;

use crate::page::PageId;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PageCategory {
    RootPointer,
    Internal,
    Leaf,
}

const ROOT_POINTER: u32 = 0;
const INTERNAL: u32 = 1;
const LEAF: u32 = 2;

impl PageCategory {
    pub fn to_tag(self) -> u32 {
        match self {
            PageCategory::RootPointer => ROOT_POINTER,
            PageCategory::Internal => INTERNAL,
            PageCategory::Leaf => LEAF,
        }
    }

    pub fn from_tag(tag: u32) -> Self {
        match tag {
            ROOT_POINTER => PageCategory::RootPointer,
            INTERNAL => PageCategory::Internal,
            LEAF => PageCategory::Leaf,
            other => panic!("invalid page category tag: {}", other),
        }
    }
}

/// Identifies a page within one tree: the raw buffer-pool `page_id` plus
/// the category it was formatted as, so callers never need to guess a
/// fetched page's layout.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct BTreePageID {
    pub category: PageCategory,
    pub page_id: PageId,
}

impl BTreePageID {
    pub fn new(category: PageCategory, page_id: PageId) -> Self {
        Self { category, page_id }
    }
}

impl fmt::Display for BTreePageID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.category, self.page_id)
    }
}
