pub mod delete;
pub mod index;
pub mod insert;
pub mod iterator;
pub mod key;
pub mod page;
pub mod page_id;

pub use index::BTreeIndex;
pub use iterator::BTreeIterator;
pub use key::Key;
