pub mod buffer_pool;
pub mod db;
pub mod error;
pub mod page;
pub mod rid;
pub mod replacer;
pub mod util;

pub mod btree;
pub mod txn;

pub use btree::{BTreeIndex, BTreeIterator, Key};
pub use error::{Error, ErrorKind, Result, VoidResult};
pub use txn::{IsolationLevel, LockManager, LockMode, Transaction, TransactionId, TransactionState};
