pub mod lock_manager;
pub mod transaction;
pub mod wait_for_graph;

pub use lock_manager::{LockManager, LockMode};
pub use transaction::{IsolationLevel, Transaction, TransactionId, TransactionState};
