//! Process-wide handles to the buffer pool, lock manager, and replacer.
//!
//! Grounded on `small-db::database::Database`'s `OnceCell`-backed
//! `global()` accessor, generalized from a single catalog+buffer-pool
//! pair to the three ambient subsystems this crate actually runs:
//! `BufferPoolManager`, `LockManager`, `LruReplacer`.

use std::sync::Arc;

use log::info;
use once_cell::sync::OnceCell;

use crate::buffer_pool::InMemoryBufferPoolManager;
use crate::txn::LockManager;

static DB: OnceCell<Database> = OnceCell::new();

/// Default pool capacity for the process-wide buffer pool, matching
/// `original_source`'s `BufferPoolManagerInstance` constructor default.
pub const DEFAULT_POOL_SIZE: usize = 256;

pub struct Database {
    buffer_pool: Arc<InMemoryBufferPoolManager>,
    lock_manager: Arc<LockManager>,
}

impl Database {
    fn new() -> Database {
        info!("Database::new: starting buffer pool of size {}", DEFAULT_POOL_SIZE);
        Database {
            buffer_pool: Arc::new(InMemoryBufferPoolManager::new(DEFAULT_POOL_SIZE)),
            lock_manager: LockManager::new(),
        }
    }

    pub fn global() -> &'static Database {
        DB.get_or_init(Database::new)
    }

    pub fn buffer_pool(&self) -> &InMemoryBufferPoolManager {
        &self.buffer_pool
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_returns_the_same_instance_every_call() {
        let a = Database::global() as *const Database;
        let b = Database::global() as *const Database;
        assert_eq!(a, b);
    }
}
