//! Transaction handle: identity, isolation level, two-phase state, and
//! the lock/page bookkeeping the B+Tree and Lock Manager consult.
//!
//! Grounded on `examples/small-db-small-db/src/transaction/tx.rs`'s
//! `Transaction` (monotonic id, global atomic counter), stripped of its
//! ARIES/WAL log coupling — recovery is out of this crate's scope, so
//! `commit`/`abort` here only flip `state`.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::btree::page_id::BTreePageID;
use crate::page::PageId;
use crate::rid::Rid;

pub type TransactionId = u32;

static NEXT_TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

struct Locks {
    shared: HashSet<Rid>,
    exclusive: HashSet<Rid>,
}

/// One transaction's identity plus the state the Lock Manager and the
/// B+Tree's write path mutate as it runs.
pub struct Transaction {
    id: TransactionId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    locks: Mutex<Locks>,
    page_set: Mutex<Vec<BTreePageID>>,
    deleted_page_set: Mutex<Vec<PageId>>,
}

impl Transaction {
    pub fn new(isolation_level: IsolationLevel) -> Self {
        let id = NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            locks: Mutex::new(Locks {
                shared: HashSet::new(),
                exclusive: HashSet::new(),
            }),
            page_set: Mutex::new(Vec::new()),
            deleted_page_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn is_shared_locked(&self, rid: Rid) -> bool {
        self.locks.lock().unwrap().shared.contains(&rid)
    }

    pub fn is_exclusive_locked(&self, rid: Rid) -> bool {
        self.locks.lock().unwrap().exclusive.contains(&rid)
    }

    pub fn grant_shared(&self, rid: Rid) {
        self.locks.lock().unwrap().shared.insert(rid);
    }

    pub fn grant_exclusive(&self, rid: Rid) {
        let mut locks = self.locks.lock().unwrap();
        locks.shared.remove(&rid);
        locks.exclusive.insert(rid);
    }

    pub fn revoke(&self, rid: Rid) {
        let mut locks = self.locks.lock().unwrap();
        locks.shared.remove(&rid);
        locks.exclusive.remove(&rid);
    }

    pub fn shared_lock_set(&self) -> HashSet<Rid> {
        self.locks.lock().unwrap().shared.clone()
    }

    pub fn exclusive_lock_set(&self) -> HashSet<Rid> {
        self.locks.lock().unwrap().exclusive.clone()
    }

    pub fn add_into_page_set(&self, page_id: BTreePageID) {
        self.page_set.lock().unwrap().push(page_id);
    }

    /// Drain the accumulated page set in descent order, so callers can
    /// release latches leaf-to-root by walking the result in reverse.
    pub fn take_page_set(&self) -> Vec<BTreePageID> {
        std::mem::take(&mut *self.page_set.lock().unwrap())
    }

    pub fn add_into_deleted_page_set(&self, page_id: PageId) {
        self.deleted_page_set.lock().unwrap().push(page_id);
    }

    pub fn take_deleted_page_set(&self) -> Vec<PageId> {
        std::mem::take(&mut *self.deleted_page_set.lock().unwrap())
    }

    pub fn commit(&self) {
        self.set_state(TransactionState::Committed);
    }

    pub fn abort(&self) {
        self.set_state(TransactionState::Aborted);
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn_{}", self.id)
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transaction {}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
