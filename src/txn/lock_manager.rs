//! Two-phase lock manager: `LockShared`/`LockExclusive`/`LockUpgrade`/
//! `Unlock` over `Rid`-granularity locks, with a background thread that
//! builds the wait-for graph and aborts the youngest transaction in any
//! cycle it finds.
//!
//! Grounded on `original_source/src/concurrency/lock_manager.cpp`:
//! `LockPrepare` lazily creates a queue the first time any lock touches
//! an RID; `Unlock`'s per-isolation-level `GROWING -> SHRINKING`
//! transition (`READ_COMMITTED` only shrinks on releasing exclusive,
//! `REPEATABLE_READ` shrinks on releasing either mode); and
//! `RunCycleDetection`'s periodic graph rebuild + DFS + victim abort
//! loop, joined on drop.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::rid::Rid;
use crate::txn::transaction::{IsolationLevel, Transaction, TransactionId, TransactionState};
use crate::txn::wait_for_graph::WaitForGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockRequest {
    txn_id: TransactionId,
    mode: LockMode,
    granted: bool,
}

struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    upgrading: bool,
}

impl LockRequestQueue {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            upgrading: false,
        }
    }

    fn holders(&self) -> impl Iterator<Item = &LockRequest> {
        self.requests.iter().filter(|r| r.granted)
    }
}

struct Table {
    queues: HashMap<Rid, Arc<(Mutex<LockRequestQueue>, Condvar)>>,
}

/// Default period between wait-for graph rebuilds, per spec.md §6's
/// `cycle_detection_interval` tunable.
pub const DEFAULT_CYCLE_DETECTION_INTERVAL: Duration = Duration::from_millis(50);

pub struct LockManager {
    table: Mutex<Table>,
    /// Transactions currently known to this manager, so the background
    /// detector can abort a victim it only knows by id.
    transactions: Mutex<HashMap<TransactionId, Arc<Transaction>>>,
    running: Arc<AtomicBool>,
    detector: Mutex<Option<JoinHandle<()>>>,
}

impl LockManager {
    pub fn new() -> Arc<Self> {
        Self::with_interval(DEFAULT_CYCLE_DETECTION_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Arc<Self> {
        let manager = Arc::new(Self {
            table: Mutex::new(Table {
                queues: HashMap::new(),
            }),
            transactions: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(true)),
            detector: Mutex::new(None),
        });
        manager.spawn_detector(interval);
        manager
    }

    /// Register a transaction so the deadlock detector can abort it by
    /// id. Callers still own the `Arc<Transaction>` they pass in.
    pub fn register(&self, txn: Arc<Transaction>) {
        self.transactions.lock().unwrap().insert(txn.id(), txn);
    }

    pub fn unregister(&self, txn_id: TransactionId) {
        self.transactions.lock().unwrap().remove(&txn_id);
    }

    fn spawn_detector(self: &Arc<Self>, interval: Duration) {
        let running = self.running.clone();
        let manager = self.clone();
        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                std::thread::sleep(interval);
                manager.run_cycle_detection();
            }
        });
        *self.detector.lock().unwrap() = Some(handle);
    }

    fn queue_for(&self, rid: Rid) -> Arc<(Mutex<LockRequestQueue>, Condvar)> {
        let mut table = self.table.lock().unwrap();
        table
            .queues
            .entry(rid)
            .or_insert_with(|| Arc::new((Mutex::new(LockRequestQueue::new()), Condvar::new())))
            .clone()
    }

    fn lock_prepare(&self, txn: &Transaction) -> Result<()> {
        match txn.state() {
            TransactionState::Aborted => Err(Error::new(
                ErrorKind::Deadlock,
                format!("txn {} already aborted", txn.id()),
            )),
            TransactionState::Shrinking => Err(Error::new(
                ErrorKind::LockOnShrinking,
                format!("txn {} requested a lock while shrinking", txn.id()),
            )),
            _ => Ok(()),
        }
    }

    pub fn lock_shared(&self, txn: &Transaction, rid: Rid) -> Result<()> {
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            return Err(Error::new(
                ErrorKind::LockSharedOnReadUncommitted,
                "shared locks are forbidden under read uncommitted",
            ));
        }
        self.lock_prepare(txn)?;
        if txn.is_shared_locked(rid) || txn.is_exclusive_locked(rid) {
            return Ok(());
        }

        let pair = self.queue_for(rid);
        let (mutex, cv) = &*pair;
        let mut queue = mutex.lock().unwrap();
        queue.requests.push_back(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Shared,
            granted: false,
        });

        loop {
            self.check_aborted(txn, &mut queue)?;
            let blocked = queue
                .holders()
                .any(|r| r.txn_id != txn.id() && r.mode == LockMode::Exclusive);
            let position = queue
                .requests
                .iter()
                .position(|r| r.txn_id == txn.id())
                .unwrap();
            let ahead_exclusive = queue
                .requests
                .iter()
                .take(position)
                .any(|r| r.mode == LockMode::Exclusive && !r.granted);
            if !blocked && !ahead_exclusive {
                queue.requests[position].granted = true;
                break;
            }
            queue = cv.wait(queue).unwrap();
        }

        txn.grant_shared(rid);
        Ok(())
    }

    pub fn lock_exclusive(&self, txn: &Transaction, rid: Rid) -> Result<()> {
        self.lock_prepare(txn)?;
        if txn.is_exclusive_locked(rid) {
            return Ok(());
        }

        let pair = self.queue_for(rid);
        let (mutex, cv) = &*pair;
        let mut queue = mutex.lock().unwrap();
        queue.requests.push_back(LockRequest {
            txn_id: txn.id(),
            mode: LockMode::Exclusive,
            granted: false,
        });

        loop {
            self.check_aborted(txn, &mut queue)?;
            let position = queue
                .requests
                .iter()
                .position(|r| r.txn_id == txn.id())
                .unwrap();
            let anyone_else_holds = queue.holders().any(|r| r.txn_id != txn.id());
            let ahead_ungranted = queue.requests.iter().take(position).any(|r| !r.granted);
            if !anyone_else_holds && !ahead_ungranted {
                queue.requests[position].granted = true;
                break;
            }
            queue = cv.wait(queue).unwrap();
        }

        txn.grant_exclusive(rid);
        Ok(())
    }

    pub fn lock_upgrade(&self, txn: &Transaction, rid: Rid) -> Result<()> {
        self.lock_prepare(txn)?;
        if txn.is_exclusive_locked(rid) {
            return Ok(());
        }

        let pair = self.queue_for(rid);
        let (mutex, cv) = &*pair;
        let mut queue = mutex.lock().unwrap();
        if queue.upgrading {
            debug!(
                "lock_upgrade: txn {} aborted, rid {} already has a pending upgrade",
                txn.id(),
                rid
            );
            txn.abort();
            return Err(Error::new(
                ErrorKind::UpgradeConflict,
                format!("rid {} already has a pending upgrade", rid),
            ));
        }
        queue.upgrading = true;

        let position = queue
            .requests
            .iter()
            .position(|r| r.txn_id == txn.id())
            .expect("upgrade requires an existing shared lock");
        queue.requests[position].mode = LockMode::Exclusive;
        queue.requests[position].granted = false;

        let result = loop {
            if let Err(e) = self.check_aborted(txn, &mut queue) {
                queue.upgrading = false;
                break Err(e);
            }
            let anyone_else_holds = queue.holders().any(|r| r.txn_id != txn.id());
            if !anyone_else_holds {
                queue.requests[position].granted = true;
                queue.upgrading = false;
                break Ok(());
            }
            queue = cv.wait(queue).unwrap();
        };

        if result.is_ok() {
            txn.grant_exclusive(rid);
        }
        result
    }

    pub fn unlock(&self, txn: &Transaction, rid: Rid) -> Result<()> {
        let was_exclusive = txn.is_exclusive_locked(rid);
        let was_shared = txn.is_shared_locked(rid);
        if !was_exclusive && !was_shared {
            return Ok(());
        }

        let shrinks = match txn.isolation_level() {
            IsolationLevel::ReadCommitted => was_exclusive,
            IsolationLevel::RepeatableRead => true,
            IsolationLevel::ReadUncommitted => was_exclusive,
        };
        if shrinks && txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }

        let pair = self.queue_for(rid);
        let (mutex, cv) = &*pair;
        let mut queue = mutex.lock().unwrap();
        queue.requests.retain(|r| r.txn_id != txn.id());
        txn.revoke(rid);
        cv.notify_all();
        Ok(())
    }

    fn check_aborted(
        &self,
        txn: &Transaction,
        queue: &mut std::sync::MutexGuard<'_, LockRequestQueue>,
    ) -> Result<()> {
        if txn.state() == TransactionState::Aborted {
            queue.requests.retain(|r| r.txn_id != txn.id());
            return Err(Error::new(
                ErrorKind::Deadlock,
                format!("txn {} aborted to break a deadlock", txn.id()),
            ));
        }
        Ok(())
    }

    fn run_cycle_detection(&self) {
        let table = self.table.lock().unwrap();
        let mut graph = WaitForGraph::new();

        for pair in table.queues.values() {
            let queue = pair.0.lock().unwrap();
            let holders: Vec<TransactionId> = queue.holders().map(|r| r.txn_id).collect();
            for waiter in queue.requests.iter().filter(|r| !r.granted) {
                for &holder in &holders {
                    if holder != waiter.txn_id {
                        graph.add_edge(waiter.txn_id, holder);
                    }
                }
            }
        }

        if let Some(victim) = graph.find_cycle_victim() {
            debug!("cycle detection: aborting txn {} to break a cycle", victim);
            if let Some(txn) = self.transactions.lock().unwrap().get(&victim) {
                txn.abort();
            }
        }
        drop(table);
        self.notify_all_queues();
    }

    /// Wake every waiter; used after an external abort so blocked
    /// `LockShared`/`LockExclusive` calls notice the state change.
    pub fn notify_all(&self, rid: Rid) {
        let table = self.table.lock().unwrap();
        if let Some(pair) = table.queues.get(&rid) {
            pair.1.notify_all();
        }
    }

    pub fn notify_all_queues(&self) {
        let table = self.table.lock().unwrap();
        for pair in table.queues.values() {
            pair.1.notify_all();
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.detector.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn long_interval() -> Arc<LockManager> {
        // Long enough that tests which manage their own abort timing
        // never race the background detector.
        LockManager::with_interval(StdDuration::from_secs(3600))
    }

    #[test]
    fn two_readers_share_a_lock() {
        let lm = long_interval();
        let t1 = Arc::new(Transaction::new(IsolationLevel::ReadCommitted));
        let t2 = Arc::new(Transaction::new(IsolationLevel::ReadCommitted));
        let rid = Rid::new(1, 0);

        lm.lock_shared(&t1, rid).unwrap();
        lm.lock_shared(&t2, rid).unwrap();
        assert!(t1.is_shared_locked(rid));
        assert!(t2.is_shared_locked(rid));
    }

    #[test]
    fn shared_on_read_uncommitted_is_rejected() {
        let lm = long_interval();
        let t1 = Transaction::new(IsolationLevel::ReadUncommitted);
        let err = lm.lock_shared(&t1, Rid::new(1, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockSharedOnReadUncommitted);
    }

    #[test]
    fn lock_after_shrinking_is_rejected() {
        let lm = long_interval();
        let t1 = Transaction::new(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);
        lm.lock_shared(&t1, rid).unwrap();
        lm.unlock(&t1, rid).unwrap();
        assert_eq!(t1.state(), TransactionState::Shrinking);

        let err = lm.lock_shared(&t1, Rid::new(2, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockOnShrinking);
    }

    #[test]
    fn read_committed_only_shrinks_on_exclusive_release() {
        let lm = long_interval();
        let t1 = Transaction::new(IsolationLevel::ReadCommitted);
        let rid = Rid::new(1, 0);
        lm.lock_shared(&t1, rid).unwrap();
        lm.unlock(&t1, rid).unwrap();
        assert_eq!(t1.state(), TransactionState::Growing);

        lm.lock_exclusive(&t1, rid).unwrap();
        lm.unlock(&t1, rid).unwrap();
        assert_eq!(t1.state(), TransactionState::Shrinking);
    }

    #[test]
    fn second_upgrade_on_same_rid_conflicts() {
        let lm = long_interval();
        let t1 = Arc::new(Transaction::new(IsolationLevel::RepeatableRead));
        let t2 = Arc::new(Transaction::new(IsolationLevel::RepeatableRead));
        let rid = Rid::new(1, 0);
        lm.lock_shared(&t1, rid).unwrap();
        lm.lock_shared(&t2, rid).unwrap();

        let t1c = t1.clone();
        let lmc = lm.clone();
        let upgrading = std::thread::spawn(move || lmc.lock_upgrade(&t1c, rid));
        std::thread::sleep(StdDuration::from_millis(20));

        let err = lm.lock_upgrade(&t2, rid).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpgradeConflict);

        lm.unlock(&t2, rid).unwrap();
        upgrading.join().unwrap().unwrap();
        assert!(t1.is_exclusive_locked(rid));
    }

    #[test]
    fn cycle_detection_aborts_the_youngest_transaction() {
        let lm = LockManager::with_interval(StdDuration::from_millis(10));
        let t1 = Arc::new(Transaction::new(IsolationLevel::RepeatableRead));
        let t2 = Arc::new(Transaction::new(IsolationLevel::RepeatableRead));
        lm.register(t1.clone());
        lm.register(t2.clone());

        let rid_a = Rid::new(1, 0);
        let rid_b = Rid::new(2, 0);
        lm.lock_exclusive(&t1, rid_a).unwrap();
        lm.lock_exclusive(&t2, rid_b).unwrap();

        let lm2 = lm.clone();
        let t2c = t2.clone();
        let waiter = std::thread::spawn(move || lm2.lock_exclusive(&t2c, rid_a));

        std::thread::sleep(StdDuration::from_millis(20));
        let result = lm.lock_exclusive(&t1, rid_b);

        assert!(result.is_err() || waiter.join().unwrap().is_err());
    }
}
