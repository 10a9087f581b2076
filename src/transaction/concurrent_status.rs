use core::fmt;
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::heap::page_id::HeapPageID;

use super::{tx::Transaction, tx::TransactionID, wait_for_graph::WaitForGraph};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Lock {
    XLock,
    SLock,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

/// The lock table: page-granularity shared/exclusive latches under
/// strict two-phase locking, plus the wait registry the deadlock
/// detector reads. All mutations run under the single `Database`
/// monitor guarding this struct.
///
/// A page is either held shared by any number of transactions, held
/// exclusively by one, or held shared and exclusively by the same
/// transaction (a sole holder that upgraded).
pub struct ConcurrentStatus {
    s_lock_map: HashMap<HeapPageID, HashSet<TransactionID>>,
    x_lock_map: HashMap<HeapPageID, TransactionID>,

    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,

    wait_for_graph: WaitForGraph,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            s_lock_map: HashMap::new(),
            x_lock_map: HashMap::new(),
            hold_pages: HashMap::new(),
            wait_for_graph: WaitForGraph::new(),
        }
    }

    /// Try to grant the lock. This api is idempotent and never blocks:
    /// on refusal the transaction is recorded as waiting for the page
    /// and `false` comes back, and the caller decides whether to poll
    /// again or give up.
    pub(crate) fn add_lock(&mut self, tx: &Transaction, lock: &Lock, pid: &HeapPageID) -> bool {
        let tid = tx.get_id();

        // An exclusive latch held by anyone else blocks every request.
        if let Some(holder) = self.x_lock_map.get(pid) {
            if *holder != tid {
                self.wait_for_graph.add_waiter(tid, *pid);
                return false;
            }
        }

        match lock {
            Lock::SLock => {
                self.s_lock_map
                    .entry(*pid)
                    .or_insert_with(HashSet::new)
                    .insert(tid);
            }
            Lock::XLock => {
                // Upgrade is only possible for the sole holder; any
                // other reader blocks the request.
                if let Some(holders) = self.s_lock_map.get(pid) {
                    if holders.iter().any(|holder| *holder != tid) {
                        self.wait_for_graph.add_waiter(tid, *pid);
                        return false;
                    }
                }

                self.x_lock_map.insert(*pid, tid);
            }
        }

        self.hold_pages
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(*pid);
        self.wait_for_graph.remove_waiter(tid);

        debug!("lock acquired, tx: {}, lock: {:?}, page: {}", tx, lock, pid);
        true
    }

    /// Whether `tx`, blocked on `pid`, closes a cycle in the waits-for
    /// graph. The whole traversal runs under the monitor, so it sees a
    /// consistent snapshot of locks and waits.
    ///
    /// When a cycle is found the caller is the victim: its wait
    /// registration is dropped here, which keeps the other side of the
    /// cycle from aborting as well.
    pub(crate) fn has_deadlock(&mut self, tx: &Transaction, pid: &HeapPageID) -> bool {
        let tid = tx.get_id();

        let holders = self.holders_of(pid);
        let found = holders
            .iter()
            .filter(|holder| **holder != tid)
            .any(|other| {
                self.wait_for_graph
                    .cycle_through(*other, tid, |p| self.holders_of(p))
            });

        if found {
            self.wait_for_graph.remove_waiter(tid);
        }

        found
    }

    fn holders_of(&self, pid: &HeapPageID) -> Vec<TransactionID> {
        let mut holders = Vec::new();
        if let Some(s_holders) = self.s_lock_map.get(pid) {
            holders.extend(s_holders.iter().copied());
        }
        if let Some(x_holder) = self.x_lock_map.get(pid) {
            if !holders.contains(x_holder) {
                holders.push(*x_holder);
            }
        }
        holders
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        let tid = tx.get_id();

        if self.x_lock_map.get(pid) == Some(&tid) {
            return true;
        }

        match self.s_lock_map.get(pid) {
            Some(holders) => holders.contains(&tid),
            None => false,
        }
    }

    pub fn locked_pages(&self, tx: &Transaction) -> HashSet<HeapPageID> {
        self.hold_pages
            .get(&tx.get_id())
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every lock `tx` holds on `pid`. Returns whether anything
    /// was removed. Calling this outside of commit/abort breaks strict
    /// two-phase locking.
    pub(crate) fn release_latch(&mut self, tx: &Transaction, pid: &HeapPageID) -> bool {
        let tid = tx.get_id();
        let mut removed = false;

        if let Some(holders) = self.s_lock_map.get_mut(pid) {
            removed |= holders.remove(&tid);
            if holders.is_empty() {
                self.s_lock_map.remove(pid);
            }
        }

        if self.x_lock_map.get(pid) == Some(&tid) {
            self.x_lock_map.remove(pid);
            removed = true;
        }

        if let Some(pages) = self.hold_pages.get_mut(&tid) {
            pages.remove(pid);
        }

        if removed {
            debug!("lock released, tx: {}, page: {}", tx, pid);
        }
        removed
    }

    /// Drop every lock `tx` holds, and its wait registration with
    /// them.
    pub(crate) fn release_latches(&mut self, tx: &Transaction) {
        let tid = tx.get_id();

        if let Some(pages) = self.hold_pages.get(&tid) {
            let pages = pages.clone();
            for pid in pages {
                self.release_latch(tx, &pid);
            }
        }

        self.hold_pages.remove(&tid);
        self.wait_for_graph.remove_waiter(tid);
    }

    pub fn clear(&mut self) {
        self.s_lock_map.clear();
        self.x_lock_map.clear();
        self.hold_pages.clear();
        self.wait_for_graph.clear();
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "\n".to_string();

        depiction.push_str("s_lock_map: {");
        for (pid, holders) in self.s_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", pid.get_short_repr(), holders));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("x_lock_map: {");
        for (pid, holder) in self.x_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?}", pid.get_short_repr(), holder));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("hold_pages: {");
        for (tid, pages) in self.hold_pages.iter() {
            depiction.push_str(&format!("\n\t{:?} -> {:?}", tid, pages));
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_locks_coexist() {
        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new_specific_id(101);
        let t2 = Transaction::new_specific_id(102);
        let pid = HeapPageID::new(1, 0);

        assert!(status.add_lock(&t1, &Lock::SLock, &pid));
        assert!(status.add_lock(&t2, &Lock::SLock, &pid));
        assert!(status.holds_lock(&t1, &pid));
        assert!(status.holds_lock(&t2, &pid));
    }

    #[test]
    fn test_exclusive_blocks_others() {
        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new_specific_id(111);
        let t2 = Transaction::new_specific_id(112);
        let pid = HeapPageID::new(1, 0);

        assert!(status.add_lock(&t1, &Lock::XLock, &pid));
        assert!(!status.add_lock(&t2, &Lock::SLock, &pid));
        assert!(!status.add_lock(&t2, &Lock::XLock, &pid));

        // reentry of the holder stays granted
        assert!(status.add_lock(&t1, &Lock::SLock, &pid));
        assert!(status.add_lock(&t1, &Lock::XLock, &pid));
    }

    #[test]
    fn test_upgrade_rules() {
        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new_specific_id(121);
        let t2 = Transaction::new_specific_id(122);
        let pid = HeapPageID::new(1, 0);

        // sole reader upgrades
        assert!(status.add_lock(&t1, &Lock::SLock, &pid));
        assert!(status.add_lock(&t1, &Lock::XLock, &pid));

        // other transactions stay out until release
        assert!(!status.add_lock(&t2, &Lock::SLock, &pid));

        status.release_latches(&t1);
        assert!(!status.holds_lock(&t1, &pid));
        assert!(status.add_lock(&t2, &Lock::SLock, &pid));

        // a second reader forbids the upgrade
        assert!(status.add_lock(&t1, &Lock::SLock, &pid));
        assert!(!status.add_lock(&t2, &Lock::XLock, &pid));
    }

    #[test]
    fn test_symmetric_upgrade_has_one_victim() {
        let mut status = ConcurrentStatus::new();
        let t1 = Transaction::new_specific_id(131);
        let t2 = Transaction::new_specific_id(132);
        let pid = HeapPageID::new(1, 0);

        assert!(status.add_lock(&t1, &Lock::SLock, &pid));
        assert!(status.add_lock(&t2, &Lock::SLock, &pid));

        // both try to upgrade, both end up registered as waiting
        assert!(!status.add_lock(&t1, &Lock::XLock, &pid));
        assert!(!status.add_lock(&t2, &Lock::XLock, &pid));

        // the first checker becomes the victim, and its removal from
        // the wait registry leaves the survivor deadlock-free
        assert!(status.has_deadlock(&t1, &pid));
        assert!(!status.has_deadlock(&t2, &pid));

        status.release_latches(&t1);
        assert!(status.add_lock(&t2, &Lock::XLock, &pid));
    }
}
