use std::{
    sync::atomic::{AtomicUsize, Ordering},
    sync::{Arc, RwLock},
    thread::sleep,
    time::Duration,
};

use log::debug;

use crate::{
    database::Database,
    error::DbError,
    heap::page::HeapPage,
    heap::page_id::HeapPageID,
    storage::tuple::Tuple,
    transaction::{Permission, Transaction},
    tx_log::LogManager,
    types::{DbResult, Pod, ResultPod},
    utils::HandyRwLock,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);
static POOL_CAPACITY: AtomicUsize = AtomicUsize::new(DEFAULT_PAGES);

/// How long a refused lock request sleeps before polling again.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Fixed-capacity cache of heap pages with second-chance (clock)
/// replacement.
///
/// Running NO-STEAL / FORCE: the eviction path never writes out a
/// dirty page, and commit flushes every page the transaction dirtied
/// before it returns. The slot array, reference bits and clock hand
/// are serialized by the `Database` pool monitor.
pub struct BufferPool {
    slots: Vec<Option<Pod<HeapPage>>>,
    ref_bits: Vec<bool>,
    hand: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        let capacity = POOL_CAPACITY.load(Ordering::Relaxed);
        Self {
            slots: vec![None; capacity],
            ref_bits: vec![false; capacity],
            hand: 0,
        }
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    /// Takes effect on the next `Database::reset`.
    pub fn set_capacity(capacity: usize) {
        POOL_CAPACITY.store(capacity, Ordering::Relaxed);
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Retrieve the specified page with the associated permissions,
    /// from the pool or from disk. Blocks while the lock is held by
    /// another transaction.
    ///
    /// The poll loop runs outside the pool monitor: each round asks
    /// the lock manager once, and a refusal is followed by a deadlock
    /// check. A detected cycle aborts the caller, which is the victim.
    pub fn get_page(tx: &Transaction, perm: Permission, pid: &HeapPageID) -> ResultPod<HeapPage> {
        let lock = perm.to_lock();

        loop {
            let granted = Database::mut_concurrent_status().add_lock(tx, &lock, pid);
            if granted {
                break;
            }

            let deadlocked = Database::mut_concurrent_status().has_deadlock(tx, pid);
            if deadlocked {
                let err = DbError::aborted(&format!(
                    "deadlock detected, victim: {}, page: {}",
                    tx, pid
                ));
                err.show_backtrace();
                return Err(err);
            }

            debug!("lock unavailable, tx: {}, lock: {:?}, page: {}", tx, lock, pid);
            sleep(POLL_INTERVAL);
        }

        Database::mut_buffer_pool().fetch_page(pid)
    }

    /// Slot lookup and admission; runs under the pool monitor.
    fn fetch_page(&mut self, pid: &HeapPageID) -> ResultPod<HeapPage> {
        let mut empty_slot = None;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(page_pod) => {
                    if page_pod.rl().get_id() == *pid {
                        self.ref_bits[i] = true;
                        return Ok(Arc::clone(page_pod));
                    }
                }
                None => {
                    if empty_slot.is_none() {
                        empty_slot = Some(i);
                    }
                }
            }
        }

        let idx = match empty_slot {
            Some(i) => i,
            None => self.evict_page()?,
        };

        let table_pod = Database::catalog().get_table(&pid.table_id)?;
        let page = table_pod.rl().read_page(pid)?;

        let page_pod = Arc::new(RwLock::new(page));
        self.slots[idx] = Some(Arc::clone(&page_pod));
        self.ref_bits[idx] = true;
        Ok(page_pod)
    }

    /// Free one slot with the clock algorithm and return its index.
    ///
    /// Dirty slots are never victims (NO-STEAL); they are skipped with
    /// their reference bit untouched. The all-dirty precheck keeps the
    /// sweep from looping forever.
    fn evict_page(&mut self) -> Result<usize, DbError> {
        let dirty_count = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Some(p) if p.rl().is_dirty()))
            .count();
        if dirty_count == self.slots.len() {
            return Err(DbError::new("all pages dirty"));
        }

        let capacity = self.slots.len();
        let mut k = self.hand;
        loop {
            if self.ref_bits[k] {
                self.ref_bits[k] = false;
                k = (k + 1) % capacity;
                continue;
            }

            let clean = match &self.slots[k] {
                Some(page_pod) => !page_pod.rl().is_dirty(),
                None => true,
            };
            if clean {
                if self.slots[k].is_some() {
                    let mut log_manager = Database::mut_log_manager();
                    self.flush_slot(k, &mut log_manager)?;
                }

                debug!("evicting slot {}", k);
                self.slots[k] = None;
                self.hand = k;
                return Ok(k);
            }

            k = (k + 1) % capacity;
        }
    }

    /// Add the tuple to the specified table on behalf of `tx`,
    /// acquiring a write lock on the page the tuple lands on. Marks
    /// the dirtied pages.
    pub fn insert_tuple(tx: &Transaction, table_id: u32, tuple: &mut Tuple) -> DbResult {
        let table_pod = Database::catalog().get_table(&table_id)?;

        let dirtied = table_pod.rl().insert_tuple(tx, tuple)?;
        for page_pod in dirtied {
            page_pod.wl().mark_dirty(Some(tx.get_id()));
        }
        Ok(())
    }

    /// Remove the tuple from the page named by its record id. Marks
    /// the dirtied page.
    pub fn delete_tuple(tx: &Transaction, tuple: &Tuple) -> DbResult {
        let rid = tuple
            .get_record_id()
            .ok_or_else(|| DbError::new("tuple has no record id"))?;
        let table_pod = Database::catalog().get_table(&rid.pid.table_id)?;

        let dirtied = table_pod.rl().delete_tuple(tx, tuple)?;
        for page_pod in dirtied {
            page_pod.wl().mark_dirty(Some(tx.get_id()));
        }
        Ok(())
    }

    pub fn holds_lock(tx: &Transaction, pid: &HeapPageID) -> bool {
        Database::concurrent_status().holds_lock(tx, pid)
    }

    /// Release the lock on a single page before the transaction
    /// completes. Breaks strict two-phase locking and with it
    /// serializability; commit/abort is the supported release path.
    pub fn release_page(tx: &Transaction, pid: &HeapPageID) -> bool {
        Database::mut_concurrent_status().release_latch(tx, pid)
    }

    /// Commit or abort: release every lock of `tx`, then flush
    /// (commit) or re-read from disk (abort) each page it dirtied.
    pub fn tx_complete(
        &mut self,
        tx: &Transaction,
        commit: bool,
        log_manager: &mut LogManager,
    ) -> DbResult {
        Database::mut_concurrent_status().release_latches(tx);

        let tid = tx.get_id();
        for idx in 0..self.slots.len() {
            let page_pod = match &self.slots[idx] {
                Some(p) => Arc::clone(p),
                None => continue,
            };
            if page_pod.rl().dirtier() != Some(tid) {
                continue;
            }

            if commit {
                self.flush_slot(idx, log_manager)?;
                page_pod.wl().set_before_image();
            } else {
                // undo the in-memory mutations with a fresh disk copy
                let pid = page_pod.rl().get_id();
                let table_pod = Database::catalog().get_table(&pid.table_id)?;
                let fresh = table_pod.rl().read_page(&pid)?;
                self.slots[idx] = Some(Arc::new(RwLock::new(fresh)));
            }
        }

        Ok(())
    }

    /// Write the named page out if it is dirty: WAL update record,
    /// log force, then the data write.
    pub fn flush_page(&mut self, pid: &HeapPageID, log_manager: &mut LogManager) -> DbResult {
        for idx in 0..self.slots.len() {
            let holds_pid = match &self.slots[idx] {
                Some(p) => p.rl().get_id() == *pid,
                None => false,
            };
            if holds_pid {
                return self.flush_slot(idx, log_manager);
            }
        }
        Ok(())
    }

    fn flush_slot(&mut self, idx: usize, log_manager: &mut LogManager) -> DbResult {
        let page_pod = match &self.slots[idx] {
            Some(p) => Arc::clone(p),
            None => return Ok(()),
        };
        let mut page = page_pod.wl();

        let tid = match page.dirtier() {
            Some(tid) => tid,
            None => return Ok(()),
        };

        // Write-ahead: the update record carrying the before image
        // must be on disk before the page itself is.
        let before = page.get_before_image_data();
        let after = page.get_page_data();
        log_manager.log_update(tid, &page.get_id(), &before, &after)?;
        log_manager.force()?;

        let table_pod = Database::catalog().get_table(&page.get_id().table_id)?;
        table_pod.rl().write_page(&page)?;
        page.mark_dirty(None);

        debug!("flushed page {}", page.get_id());
        Ok(())
    }

    /// Write every dirty page to disk. Breaks NO-STEAL when invoked
    /// with uncommitted dirty pages around; the checkpoint path owns
    /// that trade-off.
    pub fn flush_all_pages(&mut self, log_manager: &mut LogManager) -> DbResult {
        for idx in 0..self.slots.len() {
            self.flush_slot(idx, log_manager)?;
        }
        Ok(())
    }

    /// Write the pages locked by `tx` to disk.
    pub fn flush_pages(&mut self, tx: &Transaction, log_manager: &mut LogManager) -> DbResult {
        let locked = Database::concurrent_status().locked_pages(tx);
        for pid in locked {
            self.flush_page(&pid, log_manager)?;
        }
        Ok(())
    }

    /// Drop the page from the pool without flushing it.
    pub fn discard_page(&mut self, pid: &HeapPageID) {
        for idx in 0..self.slots.len() {
            let holds_pid = match &self.slots[idx] {
                Some(p) => p.rl().get_id() == *pid,
                None => false,
            };
            if holds_pid {
                self.slots[idx] = None;
                self.ref_bits[idx] = false;
                return;
            }
        }
    }

    /// Number of pages currently cached.
    pub fn pages_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn contains_page(&self, pid: &HeapPageID) -> bool {
        self.slots.iter().any(|slot| match slot {
            Some(page_pod) => page_pod.rl().get_id() == *pid,
            None => false,
        })
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        for bit in self.ref_bits.iter_mut() {
            *bit = false;
        }
        self.hand = 0;
    }
}
