use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{database::Database, types::DbResult};

pub type TransactionID = u64;

static TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct Transaction {
    // increase monotonically by 1
    uuid: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            uuid: TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn new_specific_id(id: TransactionID) -> Self {
        Self { uuid: id }
    }

    pub fn start(&self) -> DbResult {
        Database::mut_log_manager().log_start(self)
    }

    pub fn commit(&self) -> DbResult {
        self.complete(true)
    }

    pub fn abort(&self) -> DbResult {
        self.complete(false)
    }

    fn complete(&self, commit: bool) -> DbResult {
        let mut buffer_pool = Database::mut_buffer_pool();
        let mut log_manager = Database::mut_log_manager();

        // Release locks, then flush (commit) or revert (abort) the
        // pages this transaction dirtied. The pool guard is held across
        // the whole completion, so no page can slip in between.
        buffer_pool.tx_complete(self, commit, &mut log_manager)?;

        if commit {
            log_manager.log_commit(self)
        } else {
            log_manager.log_abort(self)
        }
    }

    pub fn get_id(&self) -> TransactionID {
        self.uuid
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.uuid)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
