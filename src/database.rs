use std::{
    mem,
    path::PathBuf,
    sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    transaction::ConcurrentStatus,
    tx_log::LogManager,
    types::Pod,
    utils::HandyRwLock,
};

/// We collect all global variables here.
///
/// These variables cannot be initialized as static variables, because
/// their initialization functions all rely on non-const fn (e.g.
/// `HashMap::new()`).
pub struct Database {
    path: PathBuf,

    buffer_pool: Pod<BufferPool>,
    catalog: Pod<Catalog>,
    concurrent_status: Pod<ConcurrentStatus>,
    log_manager: Pod<LogManager>,
}

static mut SINGLETON: *mut Database = 0 as *mut Database;

impl Database {
    fn new() -> Self {
        let db_path = PathBuf::from("data");
        if !db_path.exists() {
            std::fs::create_dir_all(&db_path).unwrap();
        }

        let log_path = db_path.join("wal.log");

        Self {
            path: db_path,

            buffer_pool: Arc::new(RwLock::new(BufferPool::new())),
            catalog: Arc::new(RwLock::new(Catalog::new())),
            concurrent_status: Arc::new(RwLock::new(ConcurrentStatus::new())),
            log_manager: Arc::new(RwLock::new(LogManager::new(log_path))),
        }
    }

    /// Reset the memory status of the database, used for tests mostly.
    ///
    /// Actions:
    /// - Page cache will be cleared.
    /// - Catalog will be cleared.
    /// - Lock table and wait registry will be cleared.
    /// - Status of `log_manager` will be reset, but the log file itself
    ///   will keep unchanged.
    pub fn reset() {
        // spend the Once so a later `global()` cannot clobber the
        // fresh instance
        let _ = Self::global();

        let singleton = Self::new();

        unsafe {
            if !SINGLETON.is_null() {
                // Drop the previous db instance if it's already
                // initialized.
                mem::drop(Box::from_raw(SINGLETON));
            }

            // Put it in the heap so it can outlive this call.
            SINGLETON = mem::transmute(Box::new(singleton));
        }
    }

    pub fn global() -> &'static Self {
        static ONCE: Once = Once::new();

        ONCE.call_once(|| {
            let singleton = Self::new();

            unsafe {
                // Put it in the heap so it can outlive this call
                SINGLETON = mem::transmute(Box::new(singleton));
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }

    pub fn buffer_pool() -> RwLockReadGuard<'static, BufferPool> {
        Self::global().buffer_pool.rl()
    }

    pub fn mut_buffer_pool() -> RwLockWriteGuard<'static, BufferPool> {
        Self::global().buffer_pool.wl()
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub(crate) fn concurrent_status() -> RwLockReadGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.rl()
    }

    pub(crate) fn mut_concurrent_status() -> RwLockWriteGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.wl()
    }

    pub fn log_manager() -> RwLockReadGuard<'static, LogManager> {
        Self::global().log_manager.rl()
    }

    pub fn mut_log_manager() -> RwLockWriteGuard<'static, LogManager> {
        Self::global().log_manager.wl()
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone()
    }
}
