use std::{
    collections::hash_map::DefaultHasher,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    sync::atomic::{AtomicUsize, Ordering},
    sync::{Arc, Mutex, MutexGuard},
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    database::Database,
    error::DbError,
    storage::schema::Schema,
    storage::tuple::Tuple,
    transaction::{Permission, Transaction},
    types::{DbResult, Pod},
    utils::HandyRwLock,
};

use super::{page::HeapPage, page_id::HeapPageID};

/// A table backed by a single OS file: a contiguous sequence of
/// PAGE_SIZE pages, page `k` at byte offset `k * PAGE_SIZE`.
pub struct HeapTable {
    schema: Arc<Schema>,
    file: Arc<Mutex<File>>,
    file_path: String,
    table_id: u32,

    /// How many pages have been read from disk, to observe whether the
    /// buffer pool is doing its job.
    read_count: AtomicUsize,
}

impl HeapTable {
    pub fn new(file_path: &str, schema: Schema) -> Result<Self, DbError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(file_path)?;

        // The table id must be stable across re-opens, so it is derived
        // from the absolute file path.
        let absolute = std::fs::canonicalize(file_path)?;
        let mut hasher = DefaultHasher::new();
        absolute.to_string_lossy().hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            schema: Arc::new(schema),
            file: Arc::new(Mutex::new(file)),
            file_path: file_path.to_string(),
            table_id,
            read_count: AtomicUsize::new(0),
        })
    }

    pub fn get_read_count(&self) -> usize {
        self.read_count.load(Ordering::Relaxed)
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn get_file_path(&self) -> &str {
        &self.file_path
    }

    fn get_file(&self) -> MutexGuard<File> {
        self.file.lock().unwrap()
    }

    pub fn num_pages(&self) -> usize {
        let len = self.get_file().metadata().unwrap().len() as usize;
        len / BufferPool::get_page_size()
    }

    /// Read a page image straight from disk, bypassing the pool.
    pub fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError> {
        if pid.table_id != self.table_id {
            return Err(DbError::new(&format!(
                "page {} does not belong to table {}",
                pid, self.table_id
            )));
        }
        if pid.page_index as usize >= self.num_pages() {
            return Err(DbError::new(&format!("no such page: {}", pid)));
        }

        let page_size = BufferPool::get_page_size();
        let offset = pid.page_index as u64 * page_size as u64;

        let mut buf = vec![0; page_size];
        {
            let mut file = self.get_file();
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf)?;
        }

        self.read_count.fetch_add(1, Ordering::Relaxed);
        debug!("read page {} from {}", pid, self.file_path);
        Ok(HeapPage::new(pid, &buf, &self.schema))
    }

    pub fn write_page(&self, page: &HeapPage) -> DbResult {
        let pid = page.get_id();
        let page_size = BufferPool::get_page_size();
        let offset = pid.page_index as u64 * page_size as u64;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.get_page_data())?;
        Ok(())
    }

    /// Grow the file by one zeroed page, returning its index.
    fn append_empty_page(&self) -> Result<u32, DbError> {
        let page_size = BufferPool::get_page_size();

        let mut file = self.get_file();
        let page_index = file.metadata()?.len() as usize / page_size;
        file.seek(SeekFrom::Start((page_index * page_size) as u64))?;
        file.write_all(&HeapPage::empty_page_data())?;

        debug!("table {} grew to {} pages", self.table_id, page_index + 1);
        Ok(page_index as u32)
    }

    /// Place the tuple on the first page with a free slot, growing the
    /// file when every page is packed. Returns the pages dirtied by the
    /// operation; the caller owns marking them dirty.
    pub fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &mut Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, DbError> {
        tuple.check_schema(&self.schema)?;

        for page_no in 0..self.num_pages() {
            let pid = HeapPageID::new(self.table_id, page_no as u32);
            let page_pod = BufferPool::get_page(tx, Permission::ReadWrite, &pid)?;

            let has_space = page_pod.rl().get_num_empty_slots() > 0;
            if has_space {
                page_pod.wl().insert_tuple(tuple)?;
                return Ok(vec![page_pod]);
            }
        }

        // every existing page is packed
        let page_index = self.append_empty_page()?;
        let pid = HeapPageID::new(self.table_id, page_index);
        let page_pod = BufferPool::get_page(tx, Permission::ReadWrite, &pid)?;
        page_pod.wl().insert_tuple(tuple)?;
        Ok(vec![page_pod])
    }

    /// Remove the tuple from the page named by its record id. Returns
    /// the dirtied page.
    pub fn delete_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, DbError> {
        let rid = tuple
            .get_record_id()
            .ok_or_else(|| DbError::new("tuple has no record id"))?;

        if rid.pid.table_id != self.table_id {
            return Err(DbError::new("tuple does not belong to this table"));
        }

        let page_pod = BufferPool::get_page(tx, Permission::ReadWrite, &rid.pid)?;
        page_pod.wl().delete_tuple(tuple)?;
        Ok(vec![page_pod])
    }

    pub fn scan(&self, tx: &Transaction) -> HeapTableScan {
        HeapTableScan::new(*tx, self.table_id)
    }
}

/// Lazy cursor over the tuples of a table: walks page numbers in
/// order, pulling each page through the buffer pool with a shared
/// lock. Restartable via `rewind`.
pub struct HeapTableScan {
    tx: Transaction,
    table_id: u32,
    page_index: usize,
    tuples: Vec<Tuple>,
    cursor: usize,
}

impl HeapTableScan {
    pub fn new(tx: Transaction, table_id: u32) -> Self {
        Self {
            tx,
            table_id,
            page_index: 0,
            tuples: Vec::new(),
            cursor: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.page_index = 0;
        self.tuples.clear();
        self.cursor = 0;
    }

    fn load_next_page(&mut self) -> Result<bool, DbError> {
        let table_pod = Database::catalog().get_table(&self.table_id)?;
        let pages_count = table_pod.rl().num_pages();
        if self.page_index >= pages_count {
            return Ok(false);
        }

        let pid = HeapPageID::new(self.table_id, self.page_index as u32);
        let page_pod = BufferPool::get_page(&self.tx, Permission::ReadOnly, &pid)?;
        self.tuples = page_pod.rl().iter().collect();
        self.cursor = 0;
        self.page_index += 1;
        Ok(true)
    }
}

impl Iterator for HeapTableScan {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cursor < self.tuples.len() {
                let tuple = self.tuples[self.cursor].clone();
                self.cursor += 1;
                return Some(tuple);
            }

            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    e.show_backtrace();
                    panic!("scan failed: {}", e);
                }
            }
        }
    }
}
