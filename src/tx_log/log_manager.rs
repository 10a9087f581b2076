use std::{collections::HashMap, path::PathBuf};

use log::debug;

use crate::{
    database::Database,
    heap::page_id::HeapPageID,
    io::{DbFile, Encodeable},
    transaction::{Transaction, TransactionID},
    types::DbResult,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum RecordType {
    Abort,
    Commit,
    Update,
    Start,
    Checkpoint,
}

impl Encodeable for RecordType {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// The write-ahead log.
///
/// Record layouts (all integers little-endian):
/// - START:      type, tid, start offset
/// - COMMIT:     type, tid, start offset
/// - ABORT:      type, tid, start offset
/// - UPDATE:     type, tid, page id, before image, after image,
///               start offset (images are length-prefixed)
/// - CHECKPOINT: type, outstanding tx count, (tid, start position)
///               pairs, start offset
///
/// An UPDATE record must be written and forced before its page is
/// written to the data file. Replaying the log on restart is out of
/// scope; the records exist for the write-ahead discipline and its
/// tests.
pub struct LogManager {
    file: DbFile,

    /// Byte position of the START record of each live transaction.
    tx_start_position: HashMap<TransactionID, u64>,

    /// The absolute position of the file descriptor cursor.
    current_offset: u64,

    total_records: usize,

    file_path: PathBuf,
}

impl LogManager {
    pub fn new(file_path: PathBuf) -> Self {
        let file = DbFile::new(&file_path).unwrap();

        Self {
            file,
            tx_start_position: HashMap::new(),
            current_offset: 0,
            total_records: 0,
            file_path,
        }
    }

    /// Forget the in-memory status; the log file itself keeps its
    /// content. Used by tests.
    pub fn reset(&mut self) {
        self.file = DbFile::new(&self.file_path).unwrap();
        self.tx_start_position.clear();
        self.current_offset = 0;
        self.total_records = 0;
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    pub fn log_start(&mut self, tx: &Transaction) -> DbResult {
        self.file.write(&RecordType::Start)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.tx_start_position.insert(tx.get_id(), self.current_offset);
        self.current_offset = self.file.get_current_position()?;
        self.total_records += 1;

        Ok(())
    }

    /// Write an UPDATE record with the before- and after-image of the
    /// page.
    pub fn log_update(
        &mut self,
        tid: TransactionID,
        pid: &HeapPageID,
        before_image: &[u8],
        after_image: &[u8],
    ) -> DbResult {
        self.file.write(&RecordType::Update)?;
        self.file.write(&tid)?;
        self.file.write(pid)?;
        self.write_image(before_image)?;
        self.write_image(after_image)?;
        self.file.write(&self.current_offset)?;

        self.current_offset = self.file.get_current_position()?;
        self.total_records += 1;

        debug!("logged update, tid: {}, page: {}", tid, pid);
        Ok(())
    }

    fn write_image(&mut self, image: &[u8]) -> DbResult {
        self.file.write(&image.len())?;
        self.file.write_bytes(image)
    }

    pub fn log_commit(&mut self, tx: &Transaction) -> DbResult {
        self.file.write(&RecordType::Commit)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.current_offset = self.file.get_current_position()?;
        self.total_records += 1;
        self.tx_start_position.remove(&tx.get_id());

        self.force()
    }

    pub fn log_abort(&mut self, tx: &Transaction) -> DbResult {
        self.file.write(&RecordType::Abort)?;
        self.file.write(&tx.get_id())?;
        self.file.write(&self.current_offset)?;

        self.current_offset = self.file.get_current_position()?;
        self.total_records += 1;
        self.tx_start_position.remove(&tx.get_id());

        self.force()
    }

    /// Push buffered log records to the OS.
    pub fn force(&mut self) -> DbResult {
        self.file.flush()
    }

    /// Force every dirty page out through the buffer pool, then record
    /// the outstanding transactions. Flushing uncommitted pages breaks
    /// NO-STEAL, which is the documented price of checkpointing here.
    pub fn checkpoint() -> DbResult {
        let mut buffer_pool = Database::mut_buffer_pool();
        let mut log_manager = Database::mut_log_manager();

        buffer_pool.flush_all_pages(&mut log_manager)?;

        let outstanding: Vec<(TransactionID, u64)> = log_manager
            .tx_start_position
            .iter()
            .map(|(tid, pos)| (*tid, *pos))
            .collect();
        let record_start = log_manager.current_offset;

        log_manager.file.write(&RecordType::Checkpoint)?;
        log_manager.file.write(&outstanding.len())?;
        for (tid, start_position) in outstanding {
            log_manager.file.write(&tid)?;
            log_manager.file.write(&start_position)?;
        }
        log_manager.file.write(&record_start)?;

        log_manager.current_offset = log_manager.file.get_current_position()?;
        log_manager.total_records += 1;

        log_manager.force()
    }
}
