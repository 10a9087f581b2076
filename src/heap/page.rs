use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    io::ByteWriter,
    storage::schema::Schema,
    storage::tuple::{RecordID, Tuple},
    transaction::TransactionID,
    types::DbResult,
};

use super::page_id::HeapPageID;

/// A fixed-size page of a heap table.
///
/// Layout is a slot bitmap header followed by fixed-size tuples. The
/// header occupies `ceil(slots / 8)` bytes; bit `i` tells whether slot
/// `i` holds a live tuple. The remainder of the page up to `PAGE_SIZE`
/// is zero padding.
#[derive(Debug)]
pub struct HeapPage {
    pid: HeapPageID,
    schema: Schema,
    slots_count: usize,
    header: BitVec,
    tuples: Vec<Tuple>,

    /// Page image at the start of the current transaction (or the last
    /// commit), the undo half of a WAL update record.
    old_data: Vec<u8>,

    dirtier: Option<TransactionID>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> Self {
        let slots_count = Self::calculate_slots_count(schema);
        let header_size = Self::header_size(schema);
        let header = BitVec::from_bytes(&bytes[..header_size]);

        let tuple_size = schema.get_size();
        let mut tuples = Vec::with_capacity(slots_count);
        for slot in 0..slots_count {
            if header.get(slot).unwrap_or(false) {
                let start = header_size + slot * tuple_size;
                let end = start + tuple_size;
                let mut tuple = Tuple::new(schema, &bytes[start..end]);
                tuple.set_record_id(RecordID::new(*pid, slot));
                tuples.push(tuple);
            } else {
                tuples.push(Tuple::blank(schema));
            }
        }

        Self {
            pid: *pid,
            schema: schema.clone(),
            slots_count,
            header,
            tuples,
            old_data: bytes.to_vec(),
            dirtier: None,
        }
    }

    /// How many tuples fit on a page: each tuple costs its byte size
    /// plus one header bit.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let page_size = BufferPool::get_page_size();
        (page_size * 8) / (schema.get_size() * 8 + 1)
    }

    fn header_size(schema: &Schema) -> usize {
        (Self::calculate_slots_count(schema) + 7) / 8
    }

    pub fn empty_page_data() -> Vec<u8> {
        vec![0; BufferPool::get_page_size()]
    }

    pub fn get_id(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dirtier(&self) -> Option<TransactionID> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionID>) {
        self.dirtier = tid;
    }

    fn slot_used(&self, slot: usize) -> bool {
        self.header.get(slot).unwrap_or(false)
    }

    pub fn get_num_empty_slots(&self) -> usize {
        (0..self.slots_count).filter(|i| !self.slot_used(*i)).count()
    }

    /// Serialize the page back to its on-disk image.
    pub fn get_page_data(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(&self.header.to_bytes());

        let tuple_size = self.schema.get_size();
        for slot in 0..self.slots_count {
            if self.slot_used(slot) {
                writer.write(&self.tuples[slot]);
            } else {
                writer.write_bytes(&vec![0; tuple_size]);
            }
        }

        writer.to_padded_bytes(BufferPool::get_page_size())
    }

    pub fn set_before_image(&mut self) {
        self.old_data = self.get_page_data();
    }

    pub fn get_before_image(&self) -> HeapPage {
        HeapPage::new(&self.pid, &self.old_data, &self.schema)
    }

    pub fn get_before_image_data(&self) -> Vec<u8> {
        self.old_data.clone()
    }

    /// Place the tuple into the first free slot and assign its record
    /// id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> DbResult {
        tuple.check_schema(&self.schema)?;

        for slot in 0..self.slots_count {
            if !self.slot_used(slot) {
                tuple.set_record_id(RecordID::new(self.pid, slot));
                self.tuples[slot] = tuple.clone();
                self.header.set(slot, true);
                return Ok(());
            }
        }

        Err(DbError::new("no empty slots"))
    }

    /// Clear the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> DbResult {
        let rid = tuple
            .get_record_id()
            .ok_or_else(|| DbError::new("tuple has no record id"))?;

        if rid.pid != self.pid {
            return Err(DbError::new("tuple is not on this page"));
        }
        if rid.slot >= self.slots_count || !self.slot_used(rid.slot) {
            return Err(DbError::new("slot is not in use"));
        }

        self.tuples[rid.slot] = Tuple::blank(&self.schema);
        self.header.set(rid.slot, false);
        Ok(())
    }

    pub fn iter(&self) -> HeapPageIterator {
        HeapPageIterator {
            page: self,
            cursor: 0,
        }
    }
}

/// Walks the live tuples of a page, skipping empty slots.
pub struct HeapPageIterator<'a> {
    page: &'a HeapPage,
    cursor: usize,
}

impl<'a> Iterator for HeapPageIterator<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.slots_count {
            let slot = self.cursor;
            self.cursor += 1;

            if self.page.slot_used(slot) {
                return Some(self.page.tuples[slot].clone());
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::small_int_schema;

    #[test]
    fn test_empty_page_slots() {
        let schema = small_int_schema(2, "t");
        let pid = HeapPageID::new(1, 0);
        let page = HeapPage::new(&pid, &HeapPage::empty_page_data(), &schema);

        assert_eq!(page.get_num_empty_slots(), HeapPage::calculate_slots_count(&schema));
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn test_insert_delete_round_trip() {
        let schema = small_int_schema(2, "t");
        let pid = HeapPageID::new(1, 0);
        let mut page = HeapPage::new(&pid, &HeapPage::empty_page_data(), &schema);

        let mut tuple = Tuple::new_int_tuple(99, 2);
        page.insert_tuple(&mut tuple).unwrap();
        assert_eq!(tuple.get_record_id().unwrap().pid, pid);
        assert_eq!(
            page.get_num_empty_slots(),
            HeapPage::calculate_slots_count(&schema) - 1
        );

        // serialize, reparse, and make sure the tuple survived
        let reparsed = HeapPage::new(&pid, &page.get_page_data(), &schema);
        let restored: Vec<Tuple> = reparsed.iter().collect();
        assert_eq!(restored.len(), 1);
        assert!(restored[0].equal_cells(&[99, 99]));

        page.delete_tuple(&tuple).unwrap();
        assert_eq!(page.iter().count(), 0);
    }

    #[test]
    fn test_delete_rejects_foreign_tuple() {
        let schema = small_int_schema(2, "t");
        let mut page = HeapPage::new(&HeapPageID::new(1, 0), &HeapPage::empty_page_data(), &schema);

        // record id pointing at another page
        let mut foreign = Tuple::new_int_tuple(1, 2);
        foreign.set_record_id(RecordID::new(HeapPageID::new(1, 5), 0));
        assert!(page.delete_tuple(&foreign).is_err());

        // no record id at all
        let blank = Tuple::new_int_tuple(1, 2);
        assert!(page.delete_tuple(&blank).is_err());
    }
}
