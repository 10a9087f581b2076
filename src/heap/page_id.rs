use std::fmt;

use crate::io::Encodeable;

/// Identifies a unique page: the owning table and the position of the
/// page in the table file, starting from 0.
#[derive(PartialEq, Eq, Hash, Copy, Clone)]
pub struct HeapPageID {
    pub table_id: u32,
    pub page_index: u32,
}

impl HeapPageID {
    pub fn new(table_id: u32, page_index: u32) -> Self {
        Self {
            table_id,
            page_index,
        }
    }

    pub fn get_table_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_short_repr(&self) -> String {
        format!("page_{}_{}", self.table_id, self.page_index)
    }
}

impl Encodeable for HeapPageID {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.table_id.encode());
        buf.extend_from_slice(&self.page_index.encode());
        buf
    }
}

impl fmt::Display for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_short_repr())
    }
}

impl fmt::Debug for HeapPageID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
