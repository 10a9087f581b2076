use std::fmt;

use crate::{
    error::DbError,
    heap::page_id::HeapPageID,
    io::{read_exact, Decodeable, Encodeable},
    storage::schema::{Schema, Type, STRING_CAPACITY},
};

/// Position of a tuple: the page it lives on and its slot there.
/// Assigned by the page on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordID {
    pub pid: HeapPageID,
    pub slot: usize,
}

impl RecordID {
    pub fn new(pid: HeapPageID, slot: usize) -> Self {
        Self { pid, slot }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Int64(i64),
    String(String),
}

impl Cell {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Cell::Int64(v) => v.encode(),
            Cell::String(v) => {
                let payload = v.as_bytes();
                if payload.len() > STRING_CAPACITY {
                    panic!("string cell overflow: {} bytes", payload.len());
                }

                let mut buf = Vec::with_capacity(1 + STRING_CAPACITY);
                buf.push(payload.len() as u8);
                buf.extend_from_slice(payload);
                buf.resize(1 + STRING_CAPACITY, 0);
                buf
            }
        }
    }

    pub fn read_from<R: std::io::Read>(reader: &mut R, t: Type) -> Self {
        match t {
            Type::Int => Cell::Int64(i64::decode_from(reader)),
            Type::String => {
                let buf = read_exact(reader, 1 + STRING_CAPACITY);
                let len = buf[0] as usize;
                let payload = String::from_utf8_lossy(&buf[1..1 + len]).to_string();
                Cell::String(payload)
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Tuple {
    cells: Vec<Cell>,
    record_id: Option<RecordID>,
}

impl Tuple {
    pub fn new(schema: &Schema, bytes: &[u8]) -> Self {
        let mut reader = std::io::Cursor::new(bytes);
        Self::read_from(&mut reader, schema)
    }

    pub fn new_from_cells(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            record_id: None,
        }
    }

    pub fn read_from<R: std::io::Read>(reader: &mut R, schema: &Schema) -> Self {
        let mut cells: Vec<Cell> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            cells.push(Cell::read_from(reader, field.field_type));
        }

        Tuple {
            cells,
            record_id: None,
        }
    }

    /// A tuple occupying an unused slot; all cells zeroed.
    pub fn blank(schema: &Schema) -> Self {
        let cells = schema
            .fields
            .iter()
            .map(|f| match f.field_type {
                Type::Int => Cell::Int64(0),
                Type::String => Cell::String(String::new()),
            })
            .collect();

        Tuple {
            cells,
            record_id: None,
        }
    }

    pub fn new_int_tuple(value: i64, width: usize) -> Self {
        let cells = vec![Cell::Int64(value); width];

        Tuple {
            cells,
            record_id: None,
        }
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn get_cells(&self) -> Vec<Cell> {
        self.cells.clone()
    }

    pub fn get_record_id(&self) -> Option<RecordID> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: RecordID) {
        self.record_id = Some(rid);
    }

    pub fn clear_record_id(&mut self) {
        self.record_id = None;
    }

    /// Compare payload against a plain integer row, test convenience.
    pub fn equal_cells(&self, expect: &[i64]) -> bool {
        if self.cells.len() != expect.len() {
            return false;
        }

        self.cells
            .iter()
            .zip(expect)
            .all(|(cell, v)| matches!(cell, Cell::Int64(x) if x == v))
    }

    pub fn check_schema(&self, schema: &Schema) -> Result<(), DbError> {
        if self.cells.len() != schema.fields.len() {
            return Err(DbError::new(&format!(
                "tuple has {} cells, schema has {} fields",
                self.cells.len(),
                schema.fields.len()
            )));
        }

        for (cell, field) in self.cells.iter().zip(&schema.fields) {
            let matched = match (cell, field.field_type) {
                (Cell::Int64(_), Type::Int) => true,
                (Cell::String(_), Type::String) => true,
                _ => false,
            };
            if !matched {
                return Err(DbError::new(&format!(
                    "cell does not match field {:?}",
                    field
                )));
            }
        }

        Ok(())
    }
}

impl Encodeable for Tuple {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for cell in &self.cells {
            bytes.extend_from_slice(&cell.encode());
        }
        bytes
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut content: String = "{".to_owned();
        for cell in &self.cells {
            content.push_str(&format!("{:?}, ", cell));
        }
        content.push('}');
        write!(f, "{}", content)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
