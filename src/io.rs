use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
};

use crate::{error::DbError, types::DbResult};

/// Append-oriented file wrapper used by the log manager.
pub struct DbFile {
    file: File,
}

impl DbFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self, DbError> {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)?;

        Ok(Self { file })
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) -> DbResult {
        self.write_bytes(&obj.encode())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> DbResult {
        self.file
            .write_all(bytes)
            .or(Err(DbError::new("io error")))
    }

    pub fn get_size(&self) -> Result<u64, DbError> {
        let metadata = self.file.metadata().or(Err(DbError::new("io error")))?;
        Ok(metadata.len())
    }

    pub fn get_current_position(&mut self) -> Result<u64, DbError> {
        self.file
            .seek(SeekFrom::Current(0))
            .or(Err(DbError::new("io error")))
    }

    pub fn set_len(&self, len: u64) -> DbResult {
        self.file.set_len(len).or(Err(DbError::new("io error")))
    }

    pub fn flush(&mut self) -> DbResult {
        self.file.flush().or(Err(DbError::new("io error")))
    }
}

pub fn read_exact<R: std::io::Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .expect(&format!("io error, expect {}", bytes_count));
    buffer
}

/// In-memory writer used to assemble page images before they hit the
/// disk or the log.
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.encode().as_slice());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();

        if buf.len() > size {
            panic!(
                "buffer size is larger than the given size: {} > {}",
                buf.len(),
                size
            );
        }

        buf.resize(size, 0);
        buf
    }
}

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn decode_from<R: std::io::Read>(reader: &mut R) -> Self;
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: std::io::Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, i8, i16, i32, i64, usize);
