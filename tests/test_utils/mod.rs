use std::{
    fs,
    io::Write,
    sync::{Arc, Once, RwLock},
};

use bit_vec::BitVec;
use rand::Rng;

use heap_db::{
    storage::schema::Schema, types::Pod, utils, BufferPool, Database, HeapPage, HeapTable,
};

static INIT: Once = Once::new();

/// Conduct the initialization:
/// - set up log configuration
/// - bring up the database singleton with a fresh pool
#[allow(dead_code)]
pub fn setup() {
    INIT.call_once(|| {
        utils::init_log();
        Database::reset();
    });
}

/// Like `setup`, but with a bounded pool. The capacity has to be in
/// place before the singleton is built.
#[allow(dead_code)]
pub fn setup_with_capacity(capacity: usize) {
    INIT.call_once(|| {
        utils::init_log();
        BufferPool::set_capacity(capacity);
        Database::reset();
    });
}

/// A per-process file path for a test table, so parallel test binaries
/// don't trample each other.
pub fn table_path(name: &str) -> String {
    let dir = std::env::temp_dir().join("heap_db_tests");
    fs::create_dir_all(&dir).unwrap();

    dir.join(format!("{}_{}.dat", name, std::process::id()))
        .to_str()
        .unwrap()
        .to_string()
}

/// Create an empty table and register it with the catalog.
#[allow(dead_code)]
pub fn create_empty_heap_table(name: &str, columns: usize) -> Pod<HeapTable> {
    let path = table_path(name);
    let _ = fs::remove_file(&path);

    let schema = heap_db::small_int_schema(columns, "");
    let table = HeapTable::new(&path, schema).unwrap();

    let table_pod = Arc::new(RwLock::new(table));
    Database::mut_catalog().add_table(Arc::clone(&table_pod), name, "");
    table_pod
}

/// Create a table filled with random integer rows, written to disk as
/// ready-made page images, and register it with the catalog. The
/// generated values are appended to `cells` so callers can check scan
/// output against them.
#[allow(dead_code)]
pub fn create_random_heap_table(
    name: &str,
    columns: usize,
    rows: usize,
    max_value: i64,
    cells: &mut Vec<Vec<i64>>,
) -> Pod<HeapTable> {
    let mut rng = rand::thread_rng();
    for _ in 0..rows {
        let mut row = Vec::with_capacity(columns);
        for _ in 0..columns {
            row.push(rng.gen_range(1, max_value));
        }
        cells.push(row);
    }

    let schema = heap_db::small_int_schema(columns, "");
    let path = table_path(name);
    write_heap_file(&path, &schema, cells);

    let table = HeapTable::new(&path, schema).unwrap();
    let table_pod = Arc::new(RwLock::new(table));
    Database::mut_catalog().add_table(Arc::clone(&table_pod), name, "");
    table_pod
}

/// Write page images the way the engine lays them out: slot bitmap
/// header, packed fixed-size rows, zero padding.
fn write_heap_file(path: &str, schema: &Schema, cells: &[Vec<i64>]) {
    let _ = fs::remove_file(path);
    let mut file = fs::File::create(path).unwrap();

    let page_size = BufferPool::get_page_size();
    let slots_count = HeapPage::calculate_slots_count(schema);
    let header_bytes = (slots_count + 7) / 8;

    for chunk in cells.chunks(slots_count) {
        let mut bitmap = BitVec::from_elem(header_bytes * 8, false);
        for i in 0..chunk.len() {
            bitmap.set(i, true);
        }

        let mut page = bitmap.to_bytes();
        for row in chunk {
            for value in row {
                page.extend_from_slice(&value.to_le_bytes());
            }
        }
        page.resize(page_size, 0);

        file.write_all(&page).unwrap();
    }
}
