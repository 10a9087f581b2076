use log::debug;

use heap_db::{utils::HandyRwLock, HeapTableScan, Transaction};

mod test_utils;
use test_utils::{create_random_heap_table, setup};

#[test]
// Verifies that the buffer pool is actually caching pages: a second
// scan of the same table touches the disk zero times.
fn test_cache() {
    setup();

    let mut cells: Vec<Vec<i64>> = Vec::new();
    let pages = 10;
    let rows = 504 * pages;
    let table_pod = create_random_heap_table("scan_cache", 1, rows, 10000, &mut cells);
    let table_id = table_pod.rl().get_id();

    let tx = Transaction::new();
    let mut scan = HeapTableScan::new(tx, table_id);

    // scan the table once
    let mut row_index = 0;
    for actual_row in scan.by_ref() {
        assert!(actual_row.equal_cells(&cells[row_index]));
        row_index += 1;
    }
    assert_eq!(row_index, cells.len());

    let first_pass_reads = table_pod.rl().get_read_count();
    debug!("table read count: {}", first_pass_reads);
    assert!(first_pass_reads >= pages);

    // scan the table again; every page should come from the pool
    scan.rewind();
    let mut row_index = 0;
    for actual_row in scan.by_ref() {
        assert!(actual_row.equal_cells(&cells[row_index]));
        row_index += 1;
    }
    assert_eq!(row_index, cells.len());

    let second_pass_reads = table_pod.rl().get_read_count();
    debug!("table read count: {}", second_pass_reads);
    assert_eq!(second_pass_reads, first_pass_reads);

    tx.commit().unwrap();
}
