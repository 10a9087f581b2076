use heap_db::{
    utils::HandyRwLock, BufferPool, Database, HeapPageID, HeapTableScan, Permission, Transaction,
    Tuple,
};

mod test_utils;
use test_utils::{create_random_heap_table, setup_with_capacity};

// The pool-state assertions below depend on being alone with a
// three-slot pool, so everything runs inside one test.
#[test]
fn test_clock_eviction_and_no_steal() {
    setup_with_capacity(3);

    let mut cells = Vec::new();
    let table_pod = create_random_heap_table("pool_eviction", 2, 900, 10000, &mut cells);
    let table_id = table_pod.rl().get_id();
    assert!(table_pod.rl().num_pages() >= 4);

    let p0 = HeapPageID::new(table_id, 0);
    let p1 = HeapPageID::new(table_id, 1);
    let p2 = HeapPageID::new(table_id, 2);
    let p3 = HeapPageID::new(table_id, 3);

    // fill the pool with three clean pages
    let t1 = Transaction::new();
    BufferPool::get_page(&t1, Permission::ReadOnly, &p0).unwrap();
    BufferPool::get_page(&t1, Permission::ReadOnly, &p1).unwrap();
    BufferPool::get_page(&t1, Permission::ReadOnly, &p2).unwrap();
    {
        let pool = Database::buffer_pool();
        assert_eq!(pool.pages_count(), 3);
        assert!(pool.contains_page(&p0));
        assert!(pool.contains_page(&p1));
        assert!(pool.contains_page(&p2));
    }
    t1.commit().unwrap();

    // a fourth page pushes out the first unreferenced clean slot
    // reachable from the hand, which is slot 0
    let t2 = Transaction::new();
    BufferPool::get_page(&t2, Permission::ReadOnly, &p3).unwrap();
    {
        let pool = Database::buffer_pool();
        assert_eq!(pool.pages_count(), 3);
        assert!(pool.contains_page(&p3));
        assert!(!pool.contains_page(&p0));
        assert!(pool.contains_page(&p1));
        assert!(pool.contains_page(&p2));
    }

    // refetching the evicted page goes back to disk
    let reads_before = table_pod.rl().get_read_count();
    BufferPool::get_page(&t2, Permission::ReadOnly, &p0).unwrap();
    assert_eq!(table_pod.rl().get_read_count(), reads_before + 1);
    t2.commit().unwrap();

    // dirty every slot: delete one tuple from each of three pages
    let t3 = Transaction::new();
    let tuples: Vec<Tuple> = HeapTableScan::new(t3, table_id).collect();
    for page_no in 0..3u32 {
        let victim = tuples
            .iter()
            .find(|t| t.get_record_id().unwrap().pid.page_index == page_no)
            .unwrap();
        BufferPool::delete_tuple(&t3, victim).unwrap();
    }

    // with every slot dirty the eviction path must refuse (NO-STEAL)
    let err = BufferPool::get_page(&t3, Permission::ReadOnly, &p3).unwrap_err();
    assert!(!err.is_aborted());
    assert!(format!("{}", err).contains("all pages dirty"));

    // the aborted deletions are undone with fresh disk reads
    t3.abort().unwrap();

    let t4 = Transaction::new();
    let rows: Vec<Tuple> = HeapTableScan::new(t4, table_id).collect();
    t4.commit().unwrap();
    assert_eq!(rows.len(), 900);
}
