//! Integration tests for the buffer pool

use std::sync::Arc;
use std::thread;

use kiln::buffer::BufferPool;
use kiln::catalog::Catalog;
use kiln::execution::{collect_stream, TupleStream};
use kiln::storage::disk::TableFile;
use kiln::tuple::{DataType, Schema, TupleBuilder};
use kiln::PageId;

use tempfile::{tempdir, TempDir};

const PAGE_SIZE: usize = 64;

fn create_pool(capacity: usize) -> (Arc<BufferPool>, Arc<TableFile>, TempDir) {
    let dir = tempdir().unwrap();
    let catalog = Arc::new(Catalog::new(PAGE_SIZE));
    let schema = Schema::builder().column("v", DataType::Int).build_arc();
    let file = catalog
        .open_table("t", dir.path().join("t.dat"), schema)
        .unwrap();
    let pool = Arc::new(BufferPool::new(capacity, catalog).unwrap());
    (pool, file, dir)
}

fn insert(pool: &BufferPool, file: &TableFile, v: i32) {
    let mut t = TupleBuilder::new(file.schema().clone())
        .value(v)
        .build()
        .unwrap();
    pool.insert_tuple(file.table_id(), &mut t).unwrap();
}

#[test]
fn test_buffer_pool_caches_pages() {
    let (pool, file, _dir) = create_pool(4);
    for _ in 0..3 {
        file.append_empty_page().unwrap();
    }

    for page_no in 0..3 {
        pool.get_page(PageId::new(file.table_id(), page_no)).unwrap();
    }
    for page_no in 0..3 {
        pool.get_page(PageId::new(file.table_id(), page_no)).unwrap();
    }
    assert_eq!(file.num_reads(), 3);
    assert_eq!(pool.len(), 3);
}

#[test]
fn test_buffer_pool_writes_back_dirty_victim() {
    let (pool, file, _dir) = create_pool(1);
    insert(&pool, &file, 11);
    let first = PageId::new(file.table_id(), 0);
    assert!(pool.get_page(first).unwrap().read().is_dirty());

    // loading another page evicts the dirty one
    let second = file.append_empty_page().unwrap();
    pool.get_page(second).unwrap();
    assert!(!pool.holds_page(first));

    let on_disk = file.read_page(0).unwrap();
    let values: Vec<_> = on_disk
        .iter()
        .map(|t| t.value(0).unwrap().as_int().unwrap())
        .collect();
    assert_eq!(values, vec![11]);
}

#[test]
fn test_buffer_pool_clean_victim_not_rewritten() {
    let (pool, file, _dir) = create_pool(1);
    file.append_empty_page().unwrap();
    file.append_empty_page().unwrap();
    let writes = file.num_writes();

    pool.get_page(PageId::new(file.table_id(), 0)).unwrap();
    pool.get_page(PageId::new(file.table_id(), 1)).unwrap();
    assert_eq!(file.num_writes(), writes);
}

#[test]
fn test_buffer_pool_discard_drops_changes() {
    let (pool, file, _dir) = create_pool(4);
    insert(&pool, &file, 5);
    let pid = PageId::new(file.table_id(), 0);

    assert!(pool.discard_page(pid));
    let page = pool.get_page(pid).unwrap();
    assert_eq!(page.read().tuple_count(), 0);
}

#[test]
fn test_buffer_pool_small_pool_survives_full_scan() {
    let (pool, file, _dir) = create_pool(2);
    for v in 0..100 {
        insert(&pool, &file, v);
    }
    assert!(file.num_pages() > 2);

    let mut scan = file.iter(&pool);
    scan.open().unwrap();
    let values: Vec<_> = collect_stream(&mut scan)
        .unwrap()
        .iter()
        .map(|t| t.value(0).unwrap().as_int().unwrap())
        .collect();
    assert_eq!(values, (0..100).collect::<Vec<_>>());
    assert!(pool.len() <= 2);
}

#[test]
fn test_buffer_pool_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("t.dat");
    let schema = Schema::builder().column("v", DataType::Int).build_arc();

    {
        let catalog = Arc::new(Catalog::new(PAGE_SIZE));
        let file = catalog.open_table("t", &path, schema.clone()).unwrap();
        let pool = BufferPool::new(4, catalog).unwrap();
        insert(&pool, &file, 21);
        insert(&pool, &file, 22);
        assert!(pool.flush_page(PageId::new(file.table_id(), 0)).unwrap());
    }

    let catalog = Arc::new(Catalog::new(PAGE_SIZE));
    let file = catalog.open_table("t", &path, schema).unwrap();
    let pool = BufferPool::new(4, catalog).unwrap();
    let page = pool.get_page(PageId::new(file.table_id(), 0)).unwrap();
    assert_eq!(page.read().tuple_count(), 2);
    assert!(!page.read().is_dirty());
}

#[test]
fn test_buffer_pool_concurrent_inserts() {
    const THREADS: i32 = 4;
    const PER_THREAD: i32 = 60;

    let (pool, file, _dir) = create_pool(THREADS as usize);
    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let pool = Arc::clone(&pool);
            let file = Arc::clone(&file);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    insert(&pool, &file, n * 1000 + i);
                    // touch an earlier page so eviction keeps cycling
                    let page_no = (i as u32) % file.num_pages();
                    let page = pool.get_page(PageId::new(file.table_id(), page_no)).unwrap();
                    let _ = page.read().tuple_count();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(file.num_pages() > THREADS as u32);
    pool.flush_all_pages().unwrap();

    // read back through a fresh pool so only what reached disk is seen
    let fresh = Arc::new(BufferPool::new(2, Arc::clone(pool.catalog())).unwrap());
    let mut scan = file.iter(&fresh);
    scan.open().unwrap();
    let mut values: Vec<_> = collect_stream(&mut scan)
        .unwrap()
        .iter()
        .map(|t| t.value(0).unwrap().as_int().unwrap())
        .collect();
    values.sort();

    let mut expected: Vec<_> = (0..THREADS)
        .flat_map(|n| (0..PER_THREAD).map(move |i| n * 1000 + i))
        .collect();
    expected.sort();
    assert_eq!(values, expected);
}

#[test]
fn test_buffer_pool_concurrent_readers_share_page() {
    let (pool, file, _dir) = create_pool(2);
    insert(&pool, &file, 42);
    let pid = PageId::new(file.table_id(), 0);
    let reads = file.num_reads();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    let page = pool.get_page(pid).unwrap();
                    assert_eq!(page.read().tuple_count(), 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(file.num_reads(), reads);
    assert_eq!(pool.pin_count(pid), Some(0));
}
