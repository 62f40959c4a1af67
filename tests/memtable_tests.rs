//! MemTable Tests
//!
//! Tests verify:
//! - Inserts and overwrites
//! - Size tracking
//! - Ordered range reads after a cursor
//! - Clear functionality
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use portdb::memtable::MemTable;

fn kv(key: &str, value: &str) -> (Vec<u8>, Vec<u8>) {
    (key.as_bytes().to_vec(), value.as_bytes().to_vec())
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_tracks_size() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"key1".to_vec(), b"value1".to_vec()), 10);
    assert_eq!(memtable.put(b"key2".to_vec(), b"v".to_vec()), 15);
    assert_eq!(memtable.entry_count(), 2);
    assert_eq!(memtable.size(), 15);
}

#[test]
fn test_put_overwrite_adjusts_size() {
    let memtable = MemTable::new();
    memtable.put(b"key".to_vec(), b"short".to_vec());

    let size = memtable.put(b"key".to_vec(), b"much longer".to_vec());

    assert_eq!(size, 3 + 11);
    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.range_after(b"", 10), vec![kv("key", "much longer")]);
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_range_after_is_sorted_and_exclusive() {
    let memtable = MemTable::new();
    for key in ["C", "A", "B", "D"] {
        memtable.put(key.as_bytes().to_vec(), key.to_lowercase().into_bytes());
    }

    assert_eq!(
        memtable.range_after(b"", 10),
        vec![kv("A", "a"), kv("B", "b"), kv("C", "c"), kv("D", "d")]
    );
    assert_eq!(memtable.range_after(b"B", 10), vec![kv("C", "c"), kv("D", "d")]);
    assert_eq!(memtable.range_after(b"BB", 1), vec![kv("C", "c")]);
    assert!(memtable.range_after(b"D", 10).is_empty());
    assert_eq!(memtable.range_after(b"", 2).len(), 2);
}

#[test]
fn test_iter_returns_sorted_snapshot() {
    let memtable = MemTable::new();
    memtable.put(b"b".to_vec(), b"2".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());

    let snapshot: Vec<_> = memtable.iter().collect();
    memtable.put(b"c".to_vec(), b"3".to_vec());

    assert_eq!(snapshot, vec![kv("a", "1"), kv("b", "2")]);
}

#[test]
fn test_clear() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"1".to_vec());

    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
    assert!(memtable.range_after(b"", 10).is_empty());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers() {
    let memtable = Arc::new(MemTable::new());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..100 {
                    memtable.put(format!("t{}-{:03}", t, i).into_bytes(), vec![t as u8; 4]);
                    let page = memtable.range_after(b"", 50);
                    assert!(page.windows(2).all(|w| w[0].0 < w[1].0));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(memtable.entry_count(), 400);
}
